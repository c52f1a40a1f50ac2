//! WebDriver protocol server for desktop UI automation.
//!
//! Sessions, elements and input actions are exposed over the W3C WebDriver
//! wire protocol and translated into calls against an accessibility
//! automation backend (`desktop`).

pub mod actions;
pub mod api;
pub mod config;
pub mod desktop;
pub mod device;
pub mod error;
pub mod extensions;
pub mod input;
pub mod models;
pub mod session;
pub mod wait;

pub use error::{Result, WebDriverError};
