pub mod actions;
pub mod device;
pub mod element;
pub mod execute;
pub mod find;
pub mod screenshot;
pub mod session;
pub mod status;
pub mod timeouts;
pub mod window;
