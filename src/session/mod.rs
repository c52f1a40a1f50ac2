//! Sessions, their reference registries and the process-wide repository.

pub mod capabilities;
pub mod cleanup;
pub mod registry;
pub mod repository;
#[allow(clippy::module_inception)]
pub mod session;
pub mod timeouts;

pub use capabilities::{open_session, AppTarget, MatchedCapabilities, MergedCapabilities};
pub use registry::KnownRegistry;
pub use repository::SessionRepository;
pub use session::{Session, SessionOptions, DEFAULT_NEW_COMMAND_TIMEOUT};
pub use timeouts::Timeouts;
