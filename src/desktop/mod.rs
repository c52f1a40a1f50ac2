//! Desktop automation backends
//!
//! The protocol engine talks to the desktop through three traits:
//! - `Platform` - processes, input devices, automation factories
//! - `Automation` - the accessibility tree as seen by one session
//! - `InputDevice` - synthesized keyboard and mouse input
//!
//! Two implementations exist: `NativePlatform` (OS processes, enigo input,
//! xcap screen capture and Windows UI Automation) and `SimulatedDesktop`
//! (in-memory, deterministic).

pub mod backend;
pub mod input;
pub mod platform;
pub mod property;
pub mod screenshot;
pub mod simulated;
pub mod types;

pub use backend::{Automation, InputDevice, Platform};
pub use platform::{create_platform, NativePlatform};
pub use property::ElementProperty;
pub use screenshot::{image_to_base64, ScreenCapture};
pub use simulated::{InputEvent, SimulatedDesktop};
pub use types::{
    AppHandle, LaunchSpec, Locator, LocatorStrategy, MouseButton, Point, ProcessWindow, Rect,
    UiElement, VirtualKey,
};
