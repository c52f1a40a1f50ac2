//! Seams between the protocol engine and an automation backend.

use anyhow::Result;
use async_trait::async_trait;
use image::RgbaImage;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::property::ElementProperty;
use super::types::{
    AppHandle, LaunchSpec, Locator, MouseButton, Point, ProcessWindow, Rect, UiElement, VirtualKey,
};

/// Process-wide backend: owns input devices and application processes.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Create the per-session accessibility handle
    fn create_automation(&self) -> Result<Arc<dyn Automation>>;

    /// Keyboard and mouse synthesis, shared by every session
    fn input(&self) -> Arc<dyn InputDevice>;

    async fn launch(&self, spec: &LaunchSpec) -> Result<AppHandle>;

    /// Launch a packaged (store) application by its application user model id
    async fn launch_packaged(&self, app_id: &str, arguments: Option<&str>) -> Result<AppHandle>;

    /// Processes that currently own a main window
    async fn processes(&self) -> Result<Vec<ProcessWindow>>;

    async fn attach(&self, process_id: u32) -> Result<AppHandle>;

    async fn has_exited(&self, app: &AppHandle) -> bool;

    async fn close(&self, app: &AppHandle) -> Result<()>;

    /// Capture an area of the screen, in screen coordinates. Blocking.
    fn capture(&self, area: Rect) -> Result<RgbaImage>;
}

/// Accessibility tree access for one session.
#[async_trait]
pub trait Automation: Send + Sync {
    async fn desktop(&self) -> Result<UiElement>;

    async fn focused_element(&self) -> Result<UiElement>;

    /// Wait up to `timeout` for the application's main window to appear.
    async fn main_window(&self, app: &AppHandle, timeout: Duration) -> Result<Option<UiElement>>;

    async fn top_level_windows(&self, app: &AppHandle) -> Result<Vec<UiElement>>;

    /// First matching descendant of `root` (the root itself excluded)
    async fn find_first(&self, root: &UiElement, locator: &Locator) -> Result<Option<UiElement>>;

    async fn find_all(&self, root: &UiElement, locator: &Locator) -> Result<Vec<UiElement>>;

    /// Native identity comparison. Fails when either object has gone away.
    async fn is_same(&self, a: &UiElement, b: &UiElement) -> Result<bool>;

    async fn is_available(&self, element: &UiElement) -> Result<bool>;

    async fn bounding_rect(&self, element: &UiElement) -> Result<Rect>;

    /// `Ok(None)` when the element does not support the property
    async fn property(&self, element: &UiElement, property: ElementProperty)
        -> Result<Option<Value>>;

    /// Rendered text as a user would read it
    async fn text(&self, element: &UiElement) -> Result<String>;

    async fn is_offscreen(&self, element: &UiElement) -> Result<bool>;

    async fn scroll_into_view(&self, element: &UiElement) -> Result<()>;

    async fn focus(&self, element: &UiElement) -> Result<()>;

    /// Empty the value of an editable element
    async fn clear(&self, element: &UiElement) -> Result<()>;

    /// Drop backend resources held for the session
    async fn release(&self) {}
}

/// Synthesized keyboard and mouse input.
///
/// Scroll deltas are in wheel clicks; positive scrolls down or right.
pub trait InputDevice: Send + Sync {
    fn key_down(&self, key: VirtualKey) -> Result<()>;

    fn key_up(&self, key: VirtualKey) -> Result<()>;

    fn mouse_position(&self) -> Result<Point>;

    fn move_mouse(&self, to: Point) -> Result<()>;

    fn button_down(&self, button: MouseButton) -> Result<()>;

    fn button_up(&self, button: MouseButton) -> Result<()>;

    fn scroll_vertical(&self, delta: i32) -> Result<()>;

    fn scroll_horizontal(&self, delta: i32) -> Result<()>;

    fn type_text(&self, text: &str) -> Result<()>;
}
