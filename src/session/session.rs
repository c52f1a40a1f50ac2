use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use super::registry::KnownRegistry;
use super::timeouts::Timeouts;
use crate::desktop::{AppHandle, Automation, InputDevice, Platform, UiElement};
use crate::error::{Result, WebDriverError};
use crate::input::InputState;

pub const DEFAULT_NEW_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything capability negotiation decided about a new session
pub struct SessionOptions {
    pub app: Option<AppHandle>,
    pub app_owned: bool,
    pub capabilities: Map<String, Value>,
    pub timeouts: Timeouts,
    pub new_command_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            app: None,
            app_owned: false,
            capabilities: Map::new(),
            timeouts: Timeouts::default(),
            new_command_timeout: DEFAULT_NEW_COMMAND_TIMEOUT,
        }
    }
}

#[derive(Clone)]
struct CurrentWindow {
    handle: String,
    element: UiElement,
}

pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    app: Option<AppHandle>,
    app_owned: bool,
    platform: Arc<dyn Platform>,
    automation: Arc<dyn Automation>,
    input_device: Arc<dyn InputDevice>,
    capabilities: Map<String, Value>,
    timeouts: RwLock<Timeouts>,
    new_command_timeout: Duration,
    epoch: Instant,
    /// Milliseconds since `epoch` of the last command
    last_activity_ms: AtomicU64,
    pub input: Mutex<InputState>,
    pub elements: KnownRegistry,
    pub windows: KnownRegistry,
    current_window: RwLock<Option<CurrentWindow>>,
    disposed: AtomicBool,
}

impl Session {
    /// Open a session. For app sessions the main window becomes the current
    /// window, waiting up to the page load timeout for it to appear.
    pub async fn create(platform: Arc<dyn Platform>, options: SessionOptions) -> Result<Self> {
        let automation = platform.create_automation().map_err(|e| {
            WebDriverError::SessionNotCreated(format!(
                "Could not initialize UI automation: {:#}",
                e
            ))
        })?;

        let session = Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            app: options.app,
            app_owned: options.app_owned,
            input_device: platform.input(),
            platform,
            automation,
            capabilities: options.capabilities,
            timeouts: RwLock::new(options.timeouts),
            new_command_timeout: options.new_command_timeout,
            epoch: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
            input: Mutex::new(InputState::new()),
            elements: KnownRegistry::new("element"),
            windows: KnownRegistry::new("window"),
            current_window: RwLock::new(None),
            disposed: AtomicBool::new(false),
        };

        if let Some(app) = &session.app {
            let timeout = options.timeouts.page_load_timeout();
            let main_window = session
                .automation
                .main_window(app, timeout)
                .await?
                .ok_or_else(|| {
                    WebDriverError::SessionNotCreated(format!(
                        "No main window appeared for process {} within {} ms",
                        app.process_id,
                        timeout.as_millis()
                    ))
                })?;
            let handle = session
                .windows
                .get_or_add(session.automation(), main_window.clone())
                .await;
            *session.current_window.write().await = Some(CurrentWindow {
                handle,
                element: main_window,
            });
        }

        Ok(session)
    }

    pub fn app(&self) -> Option<&AppHandle> {
        self.app.as_ref()
    }

    pub fn is_app_owned(&self) -> bool {
        self.app_owned
    }

    pub fn platform(&self) -> &Arc<dyn Platform> {
        &self.platform
    }

    pub fn automation(&self) -> &dyn Automation {
        self.automation.as_ref()
    }

    pub fn input_device(&self) -> &Arc<dyn InputDevice> {
        &self.input_device
    }

    pub fn capabilities(&self) -> &Map<String, Value> {
        &self.capabilities
    }

    pub fn new_command_timeout(&self) -> Duration {
        self.new_command_timeout
    }

    pub async fn timeouts(&self) -> Timeouts {
        *self.timeouts.read().await
    }

    pub async fn update_timeouts(&self, update: &Value) -> Result<Timeouts> {
        let mut timeouts = self.timeouts.write().await;
        timeouts.apply(update)?;
        Ok(*timeouts)
    }

    /// Record command activity now
    pub fn touch(&self) {
        let elapsed = Instant::now().saturating_duration_since(self.epoch);
        self.last_activity_ms
            .fetch_max(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn idle_time(&self, now: Instant) -> Duration {
        let last = Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed));
        now.saturating_duration_since(self.epoch)
            .saturating_sub(last)
    }

    pub fn is_timed_out(&self, now: Instant) -> bool {
        self.idle_time(now) > self.new_command_timeout
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Fails with `no such window` once an attached or launched application
    /// has exited.
    pub async fn ensure_app_running(&self) -> Result<()> {
        match &self.app {
            Some(app) if self.platform.has_exited(app).await => {
                Err(WebDriverError::no_windows_open())
            }
            _ => Ok(()),
        }
    }

    fn require_app(&self) -> Result<&AppHandle> {
        self.app.as_ref().ok_or_else(|| {
            WebDriverError::UnsupportedOperation(
                "This operation is not supported for Root app".to_string(),
            )
        })
    }

    pub async fn current_window(&self) -> Result<UiElement> {
        self.require_app()?;
        self.current_window
            .read()
            .await
            .as_ref()
            .map(|window| window.element.clone())
            .ok_or_else(WebDriverError::no_windows_open)
    }

    pub async fn current_window_handle(&self) -> Result<String> {
        self.require_app()?;
        self.current_window
            .read()
            .await
            .as_ref()
            .map(|window| window.handle.clone())
            .ok_or_else(WebDriverError::no_windows_open)
    }

    /// Handles of the application's top-level windows, registering new ones.
    pub async fn window_handles(&self) -> Result<Vec<String>> {
        let app = self.require_app()?;
        self.windows.evict_unavailable(self.automation()).await;

        let windows = self.automation.top_level_windows(app).await?;
        let mut handles = Vec::with_capacity(windows.len());
        for window in windows {
            handles.push(self.windows.get_or_add(self.automation(), window).await);
        }
        Ok(handles)
    }

    pub async fn switch_to_window(&self, handle: &str) -> Result<()> {
        self.require_app()?;
        let element = self.windows.find(handle).ok_or_else(|| {
            WebDriverError::NoSuchWindow(format!("No window found with handle '{}'", handle))
        })?;
        if !self.automation.is_available(&element).await.unwrap_or(false) {
            return Err(WebDriverError::NoSuchWindow(format!(
                "Window with handle '{}' is no longer available",
                handle
            )));
        }
        self.automation.focus(&element).await?;
        *self.current_window.write().await = Some(CurrentWindow {
            handle: handle.to_string(),
            element,
        });
        Ok(())
    }

    /// Root for element searches: the current window, or the desktop for
    /// sessions without an application.
    pub async fn search_root(&self) -> Result<UiElement> {
        if self.app.is_some() {
            self.current_window().await
        } else {
            Ok(self.automation.desktop().await?)
        }
    }

    pub async fn get_or_add_element(&self, element: UiElement) -> String {
        self.elements.get_or_add(self.automation(), element).await
    }

    /// Known element for a client reference
    pub fn element(&self, reference: &str) -> Result<UiElement> {
        self.elements
            .find(reference)
            .ok_or_else(|| WebDriverError::element_not_found(reference))
    }

    /// Close the owned application and release the backend. Runs once.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let (true, Some(app)) = (self.app_owned, &self.app) {
            if !self.platform.has_exited(app).await {
                if let Err(e) = self.platform.close(app).await {
                    tracing::warn!(
                        "Failed to close application {} of session {}: {:#}",
                        app.process_id,
                        self.id,
                        e
                    );
                }
            }
        }
        self.automation.release().await;
        tracing::debug!("Disposed session {}", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::{LaunchSpec, SimulatedDesktop};

    async fn app_session(desktop: &SimulatedDesktop, owned: bool) -> Session {
        desktop.register_app("app.exe", "Main");
        let app = desktop
            .launch(&LaunchSpec {
                path: "app.exe".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        Session::create(
            Arc::new(desktop.clone()),
            SessionOptions {
                app: Some(app),
                app_owned: owned,
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_app_session_has_current_window() {
        let desktop = SimulatedDesktop::new();
        let session = app_session(&desktop, true).await;

        let handle = session.current_window_handle().await.unwrap();
        assert_eq!(session.window_handles().await.unwrap(), vec![handle.clone()]);
        let root = session.search_root().await.unwrap();
        let title = session
            .automation()
            .property(&root, crate::desktop::ElementProperty::Name)
            .await
            .unwrap();
        assert_eq!(title, Some(serde_json::json!("Main")));
    }

    #[tokio::test]
    async fn test_desktop_session_has_no_current_window() {
        let session = Session::create(Arc::new(SimulatedDesktop::new()), SessionOptions::default())
            .await
            .unwrap();

        let err = session.current_window().await.unwrap_err();
        assert_eq!(err.code(), "unsupported operation");
        assert_eq!(err.to_string(), "This operation is not supported for Root app");
        assert!(session.search_root().await.is_ok());
    }

    #[tokio::test]
    async fn test_dispose_closes_owned_app_once() {
        let desktop = SimulatedDesktop::new();
        let session = app_session(&desktop, true).await;
        let pid = session.app().unwrap().process_id;

        session.dispose().await;
        assert!(!desktop.is_running(pid));
        assert!(session.is_disposed());
        session.dispose().await;
    }

    #[tokio::test]
    async fn test_dispose_leaves_attached_app_running() {
        let desktop = SimulatedDesktop::new();
        let session = app_session(&desktop, false).await;
        let pid = session.app().unwrap().process_id;

        session.dispose().await;
        assert!(desktop.is_running(pid));
    }

    #[tokio::test]
    async fn test_exited_app_reports_no_such_window() {
        let desktop = SimulatedDesktop::new();
        let session = app_session(&desktop, true).await;
        desktop.exit_process(session.app().unwrap().process_id);

        let err = session.ensure_app_running().await.unwrap_err();
        assert_eq!(err.code(), "no such window");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_bookkeeping() {
        let session = Session::create(
            Arc::new(SimulatedDesktop::new()),
            SessionOptions {
                new_command_timeout: Duration::from_secs(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(!session.is_timed_out(Instant::now()));
        session.touch();

        tokio::time::advance(Duration::from_millis(900)).await;
        assert!(!session.is_timed_out(Instant::now()));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(session.is_timed_out(Instant::now()));
    }
}
