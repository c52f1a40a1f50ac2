use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::{Child, Command};
use image::RgbaImage;
use std::sync::{Arc, Mutex, PoisonError};

use super::backend::{Automation, InputDevice, Platform};
use super::input::NativeInput;
use super::screenshot::ScreenCapture;
use super::simulated::SimulatedDesktop;
use super::types::{AppHandle, LaunchSpec, ProcessWindow, Rect};
use crate::config::BackendKind;

#[cfg(target_os = "windows")]
pub mod windows;

/// Create the backend selected by configuration
pub fn create_platform(kind: BackendKind) -> Result<Arc<dyn Platform>> {
    match kind {
        BackendKind::Native => Ok(Arc::new(NativePlatform::new())),
        BackendKind::Simulated => Ok(Arc::new(SimulatedDesktop::demo())),
    }
}

/// Real desktop: OS processes, enigo input, xcap capture and (on Windows)
/// UI Automation.
pub struct NativePlatform {
    input: Arc<NativeInput>,
    /// Processes started by this server, keyed by pid
    children: Mutex<HashMap<u32, Child>>,
}

impl Default for NativePlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl NativePlatform {
    pub fn new() -> Self {
        Self {
            input: Arc::new(NativeInput::new()),
            children: Mutex::new(HashMap::new()),
        }
    }

    fn command(spec: &LaunchSpec) -> Command {
        let mut command = Command::new(&spec.path);
        if let Some(arguments) = spec.arguments.as_deref() {
            #[cfg(target_os = "windows")]
            {
                use std::os::windows::process::CommandExt;
                command.raw_arg(arguments);
            }
            #[cfg(not(target_os = "windows"))]
            {
                command.args(arguments.split_whitespace());
            }
        }
        if let Some(dir) = spec.working_dir.as_deref() {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl Platform for NativePlatform {
    fn create_automation(&self) -> Result<Arc<dyn Automation>> {
        #[cfg(target_os = "windows")]
        {
            Ok(Arc::new(windows::UiaAutomation::new()?))
        }

        #[cfg(not(target_os = "windows"))]
        {
            Err(anyhow!("UI Automation is only available on Windows"))
        }
    }

    fn input(&self) -> Arc<dyn InputDevice> {
        self.input.clone()
    }

    async fn launch(&self, spec: &LaunchSpec) -> Result<AppHandle> {
        let child = Self::command(spec)
            .spawn()
            .with_context(|| format!("Failed to start '{}'", spec.path))?;
        let process_id = child.id();
        tracing::info!("Started '{}' as process {}", spec.path, process_id);

        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(process_id, child);
        Ok(AppHandle { process_id })
    }

    async fn launch_packaged(&self, app_id: &str, arguments: Option<&str>) -> Result<AppHandle> {
        #[cfg(target_os = "windows")]
        {
            let process_id = windows::activate_packaged_app(app_id, arguments).await?;
            tracing::info!("Activated '{}' as process {}", app_id, process_id);
            Ok(AppHandle { process_id })
        }

        #[cfg(not(target_os = "windows"))]
        {
            let _ = arguments;
            Err(anyhow!(
                "Cannot activate '{}': packaged applications are only available on Windows",
                app_id
            ))
        }
    }

    async fn processes(&self) -> Result<Vec<ProcessWindow>> {
        #[cfg(target_os = "windows")]
        {
            windows::main_windows().await
        }

        #[cfg(not(target_os = "windows"))]
        {
            Ok(Vec::new())
        }
    }

    async fn attach(&self, process_id: u32) -> Result<AppHandle> {
        let app = AppHandle { process_id };
        if self.has_exited(&app).await {
            return Err(anyhow!("Process {} is not running", process_id));
        }
        Ok(app)
    }

    async fn has_exited(&self, app: &AppHandle) -> bool {
        {
            let mut children = self.children.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(child) = children.get_mut(&app.process_id) {
                return !matches!(child.try_wait(), Ok(None));
            }
        }

        #[cfg(target_os = "windows")]
        {
            !windows::is_process_running(app.process_id)
        }

        #[cfg(not(target_os = "windows"))]
        {
            !std::path::Path::new(&format!("/proc/{}", app.process_id)).exists()
        }
    }

    async fn close(&self, app: &AppHandle) -> Result<()> {
        let child = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&app.process_id);

        match child {
            Some(mut child) => {
                child
                    .kill()
                    .with_context(|| format!("Failed to stop process {}", app.process_id))?;
                let _ = child.wait();
                Ok(())
            }
            None => {
                #[cfg(target_os = "windows")]
                {
                    windows::terminate_process(app.process_id)
                }

                #[cfg(not(target_os = "windows"))]
                {
                    Err(anyhow!(
                        "Process {} was not started by this server",
                        app.process_id
                    ))
                }
            }
        }
    }

    fn capture(&self, area: Rect) -> Result<RgbaImage> {
        ScreenCapture::capture_area(area)
    }
}
