//! Capability negotiation: merge `alwaysMatch` with each `firstMatch`
//! alternative, pick the first candidate this server can honor and resolve
//! the application it names.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::session::{Session, SessionOptions, DEFAULT_NEW_COMMAND_TIMEOUT};
use super::timeouts::Timeouts;
use crate::desktop::{AppHandle, LaunchSpec, Platform};
use crate::error::{Result, WebDriverError};

const PLATFORM_NAME: &str = "platformName";
const AUTOMATION_NAME: &str = "appium:automationName";
const APP: &str = "appium:app";
const APP_ARGUMENTS: &str = "appium:appArguments";
const APP_WORKING_DIR: &str = "appium:appWorkingDir";
const APP_TOP_LEVEL_WINDOW: &str = "appium:appTopLevelWindow";
const APP_TOP_LEVEL_WINDOW_TITLE_MATCH: &str = "appium:appTopLevelWindowTitleMatch";
const NEW_COMMAND_TIMEOUT: &str = "appium:newCommandTimeout";
const TIMEOUTS: &str = "timeouts";

/// `appium:app` value selecting the whole desktop instead of an application
const ROOT_APP: &str = "Root";

/// Packaged application ids look like `<package family>!<application>`.
fn is_packaged_app(path: &str) -> bool {
    path.contains('!')
}

/// One `firstMatch` alternative merged with `alwaysMatch`
#[derive(Debug, Clone, PartialEq)]
pub struct MergedCapabilities(Map<String, Value>);

impl MergedCapabilities {
    pub fn merge(first_match: &Map<String, Value>, always_match: &Map<String, Value>) -> Result<Self> {
        let duplicates: Vec<&str> = first_match
            .keys()
            .filter(|key| always_match.contains_key(*key))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            return Err(WebDriverError::InvalidArgument(format!(
                "Capabilities cannot be merged because there are duplicate capabilities: {}",
                duplicates.join(", ")
            )));
        }

        let mut merged = first_match.clone();
        merged.extend(always_match.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(Self(merged))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn string(&self, key: &str) -> Result<Option<&str>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(WebDriverError::InvalidArgument(format!(
                "Capability {} must be a string",
                key
            ))),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        match self.0.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(_) => Err(WebDriverError::InvalidArgument(format!(
                "Capability {} must be a number",
                key
            ))),
        }
    }

    fn copy_to(&self, key: &str, matched: &mut Map<String, Value>) {
        if let Some(value) = self.0.get(key) {
            matched.insert(key.to_string(), value.clone());
        }
    }

    /// Check the candidate against what this server supports. `Ok(Err(_))`
    /// carries the reason the candidate was rejected; type errors in known
    /// capabilities fail the whole request.
    pub fn try_match(&self, automation_name: &str) -> Result<std::result::Result<MatchedCapabilities, String>> {
        let mut matched = Map::new();
        let mut missing = Vec::new();

        match self.string(PLATFORM_NAME)? {
            Some(name) if name.eq_ignore_ascii_case("windows") => {
                self.copy_to(PLATFORM_NAME, &mut matched)
            }
            _ => missing.push(format!(
                "Missing capability '{}' with value 'windows'",
                PLATFORM_NAME
            )),
        }
        match self.string(AUTOMATION_NAME)? {
            Some(name) if name.eq_ignore_ascii_case(automation_name) => {
                self.copy_to(AUTOMATION_NAME, &mut matched)
            }
            _ => missing.push(format!(
                "Missing capability '{}' with value '{}'",
                AUTOMATION_NAME, automation_name
            )),
        }
        if !missing.is_empty() {
            return Ok(Err(missing.join(", ")));
        }

        let target = if let Some(path) = self.string(APP)? {
            self.copy_to(APP, &mut matched);
            if path == ROOT_APP {
                AppTarget::Desktop
            } else {
                self.copy_to(APP_ARGUMENTS, &mut matched);
                let arguments = self.string(APP_ARGUMENTS)?.map(str::to_string);
                if is_packaged_app(path) {
                    AppTarget::Packaged {
                        app_id: path.to_string(),
                        arguments,
                    }
                } else {
                    self.copy_to(APP_WORKING_DIR, &mut matched);
                    AppTarget::Launch(LaunchSpec {
                        path: path.to_string(),
                        arguments,
                        working_dir: self.string(APP_WORKING_DIR)?.map(str::to_string),
                    })
                }
            }
        } else if let Some(handle) = self.string(APP_TOP_LEVEL_WINDOW)? {
            self.copy_to(APP_TOP_LEVEL_WINDOW, &mut matched);
            AppTarget::TopLevelWindow(handle.to_string())
        } else if let Some(pattern) = self.string(APP_TOP_LEVEL_WINDOW_TITLE_MATCH)? {
            self.copy_to(APP_TOP_LEVEL_WINDOW_TITLE_MATCH, &mut matched);
            AppTarget::TitleMatch(pattern.to_string())
        } else {
            return Ok(Err(format!(
                "One of '{}', '{}' or '{}' should be specified",
                APP, APP_TOP_LEVEL_WINDOW, APP_TOP_LEVEL_WINDOW_TITLE_MATCH
            )));
        };

        self.copy_to(NEW_COMMAND_TIMEOUT, &mut matched);
        self.copy_to(TIMEOUTS, &mut matched);

        let unmatched: Vec<&str> = self
            .0
            .keys()
            .filter(|key| !matched.contains_key(*key))
            .map(String::as_str)
            .collect();
        if !unmatched.is_empty() {
            return Ok(Err(format!(
                "The following capabilities could not be matched: '{}'",
                unmatched.join("', '")
            )));
        }

        let timeouts = match self.0.get(TIMEOUTS) {
            Some(value) => Timeouts::from_value(value)?,
            None => Timeouts::default(),
        };
        let new_command_timeout = match self.number(NEW_COMMAND_TIMEOUT)? {
            Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| {
                WebDriverError::InvalidArgument(format!(
                    "Capability {} must be a non-negative number of seconds",
                    NEW_COMMAND_TIMEOUT
                ))
            })?,
            None => DEFAULT_NEW_COMMAND_TIMEOUT,
        };

        Ok(Ok(MatchedCapabilities {
            capabilities: matched,
            target,
            timeouts,
            new_command_timeout,
        }))
    }
}

/// Application a new session drives
#[derive(Debug, Clone, PartialEq)]
pub enum AppTarget {
    /// The whole desktop, no application
    Desktop,
    Launch(LaunchSpec),
    Packaged {
        app_id: String,
        arguments: Option<String>,
    },
    /// Attach by main window handle, as a hexadecimal string
    TopLevelWindow(String),
    /// Attach by a regex over main window titles
    TitleMatch(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedCapabilities {
    /// The accepted capabilities, echoed back to the client
    pub capabilities: Map<String, Value>,
    pub target: AppTarget,
    pub timeouts: Timeouts,
    pub new_command_timeout: Duration,
}

/// Pick the first candidate that matches, in request order.
pub fn negotiate(
    always_match: Option<&Map<String, Value>>,
    first_match: Option<&[Map<String, Value>]>,
    automation_name: &str,
) -> Result<MatchedCapabilities> {
    let empty = Map::new();
    let always_match = always_match.unwrap_or(&empty);
    let alternatives = match first_match {
        Some(list) if !list.is_empty() => list,
        _ => std::slice::from_ref(&empty),
    };

    let candidates = alternatives
        .iter()
        .map(|first| MergedCapabilities::merge(first, always_match))
        .collect::<Result<Vec<_>>>()?;

    let mut mismatches = Vec::with_capacity(candidates.len());
    for candidate in &candidates {
        match candidate.try_match(automation_name)? {
            Ok(matched) => return Ok(matched),
            Err(reason) => mismatches.push(reason),
        }
    }
    Err(WebDriverError::SessionNotCreated(mismatches.join("; ")))
}

/// Launch or attach to the target application. The flag tells whether the
/// session owns (and will close) the application.
pub async fn resolve_app(
    platform: &dyn Platform,
    target: &AppTarget,
) -> Result<(Option<AppHandle>, bool)> {
    match target {
        AppTarget::Desktop => Ok((None, false)),
        AppTarget::Launch(spec) => {
            let app = platform
                .launch(spec)
                .await
                .map_err(|e| launch_failed(&spec.path, spec.arguments.as_deref(), e))?;
            Ok((Some(app), true))
        }
        AppTarget::Packaged { app_id, arguments } => {
            let app = platform
                .launch_packaged(app_id, arguments.as_deref())
                .await
                .map_err(|e| launch_failed(app_id, arguments.as_deref(), e))?;
            Ok((Some(app), true))
        }
        AppTarget::TopLevelWindow(raw) => {
            let handle = parse_window_handle(raw)?;
            let process = platform
                .processes()
                .await?
                .into_iter()
                .find(|p| p.window_handle == handle)
                .ok_or_else(|| {
                    WebDriverError::InvalidArgument(format!(
                        "Process with main window handle {} could not be found",
                        raw
                    ))
                })?;
            Ok((Some(platform.attach(process.process_id).await?), false))
        }
        AppTarget::TitleMatch(pattern) => {
            let regex = Regex::new(pattern).map_err(|e| {
                WebDriverError::InvalidArgument(format!(
                    "Capability {} '{}' is not a valid regular expression: {}",
                    APP_TOP_LEVEL_WINDOW_TITLE_MATCH, pattern, e
                ))
            })?;
            let matching: Vec<_> = platform
                .processes()
                .await?
                .into_iter()
                .filter(|p| regex.is_match(&p.title))
                .collect();
            match matching.as_slice() {
                [] => Err(WebDriverError::InvalidArgument(format!(
                    "Process with main window title matching '{}' could not be found",
                    pattern
                ))),
                [process] => Ok((Some(platform.attach(process.process_id).await?), false)),
                many => Err(WebDriverError::InvalidArgument(format!(
                    "Found multiple ({}) processes with main window title matching '{}'",
                    many.len(),
                    pattern
                ))),
            }
        }
    }
}

fn launch_failed(path: &str, arguments: Option<&str>, e: anyhow::Error) -> WebDriverError {
    WebDriverError::InvalidArgument(format!(
        "Starting app '{}' with arguments '{}' threw an exception: {}",
        path,
        arguments.unwrap_or_default(),
        e
    ))
}

fn parse_window_handle(raw: &str) -> Result<i64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let handle = i64::from_str_radix(digits, 16).map_err(|_| {
        WebDriverError::InvalidArgument(format!(
            "Capability {} '{}' is not a valid hexadecimal string",
            APP_TOP_LEVEL_WINDOW, raw
        ))
    })?;
    if handle == 0 {
        return Err(WebDriverError::InvalidArgument(format!(
            "Capability {} '{}' should not be zero",
            APP_TOP_LEVEL_WINDOW, raw
        )));
    }
    Ok(handle)
}

/// Negotiate, resolve the application and open the session. A launched
/// application is closed again if the session cannot be opened.
pub async fn open_session(
    platform: Arc<dyn Platform>,
    always_match: Option<&Map<String, Value>>,
    first_match: Option<&[Map<String, Value>]>,
    automation_name: &str,
) -> Result<Session> {
    let matched = negotiate(always_match, first_match, automation_name)?;
    let (app, app_owned) = resolve_app(platform.as_ref(), &matched.target).await?;

    let options = SessionOptions {
        app: app.clone(),
        app_owned,
        capabilities: matched.capabilities,
        timeouts: matched.timeouts,
        new_command_timeout: matched.new_command_timeout,
    };
    match Session::create(platform.clone(), options).await {
        Ok(session) => Ok(session),
        Err(e) => {
            if let (true, Some(app)) = (app_owned, app) {
                if let Err(close_err) = platform.close(&app).await {
                    tracing::warn!(
                        "Failed to close application {} after session creation failed: {:#}",
                        app.process_id,
                        close_err
                    );
                }
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::SimulatedDesktop;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn base() -> Map<String, Value> {
        map(json!({"platformName": "Windows", "appium:automationName": "UIA"}))
    }

    #[test]
    fn test_merge_rejects_overlapping_keys() {
        let err = MergedCapabilities::merge(
            &map(json!({"platformName": "windows", "appium:app": "a.exe"})),
            &map(json!({"appium:app": "b.exe", "platformName": "windows"})),
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
        assert!(err
            .to_string()
            .starts_with("Capabilities cannot be merged because there are duplicate capabilities: "));
        assert!(err.to_string().contains("appium:app"));
        assert!(err.to_string().contains("platformName"));
    }

    #[test]
    fn test_missing_platform_and_engine_enumerates_both() {
        let err = negotiate(Some(&Map::new()), None, "uia").unwrap_err();
        assert_eq!(err.code(), "session not created");
        assert_eq!(
            err.to_string(),
            "Missing capability 'platformName' with value 'windows', \
             Missing capability 'appium:automationName' with value 'uia'"
        );
    }

    #[test]
    fn test_first_matching_alternative_wins() {
        let always = base();
        let first = vec![
            map(json!({"appium:app": "x.exe", "appium:unknown": 1})),
            map(json!({"appium:app": "Root", "appium:newCommandTimeout": 5})),
            map(json!({"appium:appTopLevelWindow": "1A2B"})),
        ];
        let matched = negotiate(Some(&always), Some(&first), "uia").unwrap();
        assert_eq!(matched.target, AppTarget::Desktop);
        assert_eq!(matched.new_command_timeout, Duration::from_secs(5));
        assert_eq!(matched.capabilities.len(), 4);
    }

    #[test]
    fn test_mismatches_are_aggregated_per_candidate() {
        let first = vec![
            map(json!({"appium:app": "x.exe", "appium:extra": true})),
            map(json!({})),
        ];
        let err = negotiate(Some(&base()), Some(&first), "uia").unwrap_err();
        assert_eq!(
            err.to_string(),
            "The following capabilities could not be matched: 'appium:extra'; \
             One of 'appium:app', 'appium:appTopLevelWindow' or \
             'appium:appTopLevelWindowTitleMatch' should be specified"
        );
    }

    #[test]
    fn test_working_dir_not_accepted_for_packaged_apps() {
        let mut caps = base();
        caps.insert("appium:app".into(), json!("Family_abc!App"));
        caps.insert("appium:appWorkingDir".into(), json!("C:\\"));
        let err = negotiate(Some(&caps), None, "uia").unwrap_err();
        assert!(err.to_string().contains("'appium:appWorkingDir'"));

        caps.remove("appium:appWorkingDir");
        caps.insert("appium:appArguments".into(), json!("--flag"));
        let matched = negotiate(Some(&caps), None, "uia").unwrap();
        assert_eq!(
            matched.target,
            AppTarget::Packaged {
                app_id: "Family_abc!App".to_string(),
                arguments: Some("--flag".to_string())
            }
        );
    }

    #[test]
    fn test_bad_capability_types_are_invalid_arguments() {
        let mut caps = base();
        caps.insert("appium:app".into(), json!(42));
        assert_eq!(negotiate(Some(&caps), None, "uia").unwrap_err().code(), "invalid argument");

        let mut caps = base();
        caps.insert("appium:app".into(), json!("Root"));
        caps.insert("timeouts".into(), json!({"implicit": -5}));
        assert_eq!(negotiate(Some(&caps), None, "uia").unwrap_err().code(), "invalid argument");
    }

    #[tokio::test]
    async fn test_resolve_by_window_handle() {
        let desktop = SimulatedDesktop::new();
        let process = desktop.start_process("Calculator");
        let raw = format!("{:x}", process.window_handle);

        let (app, owned) = resolve_app(&desktop, &AppTarget::TopLevelWindow(raw))
            .await
            .unwrap();
        assert_eq!(app.unwrap().process_id, process.process_id);
        assert!(!owned);

        for (raw, message) in [
            ("xyz", "Capability appium:appTopLevelWindow 'xyz' is not a valid hexadecimal string"),
            ("0", "Capability appium:appTopLevelWindow '0' should not be zero"),
            ("FFFFFF", "Process with main window handle FFFFFF could not be found"),
        ] {
            let err = resolve_app(&desktop, &AppTarget::TopLevelWindow(raw.to_string()))
                .await
                .unwrap_err();
            assert_eq!(err.to_string(), message);
        }
    }

    #[tokio::test]
    async fn test_resolve_by_title_match() {
        let desktop = SimulatedDesktop::new();
        let notepad = desktop.start_process("Untitled - Notepad");
        desktop.start_process("Notes.txt - Notepad");

        let (app, _) = resolve_app(&desktop, &AppTarget::TitleMatch("^Untitled".to_string()))
            .await
            .unwrap();
        assert_eq!(app.unwrap().process_id, notepad.process_id);

        let err = resolve_app(&desktop, &AppTarget::TitleMatch("Notepad$".to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Found multiple (2) processes with main window title matching 'Notepad$'"
        );

        let err = resolve_app(&desktop, &AppTarget::TitleMatch("Paint".to_string()))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Process with main window title matching 'Paint' could not be found"
        );

        let err = resolve_app(&desktop, &AppTarget::TitleMatch("(".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
    }

    #[tokio::test]
    async fn test_launch_failure_names_path_and_arguments() {
        let desktop = SimulatedDesktop::new();
        let target = AppTarget::Launch(LaunchSpec {
            path: "missing.exe".to_string(),
            arguments: Some("/x".to_string()),
            working_dir: None,
        });
        let err = resolve_app(&desktop, &target).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Starting app 'missing.exe' with arguments '/x' threw an exception: \
             The system cannot find the file specified"
        );
    }
}
