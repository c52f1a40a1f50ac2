use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Which automation backend sessions are created against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Real OS accessibility tree and input devices
    #[default]
    Native,
    /// In-memory desktop, for dry runs
    Simulated,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "simulated" => Ok(Self::Simulated),
            other => Err(format!("unknown backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Period of the timed-out session sweep
    pub cleanup_interval: Duration,
    /// Value the `appium:automationName` capability must carry
    pub automation_name: String,
    pub backend: BackendKind,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: env::var("UIA_WEBDRIVER_HOST").unwrap_or(defaults.host),
            port: parse_var("UIA_WEBDRIVER_PORT").unwrap_or(defaults.port),
            cleanup_interval: parse_var::<u64>("UIA_WEBDRIVER_CLEANUP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            automation_name: env::var("UIA_WEBDRIVER_AUTOMATION_NAME")
                .ok()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.automation_name),
            backend: parse_var("UIA_WEBDRIVER_BACKEND").unwrap_or(defaults.backend),
        }
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address {}: {}", addr, e))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4723,
            cleanup_interval: Duration::from_secs(60),
            automation_name: "uia".to_string(),
            backend: BackendKind::Native,
        }
    }
}

fn parse_var<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
