use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::{Result, WebDriverError};

/// Session timeouts in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeouts {
    /// `None` means scripts never time out
    pub script: Option<u64>,
    pub page_load: u64,
    pub implicit: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            script: Some(30_000),
            page_load: 300_000,
            implicit: 0,
        }
    }
}

impl Timeouts {
    /// Parse a `timeouts` object, starting from the defaults.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut timeouts = Self::default();
        timeouts.apply(value)?;
        Ok(timeouts)
    }

    /// Apply a partial update. Nothing changes unless every given value is valid.
    pub fn apply(&mut self, value: &Value) -> Result<()> {
        let object = value.as_object().ok_or_else(|| {
            WebDriverError::InvalidArgument("Timeouts must be a JSON object".to_string())
        })?;

        let mut updated = *self;
        if let Some(script) = object.get("script") {
            updated.script = match script {
                Value::Null => None,
                other => Some(milliseconds("script", other)?),
            };
        }
        if let Some(page_load) = object.get("pageLoad") {
            updated.page_load = milliseconds("pageLoad", page_load)?;
        }
        if let Some(implicit) = object.get("implicit") {
            updated.implicit = milliseconds("implicit", implicit)?;
        }

        *self = updated;
        Ok(())
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_millis(self.implicit)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_millis(self.page_load)
    }

    pub fn script_timeout(&self) -> Option<Duration> {
        self.script.map(Duration::from_millis)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn milliseconds(key: &str, value: &Value) -> Result<u64> {
    let parsed = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    });
    parsed.ok_or_else(|| {
        WebDriverError::InvalidArgument(format!(
            "Timeout '{}' must be a non-negative integer, got {}",
            key, value
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_serialize_in_wire_shape() {
        let json = serde_json::to_value(Timeouts::default()).unwrap();
        assert_eq!(
            json,
            json!({"script": 30000, "pageLoad": 300000, "implicit": 0})
        );
    }

    #[test]
    fn test_partial_update() {
        let mut timeouts = Timeouts::default();
        timeouts.apply(&json!({"implicit": 1500, "script": null})).unwrap();
        assert_eq!(timeouts.implicit_wait(), Duration::from_millis(1500));
        assert_eq!(timeouts.script_timeout(), None);
        assert_eq!(timeouts.page_load, 300_000);
    }

    #[test]
    fn test_invalid_values_leave_timeouts_untouched() {
        let mut timeouts = Timeouts::default();
        let err = timeouts
            .apply(&json!({"implicit": 10, "pageLoad": -1}))
            .unwrap_err();
        assert_eq!(err.code(), "invalid argument");
        assert_eq!(timeouts, Timeouts::default());

        assert!(timeouts.apply(&json!({"implicit": 1.5})).is_err());
        assert!(timeouts.apply(&json!({"implicit": "10"})).is_err());
        assert!(timeouts.apply(&json!([1, 2])).is_err());

        // whole floats are accepted
        timeouts.apply(&json!({"implicit": 20.0})).unwrap();
        assert_eq!(timeouts.implicit, 20);
    }
}
