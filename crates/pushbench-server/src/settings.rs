//! Server settings and the layered loader.
//!
//! Resolution order: compiled defaults, then an optional JSON file
//! deep-merged over them, then `PUSHBENCH_*` environment variables.

use std::path::Path;
use std::time::Duration;

use pushbench_engine::{RateLimitPolicy, SessionConfig};
use pushbench_telemetry::TelemetryConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub max_tokens: f64,
    pub refill_per_second: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let policy = RateLimitPolicy::default();
        Self {
            max_tokens: policy.max_tokens,
            refill_per_second: policy.refill_per_second,
        }
    }
}

/// Top-level settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    /// `0` binds an ephemeral port.
    pub port: u16,
    /// Frames buffered per connection before writes report backpressure.
    pub max_send_queue: usize,
    pub heartbeat_interval_secs: u64,
    pub refill_interval_ms: u64,
    pub rate_limit: RateLimitSettings,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            max_send_queue: 256,
            heartbeat_interval_secs: 30,
            refill_interval_ms: 1000,
            rate_limit: RateLimitSettings::default(),
            log_level: "info".into(),
            log_json: false,
        }
    }
}

impl Settings {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timer and limiter settings handed to both registries.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            heartbeat_interval: Duration::from_secs(self.heartbeat_interval_secs),
            refill_interval: Duration::from_millis(self.refill_interval_ms),
            rate_limit: RateLimitPolicy {
                max_tokens: self.rate_limit.max_tokens,
                refill_per_second: self.rate_limit.refill_per_second,
            },
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            log_level: self.log_level.clone(),
            json: self.log_json,
            ..TelemetryConfig::default()
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_send_queue == 0 {
            return Err(SettingsError::InvalidValue("max_send_queue must be at least 1".into()));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "heartbeat_interval_secs must be at least 1".into(),
            ));
        }
        if self.refill_interval_ms == 0 {
            return Err(SettingsError::InvalidValue("refill_interval_ms must be at least 1".into()));
        }
        if self.rate_limit.max_tokens.is_nan() || self.rate_limit.max_tokens < 1.0 {
            return Err(SettingsError::InvalidValue("rate_limit.max_tokens must be at least 1".into()));
        }
        if self.rate_limit.refill_per_second.is_nan() || self.rate_limit.refill_per_second < 0.0 {
            return Err(SettingsError::InvalidValue(
                "rate_limit.refill_per_second must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Load settings from `path` (if it exists) with env var overrides, then validate.
pub fn load_settings_from_path(path: &Path) -> Result<Settings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Defaults with the file deep-merged on top. A missing file yields defaults.
pub fn load_file_layer(path: &Path) -> Result<Settings> {
    let defaults = serde_json::to_value(Settings::default())?;
    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };
    Ok(serde_json::from_value(merged)?)
}

/// Recursive merge: objects merge per key, everything else is replaced.
/// Nulls in `source` keep the target value.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply `PUSHBENCH_*` overrides read through `lookup`.
///
/// Values that fail to parse or fall outside their range are logged and
/// ignored.
pub fn apply_overrides_from(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("PUSHBENCH_HOST") {
        settings.host = v;
    }
    if let Some(v) = read("PUSHBENCH_PORT") {
        match parse_u16_range(&v, 1, u16::MAX) {
            Some(port) => settings.port = port,
            None => warn!(key = "PUSHBENCH_PORT", value = %v, "invalid port env var, ignoring"),
        }
    }
    if let Some(v) = read("PUSHBENCH_HEARTBEAT_INTERVAL_SECS") {
        match parse_u64_range(&v, 1, 3600) {
            Some(secs) => settings.heartbeat_interval_secs = secs,
            None => warn!(key = "PUSHBENCH_HEARTBEAT_INTERVAL_SECS", value = %v, "invalid interval env var, ignoring"),
        }
    }
    if let Some(v) = read("PUSHBENCH_MAX_SEND_QUEUE") {
        match parse_u64_range(&v, 1, 1_000_000) {
            Some(n) => settings.max_send_queue = n as usize,
            None => warn!(key = "PUSHBENCH_MAX_SEND_QUEUE", value = %v, "invalid queue size env var, ignoring"),
        }
    }
    if let Some(v) = read("PUSHBENCH_LOG_LEVEL") {
        settings.log_level = v;
    }
    if let Some(v) = read("PUSHBENCH_LOG_JSON") {
        match parse_bool(&v) {
            Some(json) => settings.log_json = json,
            None => warn!(key = "PUSHBENCH_LOG_JSON", value = %v, "invalid boolean env var, ignoring"),
        }
    }
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.bind_addr(), "127.0.0.1:3001");
        assert_eq!(s.max_send_queue, 256);
        assert_eq!(s.session_config(), SessionConfig::default());
        assert!(s.validate().is_ok());
    }

    #[test]
    fn merge_nested_override() {
        let merged = deep_merge(
            json!({"rate_limit": {"max_tokens": 100.0, "refill_per_second": 10.0}, "port": 3001}),
            json!({"rate_limit": {"max_tokens": 5.0}}),
        );
        assert_eq!(merged["rate_limit"]["max_tokens"], 5.0);
        assert_eq!(merged["rate_limit"]["refill_per_second"], 10.0);
        assert_eq!(merged["port"], 3001);
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(json!({"host": "a"}), json!({"host": null}));
        assert_eq!(merged["host"], "a");
    }

    #[test]
    fn merge_array_and_primitive_replace() {
        assert_eq!(deep_merge(json!({"a": [1, 2]}), json!({"a": [3]}))["a"], json!([3]));
        assert_eq!(deep_merge(json!(1), json!({"x": 1})), json!({"x": 1}));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_partially_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"port": 8080, "rate_limit": {{"refill_per_second": 50}}}}"#).unwrap();
        let settings = load_file_layer(file.path()).unwrap();
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.rate_limit.refill_per_second, 50.0);
        assert_eq!(settings.rate_limit.max_tokens, 100.0);
        assert_eq!(settings.host, "127.0.0.1");
    }

    #[test]
    fn invalid_json_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(load_file_layer(file.path()), Err(SettingsError::Json(_))));
    }

    #[test]
    fn validation_rejects_zero_queue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_send_queue": 0}}"#).unwrap();
        assert!(matches!(
            load_settings_from_path(file.path()),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn validation_rejects_tiny_bucket() {
        let settings = Settings {
            rate_limit: RateLimitSettings {
                max_tokens: 0.5,
                refill_per_second: 1.0,
            },
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = Settings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[
                ("PUSHBENCH_HOST", "0.0.0.0"),
                ("PUSHBENCH_PORT", "9000"),
                ("PUSHBENCH_HEARTBEAT_INTERVAL_SECS", "5"),
                ("PUSHBENCH_MAX_SEND_QUEUE", "32"),
                ("PUSHBENCH_LOG_LEVEL", "debug"),
                ("PUSHBENCH_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(settings.bind_addr(), "0.0.0.0:9000");
        assert_eq!(settings.heartbeat_interval_secs, 5);
        assert_eq!(settings.max_send_queue, 32);
        assert_eq!(settings.log_level, "debug");
        assert!(settings.log_json);
        assert!(settings.telemetry_config().json);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = Settings::default();
        apply_overrides_from(
            &mut settings,
            lookup(&[
                ("PUSHBENCH_PORT", "0"),
                ("PUSHBENCH_HEARTBEAT_INTERVAL_SECS", "soon"),
                ("PUSHBENCH_MAX_SEND_QUEUE", "-1"),
                ("PUSHBENCH_LOG_JSON", "maybe"),
                ("PUSHBENCH_HOST", ""),
            ]),
        );
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_u16_range("70000", 1, u16::MAX), None);
        assert_eq!(parse_u64_range("10", 1, 5), None);
        assert_eq!(parse_u64_range("3", 1, 5), Some(3));
    }
}
