//! Settings resolution and the persisted config file.

use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

/// Keys accepted by `config set` and understood by [`Settings`].
pub const KEYS: [&str; 5] = [
    "backoff_base",
    "default_max_retries",
    "poll_interval_ms",
    "processing_timeout_secs",
    "max_backoff_secs",
];

const CONFIG_DIR: &str = ".config";
const CONFIG_FILE: &str = "config.json";
const ENV_PREFIX: &str = "JOBQ_";

/// Effective, validated tunables.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base of the exponential backoff, in seconds.
    pub backoff_base: f64,
    /// Attempt ceiling applied when an enqueue does not name one.
    pub default_max_retries: u32,
    /// Worker poll interval.
    pub poll_interval: Duration,
    /// Age after which a `processing` claim is considered orphaned and
    /// swept back to pending. Absent means the sweep is disabled.
    pub processing_timeout: Option<Duration>,
    /// Ceiling on the backoff delay. Absent means unbounded growth.
    pub max_backoff: Option<Duration>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backoff_base: 2.0,
            default_max_retries: 3,
            poll_interval: Duration::from_millis(2000),
            processing_timeout: None,
            max_backoff: None,
        }
    }
}

/// Reads and writes the layered configuration.
///
/// The persisted file lives at `.config/config.json` under the working
/// directory, matching where `config set` writes.
#[derive(Debug, Clone)]
pub struct ConfigProvider {
    path: PathBuf,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self {
            path: Path::new(CONFIG_DIR).join(CONFIG_FILE),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve effective settings: file over environment over defaults.
    pub fn load(&self) -> ConfigResult<Settings> {
        let file = self.read_file()?;
        resolve(&file, |key| std::env::var(key).ok())
    }

    /// Effective value for one key, as JSON.
    pub fn get(&self, key: &str) -> ConfigResult<Value> {
        let settings = self.load()?;
        let value = match key {
            "backoff_base" => json!(settings.backoff_base),
            "default_max_retries" => json!(settings.default_max_retries),
            "poll_interval_ms" => json!(settings.poll_interval.as_millis() as u64),
            "processing_timeout_secs" => json!(settings.processing_timeout.map(|d| d.as_secs())),
            "max_backoff_secs" => json!(settings.max_backoff.map(|d| d.as_secs())),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        };
        Ok(value)
    }

    /// All effective values keyed by name, for `config show`.
    pub fn effective(&self) -> ConfigResult<Map<String, Value>> {
        let mut map = Map::new();
        for key in KEYS {
            map.insert(key.to_string(), self.get(key)?);
        }
        Ok(map)
    }

    /// Validate and persist one key into the config file.
    pub fn set(&self, key: &str, value: &str) -> ConfigResult<Value> {
        if !KEYS.contains(&key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let parsed = parse_value(key, value)?;

        let mut file = self.read_file()?;
        file.insert(key.to_string(), parsed.clone());

        // Round-trip the whole document through resolution so a bad
        // combination never lands on disk.
        resolve(&file, |_| None)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&file)?)?;
        Ok(parsed)
    }

    fn read_file(&self) -> ConfigResult<Map<String, Value>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => {
                let value: Value = serde_json::from_str(&text)?;
                Ok(value.as_object().cloned().unwrap_or_default())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Default for ConfigProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_value(key: &str, raw: &str) -> ConfigResult<Value> {
    let invalid = |message: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    };

    match key {
        "backoff_base" => {
            let n: f64 = raw.parse().map_err(|_| invalid("must be a number"))?;
            if !n.is_finite() || n <= 0.0 {
                return Err(invalid("must be a positive number"));
            }
            Ok(json!(n))
        }
        "default_max_retries" => {
            let n: u32 = raw.parse().map_err(|_| invalid("must be a positive integer"))?;
            if n == 0 {
                return Err(invalid("must be a positive integer"));
            }
            Ok(json!(n))
        }
        "poll_interval_ms" => {
            let n: u64 = raw.parse().map_err(|_| invalid("must be a positive integer"))?;
            if n == 0 {
                return Err(invalid("must be a positive integer"));
            }
            Ok(json!(n))
        }
        "processing_timeout_secs" | "max_backoff_secs" => {
            let n: u64 = raw.parse().map_err(|_| invalid("must be a positive integer"))?;
            if n == 0 {
                return Err(invalid("must be a positive integer"));
            }
            Ok(json!(n))
        }
        other => Err(ConfigError::UnknownKey(other.to_string())),
    }
}

/// Apply the precedence rules. `env` abstracts the environment so the
/// layering is testable without mutating the process env.
fn resolve(
    file: &Map<String, Value>,
    env: impl Fn(&str) -> Option<String>,
) -> ConfigResult<Settings> {
    let defaults = Settings::default();

    let backoff_base = lookup_f64(file, &env, "backoff_base")?.unwrap_or(defaults.backoff_base);
    if !backoff_base.is_finite() || backoff_base <= 0.0 {
        return Err(ConfigError::InvalidValue {
            key: "backoff_base".to_string(),
            message: "must be a positive number".to_string(),
        });
    }

    let default_max_retries = lookup_u64(file, &env, "default_max_retries")?
        .map(require_positive("default_max_retries"))
        .transpose()?
        .unwrap_or(defaults.default_max_retries as u64) as u32;

    let poll_interval = lookup_u64(file, &env, "poll_interval_ms")?
        .map(require_positive("poll_interval_ms"))
        .transpose()?
        .map(Duration::from_millis)
        .unwrap_or(defaults.poll_interval);

    let processing_timeout = lookup_u64(file, &env, "processing_timeout_secs")?
        .map(require_positive("processing_timeout_secs"))
        .transpose()?
        .map(Duration::from_secs);

    let max_backoff = lookup_u64(file, &env, "max_backoff_secs")?
        .map(require_positive("max_backoff_secs"))
        .transpose()?
        .map(Duration::from_secs);

    Ok(Settings {
        backoff_base,
        default_max_retries,
        poll_interval,
        processing_timeout,
        max_backoff,
    })
}

fn env_name(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_uppercase())
}

fn require_positive(key: &str) -> impl Fn(u64) -> ConfigResult<u64> + '_ {
    move |n| {
        if n == 0 {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be a positive integer".to_string(),
            })
        } else {
            Ok(n)
        }
    }
}

fn lookup_f64(
    file: &Map<String, Value>,
    env: impl Fn(&str) -> Option<String>,
    key: &str,
) -> ConfigResult<Option<f64>> {
    if let Some(value) = file.get(key) {
        return value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be a number".to_string(),
            });
    }
    match env(&env_name(key)) {
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: env_name(key),
                message: "must be a number".to_string(),
            }),
        None => Ok(None),
    }
}

fn lookup_u64(
    file: &Map<String, Value>,
    env: impl Fn(&str) -> Option<String>,
    key: &str,
) -> ConfigResult<Option<u64>> {
    if let Some(value) = file.get(key) {
        return value
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.to_string(),
                message: "must be a non-negative integer".to_string(),
            });
    }
    match env(&env_name(key)) {
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: env_name(key),
                message: "must be a non-negative integer".to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_apply_with_empty_layers() {
        let settings = resolve(&Map::new(), no_env).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backoff_base, 2.0);
        assert_eq!(settings.default_max_retries, 3);
        assert_eq!(settings.poll_interval, Duration::from_millis(2000));
        assert_eq!(settings.processing_timeout, None);
        assert_eq!(settings.max_backoff, None);
    }

    #[test]
    fn test_env_overrides_defaults() {
        let env = |key: &str| match key {
            "JOBQ_BACKOFF_BASE" => Some("3".to_string()),
            "JOBQ_DEFAULT_MAX_RETRIES" => Some("5".to_string()),
            _ => None,
        };
        let settings = resolve(&Map::new(), env).unwrap();
        assert_eq!(settings.backoff_base, 3.0);
        assert_eq!(settings.default_max_retries, 5);
    }

    #[test]
    fn test_file_overrides_env() {
        let mut file = Map::new();
        file.insert("backoff_base".to_string(), json!(4.0));

        let env = |key: &str| (key == "JOBQ_BACKOFF_BASE").then(|| "9".to_string());
        let settings = resolve(&file, env).unwrap();
        assert_eq!(settings.backoff_base, 4.0);
    }

    #[test]
    fn test_optional_durations_resolve() {
        let mut file = Map::new();
        file.insert("processing_timeout_secs".to_string(), json!(120));
        file.insert("max_backoff_secs".to_string(), json!(300));

        let settings = resolve(&file, no_env).unwrap();
        assert_eq!(settings.processing_timeout, Some(Duration::from_secs(120)));
        assert_eq!(settings.max_backoff, Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = Map::new();
        file.insert("backoff_base".to_string(), json!(-1.0));
        assert!(resolve(&file, no_env).is_err());

        let mut file = Map::new();
        file.insert("default_max_retries".to_string(), json!(0));
        assert!(resolve(&file, no_env).is_err());

        let bad_env = |key: &str| (key == "JOBQ_POLL_INTERVAL_MS").then(|| "soon".to_string());
        assert!(resolve(&Map::new(), bad_env).is_err());
    }

    #[test]
    fn test_parse_value_validation() {
        assert!(parse_value("backoff_base", "2.5").is_ok());
        assert!(parse_value("backoff_base", "0").is_err());
        assert!(parse_value("backoff_base", "abc").is_err());
        assert!(parse_value("default_max_retries", "4").is_ok());
        assert!(parse_value("default_max_retries", "0").is_err());
        assert!(matches!(
            parse_value("no_such_key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_set_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("jobq-config-{}", std::process::id()));
        let provider = ConfigProvider::with_path(dir.join("config.json"));

        provider.set("backoff_base", "3").unwrap();
        provider.set("default_max_retries", "7").unwrap();
        assert!(provider.set("backoff_base", "nope").is_err());
        assert!(matches!(
            provider.set("color", "blue"),
            Err(ConfigError::UnknownKey(_))
        ));

        let settings = provider.load().unwrap();
        assert_eq!(settings.backoff_base, 3.0);
        assert_eq!(settings.default_max_retries, 7);

        std::fs::remove_dir_all(&dir).ok();
    }
}
