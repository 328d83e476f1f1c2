//! Progress widget configuration
//!
//! Options are read from TOML. Numeric values are accepted as integers,
//! floats or numeric strings; anything malformed silently falls back to a
//! documented default instead of failing the load.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{LoadbarError, Result};
use crate::scheduler::FrameSource;
use crate::stage::ContainerSpec;

/// Default total duration of a simulated run
pub const DEFAULT_DURATION_MS: u64 = 1500;

/// Duration used when the configured or requested one is unusable
pub const FALLBACK_DURATION_MS: u64 = 1200;

/// Default crawl ceiling
pub const DEFAULT_STOP_AT: f64 = 99.0;

/// Default fade duration
pub const DEFAULT_FADE_MS: u64 = 750;

/// Bounds of the randomly drawn slow-phase ceiling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlowRange {
    pub min: f64,
    pub max: f64,
}

impl SlowRange {
    /// Parse `"min-max"`; bounds given in either order are reordered
    pub fn parse(value: &str) -> Option<Self> {
        let (a, b) = value.trim().split_once('-')?;
        let a: f64 = a.trim().parse().ok()?;
        let b: f64 = b.trim().parse().ok()?;
        if !a.is_finite() || !b.is_finite() {
            return None;
        }
        Some(Self {
            min: a.min(b),
            max: a.max(b),
        })
    }
}

impl Default for SlowRange {
    fn default() -> Self {
        Self {
            min: 85.0,
            max: 96.0,
        }
    }
}

impl fmt::Display for SlowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl Serialize for SlowRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlowRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = toml::Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(SlowRange::parse)
            .unwrap_or_default())
    }
}

/// Options recognised by the progress widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProgressOptions {
    /// Custom markup for the root element, replacing the generated bar
    pub template: Option<String>,

    /// Mount point; defaults to the stage body
    pub container: ContainerSpec,

    /// Extra inline styles merged into the generated wrapper
    #[serde(alias = "container_style")]
    pub container_style: BTreeMap<String, String>,

    /// Extra class appended to the root element
    #[serde(alias = "custom_class")]
    pub custom_class: String,

    /// Prefix of every generated class name
    #[serde(alias = "class_prefix")]
    pub class_prefix: String,

    /// Whether generated elements carry inline styles
    #[serde(alias = "inline_style")]
    pub inline_style: bool,

    /// Total animation duration in ms; 0 means "use the fallback"
    #[serde(deserialize_with = "lenient::duration")]
    pub duration: u64,

    /// Abort a run after this many ms; 0 disables the timeout
    #[serde(deserialize_with = "lenient::duration")]
    pub timeout: u64,

    /// Range the slow-phase ceiling is drawn from
    #[serde(alias = "slow_range")]
    pub slow_range: SlowRange,

    /// Ceiling of the slow crawl
    #[serde(alias = "stop_at", deserialize_with = "lenient::percentage")]
    pub stop_at: f64,

    /// How frame ticks are paced
    #[serde(alias = "frame_source")]
    pub frame_source: FrameSource,

    /// Seed for the threshold draws; random when absent
    pub seed: Option<u64>,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            template: None,
            container: ContainerSpec::Body,
            container_style: BTreeMap::new(),
            custom_class: String::new(),
            class_prefix: "jwc".to_string(),
            inline_style: true,
            duration: DEFAULT_DURATION_MS,
            timeout: 0,
            slow_range: SlowRange::default(),
            stop_at: DEFAULT_STOP_AT,
            frame_source: FrameSource::Auto,
            seed: None,
        }
    }
}

impl ProgressOptions {
    /// Parse options from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| LoadbarError::ConfigParse {
            path: PathBuf::from("<inline>"),
            source,
        })
    }

    /// Load options from `path`, or from the default location
    ///
    /// A missing default file yields the defaults. A file named explicitly
    /// must exist.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !fs::try_exists(&path).await.unwrap_or(false) {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|source| LoadbarError::ConfigRead {
                path: path.clone(),
                source,
            })?;
        let options: ProgressOptions =
            toml::from_str(&content).map_err(|source| LoadbarError::ConfigParse {
                path: path.clone(),
                source,
            })?;

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(options)
    }

    /// `~/.config/loadbar/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("loadbar").join("config.toml"))
    }

    /// Duration of a run: the requested one, else the configured one,
    /// else the fallback when neither is usable
    pub fn effective_duration(&self, requested: Option<u64>) -> u64 {
        requested
            .filter(|ms| *ms > 0)
            .or(Some(self.duration).filter(|ms| *ms > 0))
            .unwrap_or(FALLBACK_DURATION_MS)
    }

    /// Crawl ceiling, falling back to 99 and capped at 100
    pub fn effective_stop_at(&self) -> f64 {
        if self.stop_at.is_finite() && self.stop_at > 0.0 {
            self.stop_at.min(100.0)
        } else {
            DEFAULT_STOP_AT
        }
    }

    /// Timeout in ms, if enabled
    pub fn timeout_ms(&self) -> Option<f64> {
        (self.timeout > 0).then_some(self.timeout as f64)
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer};

    fn number(value: &toml::Value) -> Option<f64> {
        let parsed = match value {
            toml::Value::Integer(i) => Some(*i as f64),
            toml::Value::Float(f) => Some(*f),
            toml::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|n| n.is_finite())
    }

    /// Non-negative whole milliseconds; malformed input reads as 0
    pub fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let value = toml::Value::deserialize(deserializer)?;
        Ok(number(&value)
            .filter(|n| *n > 0.0)
            .map(|n| n.trunc() as u64)
            .unwrap_or(0))
    }

    /// Any finite number; malformed input reads as 0
    pub fn percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = toml::Value::deserialize(deserializer)?;
        Ok(number(&value).unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let options = ProgressOptions::default();
        assert_eq!(options.duration, 1500);
        assert_eq!(options.timeout, 0);
        assert_eq!(options.slow_range, SlowRange { min: 85.0, max: 96.0 });
        assert_eq!(options.stop_at, 99.0);
        assert_eq!(options.class_prefix, "jwc");
        assert!(options.inline_style);
        assert_eq!(options.container, ContainerSpec::Body);
    }

    #[test]
    fn test_parse_camel_and_snake_case() {
        let options = ProgressOptions::from_toml_str(
            r##"
            duration = 3000
            timeout = "5000"
            slowRange = "90-80"
            stop_at = 97.5
            classPrefix = "app"
            custom_class = "dark"
            container = "#main"
            frameSource = "timer"

            [containerStyle]
            background-color = "#000"
            "##,
        )
        .unwrap();

        assert_eq!(options.duration, 3000);
        assert_eq!(options.timeout, 5000);
        assert_eq!(options.slow_range, SlowRange { min: 80.0, max: 90.0 });
        assert_eq!(options.stop_at, 97.5);
        assert_eq!(options.class_prefix, "app");
        assert_eq!(options.custom_class, "dark");
        assert_eq!(options.container, ContainerSpec::Selector("#main".to_string()));
        assert_eq!(options.frame_source, FrameSource::Timer);
        assert_eq!(options.container_style.get("background-color").unwrap(), "#000");
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let options = ProgressOptions::from_toml_str(
            r#"
            duration = "soon"
            timeout = -20
            slowRange = "fast"
            stopAt = [1, 2]
            "#,
        )
        .unwrap();

        assert_eq!(options.effective_duration(None), FALLBACK_DURATION_MS);
        assert_eq!(options.timeout_ms(), None);
        assert_eq!(options.slow_range, SlowRange::default());
        assert_eq!(options.effective_stop_at(), DEFAULT_STOP_AT);
    }

    #[test]
    fn test_effective_duration_prefers_request() {
        let options = ProgressOptions::default();
        assert_eq!(options.effective_duration(Some(800)), 800);
        assert_eq!(options.effective_duration(Some(0)), 1500);
        assert_eq!(options.effective_duration(None), 1500);
    }

    #[test]
    fn test_stop_at_capped_at_hundred() {
        let options = ProgressOptions {
            stop_at: 250.0,
            ..ProgressOptions::default()
        };
        assert_eq!(options.effective_stop_at(), 100.0);
    }

    #[test]
    fn test_slow_range_parse() {
        assert_eq!(SlowRange::parse("85-96"), Some(SlowRange { min: 85.0, max: 96.0 }));
        assert_eq!(SlowRange::parse(" 96 - 85 "), Some(SlowRange { min: 85.0, max: 96.0 }));
        assert_eq!(SlowRange::parse("85"), None);
        assert_eq!(SlowRange::parse("a-b"), None);
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let error = ProgressOptions::from_toml_str("duration = ").unwrap_err();
        assert!(error.is_config());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "duration = 900\nseed = 42\n").await.unwrap();

        let options = ProgressOptions::load(Some(&path)).await.unwrap();
        assert_eq!(options.duration, 900);
        assert_eq!(options.seed, Some(42));
    }

    #[tokio::test]
    async fn test_load_missing_explicit_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let error = ProgressOptions::load(Some(&path)).await.unwrap_err();
        assert!(matches!(error, LoadbarError::ConfigRead { .. }));
    }
}
