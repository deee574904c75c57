//! Dataset conversion settings.
//!
//! One immutable [`DatasetConfig`] value is built at startup and passed into
//! every entry point that needs it.

use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const DEFAULT_MAIN_CHANNEL: &str = "lidar-fusion";
pub const DEFAULT_MAP_NAME: &str = "suzhou";
pub const DEFAULT_MAP_CATEGORY: &str = "default";
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TEST_RATIO: f64 = 0.2;

/// Maximum distance between a frame and the ego pose used for it.
pub const DEFAULT_POSE_TOLERANCE_US: i64 = 50_000;

pub const DEFAULT_CAMERA_CHANNELS: [&str; 4] = [
    "cam-front-fisheye",
    "cam-left-fisheye",
    "cam-right-fisheye",
    "cam-back-fisheye",
];

// ---------------------------------------------------------------------------
// Validation mode
// ---------------------------------------------------------------------------

/// How unknown category, attribute and visibility values are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Any unknown value fails the scene.
    #[default]
    Strict,
    /// Unknown values are logged and replaced with a safe default.
    Lenient,
}

impl ValidationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(CoreError::Validation(format!(
                "Unknown validation mode '{other}', expected 'strict' or 'lenient'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetConfig {
    /// Channel whose key frames define the scene's samples.
    pub main_channel: String,
    /// Channels exported as SUS camera views.
    pub camera_channels: Vec<String>,
    /// Map used when a scene does not name one.
    pub default_map_name: String,
    pub map_category: String,
    pub validation_mode: ValidationMode,
    /// Apply the per-type size and point-count filter during label import.
    pub filter_enabled: bool,
    /// Maximum number of scenes processed concurrently.
    pub workers: usize,
    /// Share of scenes routed to the test split when no lists are given.
    pub test_ratio: f64,
    pub pose_tolerance_us: i64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            main_channel: DEFAULT_MAIN_CHANNEL.to_string(),
            camera_channels: DEFAULT_CAMERA_CHANNELS.iter().map(|c| c.to_string()).collect(),
            default_map_name: DEFAULT_MAP_NAME.to_string(),
            map_category: DEFAULT_MAP_CATEGORY.to_string(),
            validation_mode: ValidationMode::default(),
            filter_enabled: false,
            workers: DEFAULT_WORKERS,
            test_ratio: DEFAULT_TEST_RATIO,
            pose_tolerance_us: DEFAULT_POSE_TOLERANCE_US,
        }
    }
}

impl DatasetConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                |
    /// |--------------------------------|------------------------|
    /// | `ROSCENES_MAIN_CHANNEL`        | `lidar-fusion`         |
    /// | `ROSCENES_CAMERA_CHANNELS`     | four fisheye cameras   |
    /// | `ROSCENES_MAP_NAME`            | `suzhou`               |
    /// | `ROSCENES_MAP_CATEGORY`        | `default`              |
    /// | `ROSCENES_VALIDATION_MODE`     | `strict`               |
    /// | `ROSCENES_FILTER_ENABLED`      | `false`                |
    /// | `ROSCENES_WORKERS`             | `4`                    |
    /// | `ROSCENES_TEST_RATIO`          | `0.2`                  |
    /// | `ROSCENES_POSE_TOLERANCE_US`   | `50000`                |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            main_channel: lookup("ROSCENES_MAIN_CHANNEL").unwrap_or(defaults.main_channel),
            camera_channels: lookup("ROSCENES_CAMERA_CHANNELS")
                .map(|v| split_list(&v))
                .unwrap_or(defaults.camera_channels),
            default_map_name: lookup("ROSCENES_MAP_NAME").unwrap_or(defaults.default_map_name),
            map_category: lookup("ROSCENES_MAP_CATEGORY").unwrap_or(defaults.map_category),
            validation_mode: parse_var(&lookup, "ROSCENES_VALIDATION_MODE", defaults.validation_mode)?,
            filter_enabled: parse_var(&lookup, "ROSCENES_FILTER_ENABLED", defaults.filter_enabled)?,
            workers: parse_var(&lookup, "ROSCENES_WORKERS", defaults.workers)?,
            test_ratio: parse_var(&lookup, "ROSCENES_TEST_RATIO", defaults.test_ratio)?,
            pose_tolerance_us: parse_var(
                &lookup,
                "ROSCENES_POSE_TOLERANCE_US",
                defaults.pose_tolerance_us,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.main_channel.is_empty() {
            return Err(CoreError::Validation(
                "Main channel must not be empty".to_string(),
            ));
        }
        if self.workers == 0 {
            return Err(CoreError::Validation(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.test_ratio) {
            return Err(CoreError::Validation(format!(
                "Test ratio must be within 0..=1, got {}",
                self.test_ratio
            )));
        }
        if self.pose_tolerance_us < 0 {
            return Err(CoreError::Validation(
                "Pose tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_camera_channel(&self, channel: &str) -> bool {
        self.camera_channels.iter().any(|c| c == channel)
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::Validation(format!("{key}='{raw}' is invalid: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use assert_matches::assert_matches;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = DatasetConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, DatasetConfig::default());
        assert_eq!(config.main_channel, "lidar-fusion");
        assert_eq!(config.camera_channels.len(), 4);
        assert_eq!(config.validation_mode, ValidationMode::Strict);
    }

    #[test]
    fn overrides_from_variables() {
        let config = DatasetConfig::from_lookup(lookup_from(&[
            ("ROSCENES_MAIN_CHANNEL", "lidar-top"),
            ("ROSCENES_CAMERA_CHANNELS", "cam-a, cam-b,"),
            ("ROSCENES_VALIDATION_MODE", "Lenient"),
            ("ROSCENES_FILTER_ENABLED", "true"),
            ("ROSCENES_WORKERS", "8"),
        ]))
        .unwrap();
        assert_eq!(config.main_channel, "lidar-top");
        assert_eq!(config.camera_channels, vec!["cam-a", "cam-b"]);
        assert_eq!(config.validation_mode, ValidationMode::Lenient);
        assert!(config.filter_enabled);
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn camera_channels_decide_camera_export() {
        let config = DatasetConfig::from_lookup(lookup_from(&[(
            "ROSCENES_CAMERA_CHANNELS",
            "cam-a",
        )]))
        .unwrap();
        assert!(config.is_camera_channel("cam-a"));
        assert!(!config.is_camera_channel("cam-front-fisheye"));
        assert!(!config.is_camera_channel("lidar-top"));
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        let err = DatasetConfig::from_lookup(lookup_from(&[("ROSCENES_WORKERS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("ROSCENES_WORKERS"));
    }

    #[test]
    fn zero_workers_rejected() {
        assert_matches!(
            DatasetConfig::from_lookup(lookup_from(&[("ROSCENES_WORKERS", "0")])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn test_ratio_out_of_range_rejected() {
        assert_matches!(
            DatasetConfig::from_lookup(lookup_from(&[("ROSCENES_TEST_RATIO", "1.5")])),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn validation_mode_round_trips_through_str() {
        for mode in [ValidationMode::Strict, ValidationMode::Lenient] {
            assert_eq!(mode.as_str().parse::<ValidationMode>().unwrap(), mode);
        }
        assert!("loose".parse::<ValidationMode>().is_err());
    }
}
