//! Frame filename codec.
//!
//! Every raw frame on disk is named `{scene_id}_{car_id}_{channel}_{timestamp}.{ext}`
//! and this is the only place a frame's natural key is recorded, so decoding
//! must be exact and fail loudly on anything else.
//!
//! - `scene_id` = digit groups joined by `-` (`0007`, `20231024-01`)
//! - `car_id` = vehicle identifier without underscores (`YC200-001`)
//! - `channel` = sensor stream name, may itself contain underscores
//! - `timestamp` = microseconds, digits only

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Matches a scene id: one or more digit groups separated by `-`.
static SCENE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(-\d+)*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Scene name
// ---------------------------------------------------------------------------

/// A scene name, `{scene_id}_{car_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneName {
    pub scene_id: String,
    pub car_id: String,
}

impl SceneName {
    pub fn parse(name: &str) -> Result<Self, CoreError> {
        let malformed = |reason: &str| CoreError::MalformedSceneName {
            name: name.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = name.split('_').collect();
        if parts.len() != 2 {
            return Err(malformed(
                "expected exactly two '_' separated components {scene_id}_{car_id}",
            ));
        }
        if !SCENE_ID_RE.is_match(parts[0]) {
            return Err(malformed("scene id must be digit groups separated by '-'"));
        }
        if parts[1].is_empty() {
            return Err(malformed("car id must not be empty"));
        }

        Ok(Self {
            scene_id: parts[0].to_string(),
            car_id: parts[1].to_string(),
        })
    }
}

impl fmt::Display for SceneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.scene_id, self.car_id)
    }
}

impl FromStr for SceneName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ---------------------------------------------------------------------------
// Frame filename
// ---------------------------------------------------------------------------

/// Natural key of one frame file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameFilename {
    pub scene_name: String,
    pub channel: String,
    pub timestamp: Timestamp,
    pub extension: String,
}

impl FrameFilename {
    pub fn new(
        scene_name: impl Into<String>,
        channel: impl Into<String>,
        timestamp: Timestamp,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            scene_name: scene_name.into(),
            channel: channel.into(),
            timestamp,
            extension: extension.into(),
        }
    }

    /// Render as `{scene_name}_{channel}_{timestamp}.{extension}`.
    pub fn encode(&self) -> String {
        encode(
            &self.scene_name,
            &self.channel,
            self.timestamp,
            &self.extension,
        )
    }

    /// Filename without the extension.
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.scene_name, self.channel, self.timestamp)
    }

    /// Same frame under another channel.
    pub fn with_channel(&self, channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            ..self.clone()
        }
    }

    /// Same frame with another extension.
    pub fn with_extension(&self, extension: &str) -> Self {
        Self {
            extension: extension.to_string(),
            ..self.clone()
        }
    }
}

impl FromStr for FrameFilename {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Build a frame filename.
///
/// # Examples
///
/// ```
/// use roscenes_core::filename::encode;
///
/// assert_eq!(
///     encode("0007_YC200-001", "cam-front", 1698000000000000, "jpg"),
///     "0007_YC200-001_cam-front_1698000000000000.jpg"
/// );
/// ```
pub fn encode(scene_name: &str, channel: &str, timestamp: Timestamp, extension: &str) -> String {
    format!("{scene_name}_{channel}_{timestamp}.{extension}")
}

/// Recover the natural key from a frame filename.
///
/// Splits the extension off the right, then splits the rest on `_`. The first
/// two components form the scene name, the last is the timestamp and anything
/// in between is the channel.
pub fn decode(filename: &str) -> Result<FrameFilename, CoreError> {
    let malformed = |reason: String| CoreError::MalformedFilename {
        filename: filename.to_string(),
        reason,
    };

    let (stem, extension) = filename
        .rsplit_once('.')
        .ok_or_else(|| malformed("missing extension".to_string()))?;
    if extension.is_empty() {
        return Err(malformed("empty extension".to_string()));
    }

    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 4 {
        return Err(malformed(format!(
            "expected at least 4 '_' separated components, found {}",
            parts.len()
        )));
    }

    let scene_id = parts[0];
    let car_id = parts[1];
    let timestamp_part = parts[parts.len() - 1];
    let channel = parts[2..parts.len() - 1].join("_");

    if !SCENE_ID_RE.is_match(scene_id) {
        return Err(malformed(format!(
            "scene id '{scene_id}' must be digit groups separated by '-'"
        )));
    }
    if car_id.is_empty() {
        return Err(malformed("car id must not be empty".to_string()));
    }
    if channel.is_empty() {
        return Err(malformed("channel must not be empty".to_string()));
    }
    if timestamp_part.is_empty() || !timestamp_part.chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed(format!(
            "timestamp '{timestamp_part}' must be digits only"
        )));
    }
    let timestamp = timestamp_part
        .parse::<Timestamp>()
        .map_err(|e| malformed(format!("timestamp '{timestamp_part}' out of range: {e}")))?;

    Ok(FrameFilename {
        scene_name: format!("{scene_id}_{car_id}"),
        channel,
        timestamp,
        extension: extension.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // -- SceneName ---------------------------------------------------------

    #[test]
    fn scene_name_parses_components() {
        let name = SceneName::parse("0007_YC200-001").unwrap();
        assert_eq!(name.scene_id, "0007");
        assert_eq!(name.car_id, "YC200-001");
        assert_eq!(name.to_string(), "0007_YC200-001");
    }

    #[test]
    fn scene_name_accepts_dashed_scene_id() {
        let name: SceneName = "20231024-01_yc800".parse().unwrap();
        assert_eq!(name.scene_id, "20231024-01");
    }

    #[test]
    fn scene_name_rejects_wrong_component_count() {
        assert_matches!(
            SceneName::parse("0007"),
            Err(CoreError::MalformedSceneName { .. })
        );
        assert_matches!(
            SceneName::parse("0007_a_b"),
            Err(CoreError::MalformedSceneName { .. })
        );
    }

    #[test]
    fn scene_name_rejects_non_numeric_id() {
        assert_matches!(
            SceneName::parse("scene7_YC200"),
            Err(CoreError::MalformedSceneName { .. })
        );
        assert_matches!(
            SceneName::parse("7-_YC200"),
            Err(CoreError::MalformedSceneName { .. })
        );
    }

    // -- decode ------------------------------------------------------------

    #[test]
    fn decode_simple_filename() {
        let frame = decode("0007_YC200-001_lidar-fusion_1698000000000000.pcd").unwrap();
        assert_eq!(frame.scene_name, "0007_YC200-001");
        assert_eq!(frame.channel, "lidar-fusion");
        assert_eq!(frame.timestamp, 1_698_000_000_000_000);
        assert_eq!(frame.extension, "pcd");
    }

    #[test]
    fn decode_channel_with_underscores() {
        let frame = decode("0007_YC200_cam_front_wide_100.jpg").unwrap();
        assert_eq!(frame.channel, "cam_front_wide");
        assert_eq!(frame.timestamp, 100);
    }

    #[test]
    fn decode_splits_extension_once_from_right() {
        // "100.pcd" is left as the timestamp component and rejected.
        assert_matches!(
            decode("0007_YC200_lidar-top_100.pcd.bin"),
            Err(CoreError::MalformedFilename { .. })
        );
        assert_matches!(
            decode("0007_YC200_lidar-top_100.pcd"),
            Ok(FrameFilename { ref extension, .. }) if extension == "pcd"
        );
    }

    #[test]
    fn decode_rejects_missing_extension() {
        assert_matches!(
            decode("0007_YC200_lidar-top_100"),
            Err(CoreError::MalformedFilename { .. })
        );
    }

    #[test]
    fn decode_rejects_too_few_components() {
        let err = decode("0007_lidar-top_100.pcd").unwrap_err();
        assert!(err.to_string().contains("0007_lidar-top_100.pcd"));
    }

    #[test]
    fn decode_rejects_bad_scene_id() {
        assert_matches!(
            decode("abc_YC200_lidar-top_100.pcd"),
            Err(CoreError::MalformedFilename { .. })
        );
    }

    #[test]
    fn decode_rejects_non_numeric_timestamp() {
        assert_matches!(
            decode("0007_YC200_lidar-top_10a0.pcd"),
            Err(CoreError::MalformedFilename { .. })
        );
        assert_matches!(
            decode("0007_YC200_lidar-top_-100.pcd"),
            Err(CoreError::MalformedFilename { .. })
        );
    }

    // -- encode ------------------------------------------------------------

    #[test]
    fn encode_then_decode_recovers_key() {
        let cases = [
            ("0007_YC200-001", "cam-front-fisheye", 1_698_000_000_123_456, "jpg"),
            ("1-2-3_car", "lidar_top", 0, "pcd"),
        ];
        for (scene, channel, ts, ext) in cases {
            let decoded = decode(&encode(scene, channel, ts, ext)).unwrap();
            assert_eq!(decoded, FrameFilename::new(scene, channel, ts, ext));
        }
    }

    #[test]
    fn with_channel_swaps_only_channel() {
        let frame = FrameFilename::new("0007_YC200", "cam-front", 100, "jpg");
        assert_eq!(
            frame.with_channel("lidar-fusion").encode(),
            "0007_YC200_lidar-fusion_100.jpg"
        );
        assert_eq!(frame.with_extension("json").stem(), "0007_YC200_cam-front_100");
    }
}
