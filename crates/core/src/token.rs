//! Deterministic token rules.
//!
//! Every entity token is the UUIDv5 digest (URL namespace) of a namespace key
//! built from literal tags and natural-key fields. The key formats below are
//! a wire contract: any tool that builds the same key gets the same token, so
//! independently produced scenes and imported labels link up without
//! coordination.
//!
//! | Entity              | Namespace key                                   |
//! |---------------------|-------------------------------------------------|
//! | scene               | `{scene}-scene`                                 |
//! | sample              | `{scene}-sample-{ts}`                           |
//! | sample_data         | `{scene}-sample_data-{ts}-{channel}`            |
//! | ego_pose            | `{scene}-ego_pose-{ts}`                         |
//! | calibrated_sensor   | `{scene}-calibrated_sensor-{channel}`           |
//! | log                 | `{scene}-log`                                   |
//! | instance            | `{scene}-instance-{track_id}`                   |
//! | sample_annotation   | `{scene}-sample_annotation-{ts}-{object_id}`    |
//! | sensor              | `{channel}`                                     |
//! | map                 | `{map_name}`                                    |
//! | category, attribute | `{name}`                                        |
//!
//! Visibility is the exception: its tokens are the fixed integers 1 to 4.

use std::fmt;

use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{Timestamp, Token};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Marker for an absent link (`prev`/`next` at a chain boundary, missing
/// optional key component).
pub const EMPTY_TOKEN: &str = "";

/// Visibility bucket used when the level is not recognised.
pub const DEFAULT_VISIBILITY_TOKEN: u8 = 4;

/// Length of a token in its compact hex form.
const TOKEN_HEX_LEN: usize = 32;

// ---------------------------------------------------------------------------
// Identifier rule engine
// ---------------------------------------------------------------------------

/// Digest an arbitrary namespace key into a token.
pub fn identify(namespace_key: &str) -> Token {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, namespace_key.as_bytes())
        .simple()
        .to_string()
}

/// Natural key of one entity, tagged with its kind.
///
/// Optional components model inputs that may be missing upstream (an object
/// without a track id, an annotation without a frame). A key with a missing
/// component has no namespace key and its token is [`EMPTY_TOKEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKey<'a> {
    Scene {
        scene: &'a str,
    },
    Sample {
        scene: &'a str,
        timestamp: Timestamp,
    },
    SampleData {
        scene: &'a str,
        timestamp: Timestamp,
        channel: &'a str,
    },
    EgoPose {
        scene: &'a str,
        timestamp: Timestamp,
    },
    CalibratedSensor {
        scene: &'a str,
        channel: &'a str,
    },
    Sensor {
        channel: &'a str,
    },
    Log {
        scene: &'a str,
    },
    Map {
        map_name: &'a str,
    },
    Instance {
        scene: &'a str,
        track_id: Option<&'a str>,
    },
    SampleAnnotation {
        scene: &'a str,
        timestamp: Option<Timestamp>,
        object_id: Option<usize>,
    },
    Category {
        name: &'a str,
    },
    Attribute {
        name: Option<&'a str>,
    },
}

impl EntityKey<'_> {
    /// The string digested into the token, or `None` when a required
    /// component is missing.
    pub fn namespace_key(&self) -> Option<String> {
        match *self {
            Self::Scene { scene } => Some(format!("{scene}-scene")),
            Self::Sample { scene, timestamp } => Some(format!("{scene}-sample-{timestamp}")),
            Self::SampleData {
                scene,
                timestamp,
                channel,
            } => Some(format!("{scene}-sample_data-{timestamp}-{channel}")),
            Self::EgoPose { scene, timestamp } => Some(format!("{scene}-ego_pose-{timestamp}")),
            Self::CalibratedSensor { scene, channel } => {
                Some(format!("{scene}-calibrated_sensor-{channel}"))
            }
            Self::Sensor { channel } => Some(channel.to_string()),
            Self::Log { scene } => Some(format!("{scene}-log")),
            Self::Map { map_name } => Some(map_name.to_string()),
            Self::Instance { scene, track_id } => {
                track_id.map(|track_id| format!("{scene}-instance-{track_id}"))
            }
            Self::SampleAnnotation {
                scene,
                timestamp,
                object_id,
            } => match (timestamp, object_id) {
                (Some(ts), Some(id)) => Some(format!("{scene}-sample_annotation-{ts}-{id}")),
                _ => None,
            },
            Self::Category { name } => Some(name.to_string()),
            Self::Attribute { name } => name.map(str::to_string),
        }
    }

    /// Token of this entity; [`EMPTY_TOKEN`] when a component is missing.
    pub fn token(&self) -> Token {
        self.namespace_key()
            .map(|key| identify(&key))
            .unwrap_or_default()
    }
}

impl fmt::Display for EntityKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace_key() {
            Some(key) => f.write_str(&key),
            None => f.write_str("<none>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-entity helpers
// ---------------------------------------------------------------------------

pub fn scene_token(scene: &str) -> Token {
    EntityKey::Scene { scene }.token()
}

pub fn sample_token(scene: &str, timestamp: Timestamp) -> Token {
    EntityKey::Sample { scene, timestamp }.token()
}

pub fn sample_data_token(scene: &str, timestamp: Timestamp, channel: &str) -> Token {
    EntityKey::SampleData {
        scene,
        timestamp,
        channel,
    }
    .token()
}

pub fn ego_pose_token(scene: &str, timestamp: Timestamp) -> Token {
    EntityKey::EgoPose { scene, timestamp }.token()
}

pub fn calibrated_sensor_token(scene: &str, channel: &str) -> Token {
    EntityKey::CalibratedSensor { scene, channel }.token()
}

/// Sensor tokens depend only on the channel, so every scene shares them.
pub fn sensor_token(channel: &str) -> Token {
    EntityKey::Sensor { channel }.token()
}

pub fn log_token(scene: &str) -> Token {
    EntityKey::Log { scene }.token()
}

pub fn map_token(map_name: &str) -> Token {
    EntityKey::Map { map_name }.token()
}

pub fn instance_token(scene: &str, track_id: Option<&str>) -> Token {
    EntityKey::Instance { scene, track_id }.token()
}

pub fn sample_annotation_token(
    scene: &str,
    timestamp: Option<Timestamp>,
    object_id: Option<usize>,
) -> Token {
    EntityKey::SampleAnnotation {
        scene,
        timestamp,
        object_id,
    }
    .token()
}

pub fn category_token(name: &str) -> Token {
    EntityKey::Category { name }.token()
}

pub fn attribute_token(name: Option<&str>) -> Token {
    EntityKey::Attribute { name }.token()
}

/// Link to the sample at `timestamp`, or [`EMPTY_TOKEN`] at a chain boundary.
pub fn sample_link(scene: &str, timestamp: Option<Timestamp>) -> Token {
    timestamp
        .map(|ts| sample_token(scene, ts))
        .unwrap_or_default()
}

/// Map a visibility level (`v0-40` .. `v80-100`) to its integer token.
pub fn visibility_token(level: &str) -> u8 {
    match level {
        "v0-40" => 1,
        "v40-60" => 2,
        "v60-80" => 3,
        "v80-100" => 4,
        _ => DEFAULT_VISIBILITY_TOKEN,
    }
}

// ---------------------------------------------------------------------------
// Token forms
// ---------------------------------------------------------------------------

/// Render a token as an uppercase dashed UUID (`8-4-4-4-12`), the form
/// annotation tools expect for object ids.
pub fn to_five_segment(token: &str) -> Result<String, CoreError> {
    let uuid = Uuid::try_parse(token)
        .map_err(|e| CoreError::Validation(format!("Invalid token '{token}': {e}")))?;
    Ok(uuid.hyphenated().to_string().to_uppercase())
}

/// Whether `candidate` is a token in either compact or dashed form.
pub fn is_valid_token(candidate: &str) -> bool {
    let compact: String = candidate.chars().filter(|c| *c != '-').collect();
    if compact.len() != TOKEN_HEX_LEN || !compact.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    if compact.len() != candidate.len() {
        return Uuid::try_parse(candidate).is_ok();
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- identify ----------------------------------------------------------

    #[test]
    fn identify_is_deterministic() {
        assert_eq!(identify("0007_YC200-001-scene"), identify("0007_YC200-001-scene"));
    }

    #[test]
    fn identify_produces_compact_lowercase_hex() {
        let token = identify("lidar-fusion");
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn identify_matches_uuid_v5_url_namespace() {
        let expected = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"python.org").simple().to_string();
        assert_eq!(identify("python.org"), expected);
    }

    #[test]
    fn distinct_keys_give_distinct_tokens() {
        assert_ne!(sample_token("s", 100), sample_token("s", 200));
        assert_ne!(sample_token("a", 100), sample_token("b", 100));
        assert_ne!(sample_token("s", 100), ego_pose_token("s", 100));
    }

    // -- EntityKey ---------------------------------------------------------

    #[test]
    fn namespace_keys_follow_tag_convention() {
        let scene = "0007_YC200-001";
        assert_eq!(
            EntityKey::Scene { scene }.namespace_key().as_deref(),
            Some("0007_YC200-001-scene")
        );
        assert_eq!(
            EntityKey::SampleData {
                scene,
                timestamp: 100,
                channel: "cam-front"
            }
            .namespace_key()
            .as_deref(),
            Some("0007_YC200-001-sample_data-100-cam-front")
        );
        assert_eq!(
            EntityKey::SampleAnnotation {
                scene,
                timestamp: Some(100),
                object_id: Some(3)
            }
            .namespace_key()
            .as_deref(),
            Some("0007_YC200-001-sample_annotation-100-3")
        );
        assert_eq!(
            EntityKey::CalibratedSensor {
                scene,
                channel: "lidar-top"
            }
            .namespace_key()
            .as_deref(),
            Some("0007_YC200-001-calibrated_sensor-lidar-top")
        );
    }

    #[test]
    fn helpers_digest_namespace_keys() {
        assert_eq!(scene_token("x"), identify("x-scene"));
        assert_eq!(log_token("x"), identify("x-log"));
        assert_eq!(sensor_token("cam-front"), identify("cam-front"));
        assert_eq!(map_token("suzhou"), identify("suzhou"));
        assert_eq!(category_token("vehicle.car"), identify("vehicle.car"));
        assert_eq!(instance_token("x", Some("7")), identify("x-instance-7"));
    }

    #[test]
    fn missing_components_yield_empty_token() {
        assert_eq!(instance_token("x", None), EMPTY_TOKEN);
        assert_eq!(sample_annotation_token("x", None, Some(1)), EMPTY_TOKEN);
        assert_eq!(sample_annotation_token("x", Some(1), None), EMPTY_TOKEN);
        assert_eq!(attribute_token(None), EMPTY_TOKEN);
        assert_eq!(sample_link("x", None), EMPTY_TOKEN);
    }

    #[test]
    fn sensor_token_is_shared_across_scenes() {
        assert_eq!(
            EntityKey::Sensor { channel: "cam-front" }.token(),
            sensor_token("cam-front")
        );
    }

    // -- visibility_token --------------------------------------------------

    #[test]
    fn visibility_buckets() {
        assert_eq!(visibility_token("v0-40"), 1);
        assert_eq!(visibility_token("v40-60"), 2);
        assert_eq!(visibility_token("v60-80"), 3);
        assert_eq!(visibility_token("v80-100"), 4);
    }

    #[test]
    fn unknown_visibility_defaults_to_four() {
        assert_eq!(visibility_token("v100"), 4);
        assert_eq!(visibility_token(""), 4);
    }

    // -- five-segment form -------------------------------------------------

    #[test]
    fn five_segment_is_uppercase_dashed() {
        let token = identify("0007_YC200-001-instance-1");
        let dashed = to_five_segment(&token).unwrap();
        assert_eq!(dashed.len(), 36);
        let segments: Vec<usize> = dashed.split('-').map(str::len).collect();
        assert_eq!(segments, vec![8, 4, 4, 4, 12]);
        assert_eq!(dashed.replace('-', "").to_lowercase(), token);
        assert_eq!(dashed, dashed.to_uppercase());
    }

    #[test]
    fn five_segment_rejects_garbage() {
        assert!(to_five_segment("not-a-token").is_err());
    }

    #[test]
    fn token_validity() {
        let token = identify("abc");
        assert!(is_valid_token(&token));
        assert!(is_valid_token(&to_five_segment(&token).unwrap()));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("xyz"));
        assert!(!is_valid_token(&format!("{token}0")));
    }
}
