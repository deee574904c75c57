//! SUS label objects and their conversion into annotation candidates.
//!
//! A SUS label file holds every box of one lidar frame in the ego frame. The
//! conversion maps the object type onto the category table, optionally drops
//! boxes that are too small or too sparse, reorders the size to
//! `[width, length, height]` and places the box in the global frame with the
//! ego pose of the same timestamp.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::ValidationMode;
use crate::error::CoreError;
use crate::filename::FrameFilename;
use crate::geometry::{ego_to_global, Quaternion};
use crate::instance::AnnotationCandidate;
use crate::taxonomy::{
    category_for_obj_type, default_attributes, extended_attribute, resolve_attributes,
    resolve_category, resolve_visibility, DEFAULT_VISIBILITY,
};
use crate::types::{Quat, Timestamp, Vec3};

// ---------------------------------------------------------------------------
// SUS object model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xyz {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Position, scale and rotation of a box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Psr {
    pub position: Xyz,
    /// `x` = length, `y` = width, `z` = height.
    pub scale: Xyz,
    /// Euler angles in radians.
    pub rotation: Xyz,
}

/// One box in a SUS label file. Unknown keys are kept so a repaired file
/// loses nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SusObject {
    /// Track id, written as a string or a number by different tools.
    #[serde(default)]
    pub obj_id: serde_json::Value,
    pub obj_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_attr: Option<String>,
    pub psr: Psr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_lidar_pts: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SusObject {
    /// Track id as a string; `None` when absent or not a scalar.
    pub fn track_id(&self) -> Option<String> {
        match &self.obj_id {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Parse the contents of one label file.
pub fn parse_label_objects(json: &str, filename: &str) -> Result<Vec<SusObject>, CoreError> {
    serde_json::from_str(json).map_err(|e| CoreError::MalformedRecord {
        table: format!("label {filename}"),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Filter rules
// ---------------------------------------------------------------------------

/// Minimum box dimensions and lidar points for an object type to be kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterRule {
    /// `[length, width, height]`, compared against the SUS scale.
    pub min_size: Vec3,
    pub min_points: u32,
}

pub fn filter_rule(obj_type: &str) -> Option<FilterRule> {
    let (min_size, min_points) = match obj_type {
        "car" | "truck" => ([1.0, 1.0, 1.0], 20),
        "pedestrian" | "rider" => ([0.1, 0.1, 1.0], 20),
        "traffic_cone" => ([0.1, 0.1, 0.1], 5),
        _ => return None,
    };
    Some(FilterRule {
        min_size,
        min_points,
    })
}

/// Whether the filter rules drop this object.
pub fn is_filtered(obj_type: &str, scale: Xyz, num_lidar_pts: u32) -> bool {
    let Some(rule) = filter_rule(obj_type) else {
        return false;
    };
    let too_small = scale.x < rule.min_size[0]
        || scale.y < rule.min_size[1]
        || scale.z < rule.min_size[2];
    too_small || num_lidar_pts < rule.min_points
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct LabelOptions {
    pub filter_enabled: bool,
    pub validation_mode: ValidationMode,
}

/// Convert the boxes of one frame into candidates in the ego frame.
///
/// `object_id` is the index of the box in the file, so ids stay stable when
/// earlier boxes are skipped.
pub fn objects_to_candidates(
    frame: &FrameFilename,
    objects: &[SusObject],
    options: LabelOptions,
) -> Result<Vec<AnnotationCandidate>, CoreError> {
    let mut candidates = Vec::with_capacity(objects.len());

    for (object_id, object) in objects.iter().enumerate() {
        let track_id = object.track_id().ok_or_else(|| CoreError::MalformedRecord {
            table: format!("label {}", frame.encode()),
            reason: format!("object {object_id} has no obj_id"),
        })?;

        let Some(mapped) = category_for_obj_type(&object.obj_type) else {
            tracing::debug!(obj_type = %object.obj_type, object_id, "Unmapped object type, skipping");
            continue;
        };

        let num_lidar_pts = object.num_lidar_pts.unwrap_or(0);
        let obj_type = object.obj_type.to_ascii_lowercase();
        if options.filter_enabled && is_filtered(&obj_type, object.psr.scale, num_lidar_pts) {
            tracing::debug!(
                obj_type = %obj_type,
                object_id,
                num_lidar_pts,
                "Object below filter thresholds, skipping"
            );
            continue;
        }

        let Some(category) = resolve_category(mapped, options.validation_mode)? else {
            continue;
        };

        let attributes: Vec<String> = match object.obj_attr.as_deref().and_then(extended_attribute) {
            Some(attribute) => vec![attribute.to_string()],
            None => default_attributes(&category)
                .iter()
                .map(|a| a.to_string())
                .collect(),
        };
        let attributes = resolve_attributes(&attributes, options.validation_mode)?;
        let visibility = resolve_visibility(DEFAULT_VISIBILITY, options.validation_mode)?;

        let Psr {
            position,
            scale,
            rotation,
        } = object.psr;

        candidates.push(AnnotationCandidate {
            scene_name: frame.scene_name.clone(),
            timestamp: frame.timestamp,
            object_id,
            track_id,
            category,
            attributes,
            visibility,
            translation: [position.x, position.y, position.z],
            size: [scale.y, scale.x, scale.z],
            rotation: Quaternion::from_euler(rotation.x, rotation.y, rotation.z).to_wxyz(),
            num_lidar_pts,
        });
    }

    Ok(candidates)
}

/// Move candidates from the ego frame into the global frame.
///
/// `poses` maps a timestamp to the ego `(translation, rotation)`. A candidate
/// whose timestamp has no pose is an error.
pub fn place_in_global(
    candidates: Vec<AnnotationCandidate>,
    poses: &BTreeMap<Timestamp, (Vec3, Quat)>,
) -> Result<Vec<AnnotationCandidate>, CoreError> {
    candidates
        .into_iter()
        .map(|mut candidate| {
            let (ego_translation, ego_rotation) =
                poses.get(&candidate.timestamp).ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Scene '{}' has no ego pose at timestamp {}",
                        candidate.scene_name, candidate.timestamp
                    ))
                })?;
            let (translation, rotation) = ego_to_global(
                candidate.translation,
                candidate.rotation,
                *ego_translation,
                *ego_rotation,
            );
            candidate.translation = translation;
            candidate.rotation = rotation;
            Ok(candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn frame() -> FrameFilename {
        FrameFilename::new("0007_YC200-001", "lidar-fusion", 100, "json")
    }

    fn object(obj_id: serde_json::Value, obj_type: &str, pts: u32) -> SusObject {
        serde_json::from_value(json!({
            "obj_id": obj_id,
            "obj_type": obj_type,
            "psr": {
                "position": {"x": 1.0, "y": 2.0, "z": 0.5},
                "scale": {"x": 4.5, "y": 1.8, "z": 1.5},
                "rotation": {"x": 0.0, "y": 0.0, "z": 0.0}
            },
            "num_lidar_pts": pts
        }))
        .unwrap()
    }

    // -- parsing -----------------------------------------------------------

    #[test]
    fn parses_label_file_and_keeps_extra_keys() {
        let raw = r#"[{"obj_id":"1","obj_type":"Car","psr":{"position":{"x":0,"y":0,"z":0},"scale":{"x":1,"y":1,"z":1},"rotation":{"x":0,"y":0,"z":0}},"num_lidar_pts":3,"annotator":"a"}]"#;
        let objects = parse_label_objects(raw, "f.json").unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].extra["annotator"], "a");
        let back = serde_json::to_value(&objects[0]).unwrap();
        assert_eq!(back["annotator"], "a");
    }

    #[test]
    fn malformed_label_file_is_error() {
        assert_matches!(
            parse_label_objects("{not json", "f.json"),
            Err(CoreError::MalformedRecord { .. })
        );
    }

    #[test]
    fn numeric_and_string_track_ids() {
        assert_eq!(object(json!(7), "car", 1).track_id().as_deref(), Some("7"));
        assert_eq!(object(json!("7"), "car", 1).track_id().as_deref(), Some("7"));
        assert_eq!(object(json!(null), "car", 1).track_id(), None);
    }

    // -- filter ------------------------------------------------------------

    #[test]
    fn filter_rules_by_type() {
        let big = Xyz { x: 4.0, y: 2.0, z: 1.5 };
        assert!(!is_filtered("car", big, 50));
        assert!(is_filtered("car", big, 10));
        assert!(is_filtered("car", Xyz { x: 0.5, y: 2.0, z: 1.5 }, 50));
        assert!(!is_filtered("traffic_cone", Xyz { x: 0.3, y: 0.3, z: 0.5 }, 5));
        assert!(!is_filtered("bus", Xyz { x: 0.1, y: 0.1, z: 0.1 }, 0));
    }

    // -- objects_to_candidates ---------------------------------------------

    #[test]
    fn converts_mapped_objects() {
        let objects = vec![
            object(json!("obj-1"), "Car", 120),
            object(json!(2), "trash_can", 120),
            object(json!(3), "pedestrian", 40),
        ];
        let candidates =
            objects_to_candidates(&frame(), &objects, LabelOptions::default()).unwrap();
        assert_eq!(candidates.len(), 2);

        let car = &candidates[0];
        assert_eq!(car.object_id, 0);
        assert_eq!(car.track_id, "obj-1");
        assert_eq!(car.category, "vehicle.car");
        assert_eq!(car.attributes, vec!["vehicle.moving"]);
        assert_eq!(car.visibility, "v80-100");
        assert_eq!(car.size, [1.8, 4.5, 1.5]);
        assert_eq!(car.rotation, [1.0, 0.0, 0.0, 0.0]);

        // index within the file survives skipped objects
        assert_eq!(candidates[1].object_id, 2);
        assert_eq!(candidates[1].attributes, vec!["pedestrian.standing"]);
    }

    #[test]
    fn short_attribute_overrides_default() {
        let mut parked = object(json!(1), "car", 100);
        parked.obj_attr = Some("parked".to_string());
        let candidates =
            objects_to_candidates(&frame(), &[parked], LabelOptions::default()).unwrap();
        assert_eq!(candidates[0].attributes, vec!["vehicle.parked"]);
    }

    #[test]
    fn filter_only_applies_when_enabled() {
        let sparse = vec![object(json!(1), "car", 3)];
        let kept = objects_to_candidates(&frame(), &sparse, LabelOptions::default()).unwrap();
        assert_eq!(kept.len(), 1);
        let options = LabelOptions {
            filter_enabled: true,
            ..LabelOptions::default()
        };
        let dropped = objects_to_candidates(&frame(), &sparse, options).unwrap();
        assert!(dropped.is_empty());
    }

    #[test]
    fn object_without_track_id_is_error() {
        assert_matches!(
            objects_to_candidates(&frame(), &[object(json!(null), "car", 1)], LabelOptions::default()),
            Err(CoreError::MalformedRecord { .. })
        );
    }

    // -- place_in_global ---------------------------------------------------

    #[test]
    fn global_placement_uses_pose_at_timestamp() {
        let candidates = objects_to_candidates(
            &frame(),
            &[object(json!(1), "car", 100)],
            LabelOptions::default(),
        )
        .unwrap();
        let poses = BTreeMap::from([(100, ([10.0, 0.0, 0.0], [1.0, 0.0, 0.0, 0.0]))]);
        let placed = place_in_global(candidates, &poses).unwrap();
        assert_eq!(placed[0].translation, [11.0, 2.0, 0.5]);
    }

    #[test]
    fn missing_pose_is_error() {
        let candidates = objects_to_candidates(
            &frame(),
            &[object(json!(1), "car", 100)],
            LabelOptions::default(),
        )
        .unwrap();
        assert_matches!(
            place_in_global(candidates, &BTreeMap::new()),
            Err(CoreError::Validation(_))
        );
    }
}
