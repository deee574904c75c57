//! Label repair as a pure transform.
//!
//! Takes the boxes of one label file and returns a repaired copy plus a
//! report of what changed. Nothing is written here; the caller decides
//! whether to persist the result.

use serde::Serialize;

use crate::label::SusObject;

/// Smallest box dimension kept in a repaired label, in metres.
pub const MIN_SCALE: f64 = 0.05;

#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Drop boxes with zero lidar points.
    pub drop_empty_boxes: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// Indices (in the input) of boxes whose scale was raised to [`MIN_SCALE`].
    pub scale_clamped: Vec<usize>,
    /// Indices of boxes removed for having no lidar points.
    pub removed_empty: Vec<usize>,
    /// Indices of boxes without a `num_lidar_pts` value.
    pub missing_point_count: Vec<usize>,
}

impl RepairReport {
    /// Whether the repaired objects differ from the input.
    pub fn is_modified(&self) -> bool {
        !self.scale_clamped.is_empty() || !self.removed_empty.is_empty()
    }
}

/// Repair the boxes of one label file.
pub fn repair_labels(objects: &[SusObject], options: RepairOptions) -> (Vec<SusObject>, RepairReport) {
    let mut report = RepairReport::default();
    let mut repaired = Vec::with_capacity(objects.len());

    for (index, object) in objects.iter().enumerate() {
        match object.num_lidar_pts {
            None => report.missing_point_count.push(index),
            Some(0) if options.drop_empty_boxes => {
                report.removed_empty.push(index);
                continue;
            }
            Some(_) => {}
        }

        let mut object = object.clone();
        let scale = &mut object.psr.scale;
        let mut clamped = false;
        for dim in [&mut scale.x, &mut scale.y, &mut scale.z] {
            if *dim < MIN_SCALE {
                *dim = MIN_SCALE;
                clamped = true;
            }
        }
        if clamped {
            report.scale_clamped.push(index);
        }
        repaired.push(object);
    }

    (repaired, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(scale: [f64; 3], pts: Option<u32>) -> SusObject {
        let mut value = json!({
            "obj_id": "1",
            "obj_type": "car",
            "psr": {
                "position": {"x": 0.0, "y": 0.0, "z": 0.0},
                "scale": {"x": scale[0], "y": scale[1], "z": scale[2]},
                "rotation": {"x": 0.0, "y": 0.0, "z": 0.0}
            }
        });
        if let Some(pts) = pts {
            value["num_lidar_pts"] = json!(pts);
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn clean_labels_are_untouched() {
        let input = vec![object([4.0, 2.0, 1.5], Some(10))];
        let (repaired, report) = repair_labels(&input, RepairOptions::default());
        assert_eq!(repaired, input);
        assert!(!report.is_modified());
    }

    #[test]
    fn small_scale_is_clamped() {
        let input = vec![object([0.01, 2.0, 0.0], Some(10))];
        let (repaired, report) = repair_labels(&input, RepairOptions::default());
        let scale = repaired[0].psr.scale;
        assert_eq!((scale.x, scale.y, scale.z), (MIN_SCALE, 2.0, MIN_SCALE));
        assert_eq!(report.scale_clamped, vec![0]);
        assert!(report.is_modified());
    }

    #[test]
    fn empty_boxes_dropped_only_when_asked() {
        let input = vec![object([1.0; 3], Some(0)), object([1.0; 3], Some(5))];

        let (kept, report) = repair_labels(&input, RepairOptions::default());
        assert_eq!(kept.len(), 2);
        assert!(report.removed_empty.is_empty());

        let (repaired, report) = repair_labels(
            &input,
            RepairOptions {
                drop_empty_boxes: true,
            },
        );
        assert_eq!(repaired.len(), 1);
        assert_eq!(report.removed_empty, vec![0]);
    }

    #[test]
    fn missing_point_count_is_reported() {
        let input = vec![object([1.0; 3], None)];
        let (repaired, report) = repair_labels(
            &input,
            RepairOptions {
                drop_empty_boxes: true,
            },
        );
        assert_eq!(repaired.len(), 1);
        assert_eq!(report.missing_point_count, vec![0]);
        assert!(!report.is_modified());
    }
}
