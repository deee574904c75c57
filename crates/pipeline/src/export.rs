//! nuScenes to SUS export.
//!
//! Lays out one scene for the SUS annotation tool:
//!
//! - `sus/lidar/` key frames of the main channel
//! - `sus/camera/{channel}/` camera key frames renamed onto the main channel
//! - `sus/label/` empty, filled by annotators
//! - `sus/calib/camera/{channel}.json` extrinsic and intrinsic per camera
//! - `sus/ego_pose/{frame}.json` pose of every lidar frame
//!
//! Existing files in the target are never overwritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use serde_json::json;

use roscenes_core::config::DatasetConfig;
use roscenes_core::error::CoreError;
use roscenes_core::geometry::Quaternion;
use roscenes_core::records::{
    CalibratedSensorRecord, EgoPoseRecord, CALIBRATED_SENSOR_TABLE, EGO_POSE_TABLE,
};
use roscenes_core::types::{Quat, Vec3};

use crate::error::{PipelineError, Result};
use crate::layout::{SceneDir, SUS_CAMERA, SUS_EGO_POSE, SUS_LABEL, SUS_LIDAR};
use crate::scan::{list_frame_files, FrameFile};
use crate::tables::{read_json, table_path, write_json};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub scene: String,
    pub lidar_frames: usize,
    pub camera_frames: usize,
    pub calib_files: usize,
    pub ego_pose_files: usize,
    /// Files left alone because the target already existed.
    pub skipped_existing: usize,
}

/// Copy `src` to `dst` unless `dst` exists. Returns whether a copy happened.
pub fn copy_if_absent(src: &Path, dst: &Path) -> Result<bool> {
    if dst.exists() {
        return Ok(false);
    }
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    std::fs::copy(src, dst).map_err(|e| PipelineError::io(src, e))?;
    Ok(true)
}

/// Row-major 4x4 sensor-to-ego transform, rounded to six decimals.
pub fn extrinsic_matrix(translation: Vec3, rotation: Quat) -> [f64; 16] {
    let r = Quaternion::from_wxyz(rotation).normalized().to_mat3();
    let round = |v: f64| (v * 1e6).round() / 1e6;
    let mut m = [0.0; 16];
    for row in 0..3 {
        for col in 0..3 {
            m[row * 4 + col] = round(r[row][col]);
        }
        m[row * 4 + 3] = round(translation[row]);
    }
    m[15] = 1.0;
    m
}

/// Row-major 3x3 pinhole matrix built from the focal lengths and principal
/// point of a calibrated intrinsic.
pub fn intrinsic_matrix(sensor: &CalibratedSensorRecord) -> Result<[f64; 9]> {
    let k = &sensor.camera_intrinsic;
    let at = |row: usize, col: usize| k.get(row).and_then(|r| r.get(col)).copied();
    match (at(0, 0), at(1, 1), at(0, 2), at(1, 2)) {
        (Some(fx), Some(fy), Some(cx), Some(cy)) => {
            Ok([fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0])
        }
        _ => Err(CoreError::Validation(format!(
            "camera '{}' has no 3x3 intrinsic",
            sensor.channel
        ))
        .into()),
    }
}

/// Write `value` to `dst` unless `dst` exists. Returns whether a write happened.
fn write_json_if_absent(dst: &Path, value: &serde_json::Value) -> Result<bool> {
    if dst.exists() {
        return Ok(false);
    }
    write_json(dst, value)?;
    Ok(true)
}

fn copy_lidar(lidar: &[FrameFile], target: &Path, summary: &mut ExportSummary) -> Result<()> {
    for file in lidar {
        let dst = target.join(file.name.encode());
        if copy_if_absent(&file.path, &dst)? {
            summary.lidar_frames += 1;
        } else {
            summary.skipped_existing += 1;
        }
    }
    Ok(())
}

fn copy_camera(
    channel: &str,
    cameras: &[FrameFile],
    lidar_stems: &BTreeSet<String>,
    main_channel: &str,
    target: &Path,
    summary: &mut ExportSummary,
) -> Result<()> {
    if cameras.len() != lidar_stems.len() {
        return Err(CoreError::Validation(format!(
            "camera '{channel}' has {} key frames but {main_channel} has {}",
            cameras.len(),
            lidar_stems.len()
        ))
        .into());
    }

    for file in cameras {
        let renamed = file.name.with_channel(main_channel);
        if !lidar_stems.contains(&renamed.stem()) {
            return Err(CoreError::Validation(format!(
                "camera frame '{}' has no {main_channel} frame at the same timestamp",
                file.name.encode()
            ))
            .into());
        }
        let dst = target.join(renamed.encode());
        if copy_if_absent(&file.path, &dst)? {
            summary.camera_frames += 1;
        } else {
            summary.skipped_existing += 1;
        }
    }
    Ok(())
}

/// Export the scene at `root` into its `sus/` directory.
pub fn export_scene_to_sus(root: &Path, config: &DatasetConfig) -> Result<ExportSummary> {
    let scene = SceneDir::new(root);
    let main_channel = config.main_channel.as_str();
    let tables_dir = scene.tables();

    let lidar_dir = scene.samples().join(main_channel);
    if !lidar_dir.is_dir() {
        return Err(PipelineError::MissingPath(lidar_dir));
    }
    let sensors: Vec<CalibratedSensorRecord> =
        read_json(&table_path(&tables_dir, CALIBRATED_SENSOR_TABLE))?;
    let poses: Vec<EgoPoseRecord> = read_json(&table_path(&tables_dir, EGO_POSE_TABLE))?;

    let mut summary = ExportSummary {
        scene: scene.name(),
        ..Default::default()
    };

    let mut by_channel: BTreeMap<String, Vec<FrameFile>> = BTreeMap::new();
    for file in list_frame_files(&scene.samples())? {
        by_channel
            .entry(file.name.channel.clone())
            .or_default()
            .push(file);
    }
    let lidar = by_channel.remove(main_channel).unwrap_or_default();
    if lidar.is_empty() {
        return Err(PipelineError::EmptyInput(format!(
            "no {main_channel} key frames in {}",
            lidar_dir.display()
        )));
    }

    copy_lidar(&lidar, &scene.sus(SUS_LIDAR), &mut summary)?;

    let lidar_stems: BTreeSet<String> = lidar.iter().map(|f| f.name.stem()).collect();
    for (channel, cameras) in &by_channel {
        if !config.is_camera_channel(channel) {
            continue;
        }
        let target = scene.sus(SUS_CAMERA).join(channel);
        copy_camera(channel, cameras, &lidar_stems, main_channel, &target, &mut summary)?;
    }

    let label_dir = scene.sus(SUS_LABEL);
    std::fs::create_dir_all(&label_dir).map_err(|e| PipelineError::io(&label_dir, e))?;

    let calib_dir = scene.sus_camera_calib();
    for sensor in sensors.iter().filter(|s| config.is_camera_channel(&s.channel)) {
        let path = calib_dir.join(format!("{}.json", sensor.channel));
        let body = json!({
            "extrinsic": extrinsic_matrix(sensor.translation, sensor.rotation).to_vec(),
            "intrinsic": intrinsic_matrix(sensor)?.to_vec(),
        });
        if write_json_if_absent(&path, &body)? {
            summary.calib_files += 1;
        } else {
            summary.skipped_existing += 1;
        }
    }

    let poses: BTreeMap<_, _> = poses.into_iter().map(|p| (p.timestamp, p)).collect();
    let pose_dir = scene.sus(SUS_EGO_POSE);
    for file in &lidar {
        let Some(pose) = poses.get(&file.name.timestamp) else {
            tracing::warn!(frame = %file.name.encode(), "No ego pose for lidar frame");
            continue;
        };
        let path = pose_dir.join(format!("{}.json", file.name.stem()));
        let body = json!({"translation": pose.translation, "rotation": pose.rotation});
        if write_json_if_absent(&path, &body)? {
            summary.ego_pose_files += 1;
        } else {
            summary.skipped_existing += 1;
        }
    }

    tracing::info!(
        scene = %summary.scene,
        lidar = summary.lidar_frames,
        camera = summary.camera_frames,
        calib = summary.calib_files,
        skipped = summary.skipped_existing,
        "Scene exported to SUS layout",
    );
    Ok(summary)
}
