//! Scene database build.
//!
//! Reads the frames and metadata of one raw scene directory and writes the
//! thirteen tables to `v1.0-all/`. Annotation tables are written empty; the
//! label import fills them.

use std::path::Path;

use serde::Serialize;

use roscenes_core::config::DatasetConfig;
use roscenes_core::filename::SceneName;
use roscenes_core::records::{CalibrationInput, EgoPoseInput, SceneInput, SceneTables};

use crate::error::{PipelineError, Result};
use crate::layout::{SceneDir, SceneMeta, CALIBRATION_INPUT, EGO_POSE_INPUT, SCENE_META};
use crate::scan::scan_scene_frames;
use crate::tables::{read_json, write_table};

/// Counts of what one build wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub scene: String,
    pub samples: usize,
    pub sample_data: usize,
    pub ego_poses: usize,
    pub sensors: usize,
}

/// Assemble the build input of a scene directory.
pub fn load_scene_input(scene: &SceneDir) -> Result<SceneInput> {
    let name = SceneName::parse(&scene.name())?;

    let frames = scan_scene_frames(scene)?;
    if frames.is_empty() {
        return Err(PipelineError::EmptyInput(format!(
            "scene '{name}' has no frames under samples/ or sweeps/"
        )));
    }

    let ego_poses: Vec<EgoPoseInput> = read_json(&scene.meta(EGO_POSE_INPUT))?;
    let calibrations: Vec<CalibrationInput> = read_json(&scene.meta(CALIBRATION_INPUT))?;

    let meta_path = scene.meta(SCENE_META);
    let meta: SceneMeta = if meta_path.exists() {
        read_json(&meta_path)?
    } else {
        SceneMeta::default()
    };

    Ok(SceneInput {
        name,
        description: meta.description,
        map_name: meta.map_name,
        date_captured: meta.date_captured,
        frames,
        ego_poses,
        calibrations,
    })
}

/// Build and write the database of the scene at `root`.
pub fn build_scene_database(root: &Path, config: &DatasetConfig) -> Result<BuildSummary> {
    let scene = SceneDir::new(root);
    let input = load_scene_input(&scene)?;
    let tables = SceneTables::build(&input, config)?;

    let out = scene.tables();
    for (table, rows) in tables.to_json_tables()? {
        write_table(&out, table, &rows)?;
    }
    let maps = scene.maps();
    std::fs::create_dir_all(&maps).map_err(|e| PipelineError::io(&maps, e))?;

    let summary = BuildSummary {
        scene: input.name.to_string(),
        samples: tables.sample.len(),
        sample_data: tables.sample_data.len(),
        ego_poses: tables.ego_pose.len(),
        sensors: tables.sensor.len(),
    };
    tracing::info!(
        scene = %summary.scene,
        samples = summary.samples,
        sample_data = summary.sample_data,
        ego_poses = summary.ego_poses,
        "Scene database written",
    );
    Ok(summary)
}
