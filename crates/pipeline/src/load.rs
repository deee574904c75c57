//! SUS label import.
//!
//! Converts every `sus/label/*.json` file of a scene into annotation
//! candidates, moves them into the global frame with the scene's ego poses
//! and writes `instance.json` and `sample_annotation.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use roscenes_core::config::DatasetConfig;
use roscenes_core::error::CoreError;
use roscenes_core::filename::decode;
use roscenes_core::instance::AnnotationCandidate;
use roscenes_core::label::{objects_to_candidates, parse_label_objects, place_in_global, LabelOptions};
use roscenes_core::records::{
    build_annotation_tables, EgoPoseRecord, EGO_POSE_TABLE, INSTANCE_TABLE,
    SAMPLE_ANNOTATION_TABLE,
};
use roscenes_core::types::{Quat, Timestamp, Vec3};

use crate::error::{PipelineError, Result};
use crate::layout::{SceneDir, SUS_LABEL};
use crate::tables::{read_json, read_table, table_path, write_table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub scene: String,
    pub label_files: usize,
    pub instances: usize,
    pub annotations: usize,
}

/// Label files of a directory, sorted by name.
pub fn list_label_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(PipelineError::MissingPath(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::io(dir, std::io::Error::other(e.to_string())))?;
        let is_json = entry.path().extension().is_some_and(|ext| ext == "json");
        if entry.file_type().is_file() && is_json {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Candidates of one label file, still in the ego frame.
pub fn read_label_file(
    path: &Path,
    scene_name: &str,
    options: LabelOptions,
) -> Result<Vec<AnnotationCandidate>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let frame = decode(&file_name)?;
    if frame.scene_name != scene_name {
        return Err(CoreError::MalformedFilename {
            filename: file_name,
            reason: format!("label does not belong to scene '{scene_name}'"),
        }
        .into());
    }

    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let objects = parse_label_objects(&text, &file_name)?;
    Ok(objects_to_candidates(&frame, &objects, options)?)
}

/// Ego pose of every timestamp in an `ego_pose.json` table.
pub fn ego_pose_lookup(tables_dir: &Path) -> Result<BTreeMap<Timestamp, (Vec3, Quat)>> {
    let records: Vec<EgoPoseRecord> = read_json(&table_path(tables_dir, EGO_POSE_TABLE))?;
    Ok(records
        .into_iter()
        .map(|r| (r.timestamp, (r.translation, r.rotation)))
        .collect())
}

/// Import the SUS labels of the scene at `root` into its database.
pub fn load_scene_labels(root: &Path, config: &DatasetConfig) -> Result<LoadSummary> {
    let scene = SceneDir::new(root);
    let scene_name = scene.name();
    let tables_dir = scene.tables();

    // The database must exist before labels can reference it.
    read_table(&tables_dir, EGO_POSE_TABLE)?;

    let options = LabelOptions {
        filter_enabled: config.filter_enabled,
        validation_mode: config.validation_mode,
    };
    let label_files = list_label_files(&scene.sus(SUS_LABEL))?;

    let mut candidates = Vec::new();
    for path in &label_files {
        candidates.extend(read_label_file(path, &scene_name, options)?);
    }

    let poses = ego_pose_lookup(&tables_dir)?;
    let candidates = place_in_global(candidates, &poses)?;
    let tables = build_annotation_tables(&candidates)?;

    write_table(
        &tables_dir,
        INSTANCE_TABLE,
        &serde_json::to_value(&tables.instance)
            .map_err(|e| PipelineError::json(table_path(&tables_dir, INSTANCE_TABLE), e))?,
    )?;
    write_table(
        &tables_dir,
        SAMPLE_ANNOTATION_TABLE,
        &serde_json::to_value(&tables.sample_annotation).map_err(|e| {
            PipelineError::json(table_path(&tables_dir, SAMPLE_ANNOTATION_TABLE), e)
        })?,
    )?;

    let summary = LoadSummary {
        scene: scene_name,
        label_files: label_files.len(),
        instances: tables.instance.len(),
        annotations: tables.sample_annotation.len(),
    };
    tracing::info!(
        scene = %summary.scene,
        label_files = summary.label_files,
        instances = summary.instances,
        annotations = summary.annotations,
        "Labels imported",
    );
    Ok(summary)
}
