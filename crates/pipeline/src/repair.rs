//! Label repair over a scene's `sus/label/` directory.

use std::path::Path;

use serde::Serialize;

use roscenes_core::label::parse_label_objects;
use roscenes_core::repair::{repair_labels, RepairOptions, RepairReport};

use crate::error::{PipelineError, Result};
use crate::layout::{SceneDir, SUS_LABEL};
use crate::load::list_label_files;
use crate::tables::write_json;

/// Repair outcome of one label file.
#[derive(Debug, Clone, Serialize)]
pub struct FileRepair {
    pub file: String,
    pub report: RepairReport,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SceneRepairSummary {
    pub scene: String,
    pub files: usize,
    /// Only files with findings are listed.
    pub findings: Vec<FileRepair>,
    pub written: usize,
}

/// Repair every label file of the scene at `root`.
///
/// With `persist` off this is a dry run that only reports.
pub fn repair_scene_labels(
    root: &Path,
    options: RepairOptions,
    persist: bool,
) -> Result<SceneRepairSummary> {
    let scene = SceneDir::new(root);
    let files = list_label_files(&scene.sus(SUS_LABEL))?;

    let mut summary = SceneRepairSummary {
        scene: scene.name(),
        files: files.len(),
        ..Default::default()
    };

    for path in &files {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
        let objects = parse_label_objects(&text, &file)?;
        let (repaired, report) = repair_labels(&objects, options);

        if persist && report.is_modified() {
            write_json(path, &repaired)?;
            summary.written += 1;
            tracing::info!(file = %file, clamped = report.scale_clamped.len(), removed = report.removed_empty.len(), "Label file repaired");
        }
        if report.is_modified() || !report.missing_point_count.is_empty() {
            summary.findings.push(FileRepair { file, report });
        }
    }

    Ok(summary)
}
