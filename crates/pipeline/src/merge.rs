//! Dataset merge.
//!
//! Combines many labelled scene databases into one dataset with a
//! `v1.0-trainval` and a `v1.0-test` split:
//!
//! 1. Eligible scenes are discovered and assigned to a split.
//! 2. `maps/`, `samples/` and `sweeps/` of every scene are copied on the
//!    worker pool.
//! 3. Tables are reconciled serially, one [`TableMerge`] per split and
//!    table, starting from whatever the output already holds.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use walkdir::WalkDir;

use roscenes_core::merge::{MergeState, TableMerge};
use roscenes_core::records::{ALL_TABLES, INSTANCE_TABLE, SAMPLE_ANNOTATION_TABLE};
use roscenes_core::token::scene_token;

use crate::batch::{list_scene_dirs, run_scene_batch, BatchFailure};
use crate::error::{PipelineError, Result};
use crate::layout::{
    SceneDir, MAPS_DIR, SAMPLES_DIR, SWEEPS_DIR, TEST_LIST, TEST_VERSION, TRAINVAL_LIST,
    TRAINVAL_VERSION,
};
use crate::tables::{read_json, table_has_records, table_path, write_table};

// ---------------------------------------------------------------------------
// Splits
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Trainval,
    Test,
}

impl Split {
    pub fn version_dir(self) -> &'static str {
        match self {
            Self::Trainval => TRAINVAL_VERSION,
            Self::Test => TEST_VERSION,
        }
    }
}

/// Explicit scene lists. A scene named in neither is left out of the merge.
#[derive(Debug, Clone, Default)]
pub struct SceneLists {
    pub trainval: Vec<String>,
    pub test: Vec<String>,
}

/// Read a `.lst` file: one scene name per line, blank lines ignored.
pub fn read_scene_list(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Lists stored next to the scenes, used when both files exist.
pub fn library_scene_lists(library: &Path) -> Result<Option<SceneLists>> {
    let trainval = library.join(TRAINVAL_LIST);
    let test = library.join(TEST_LIST);
    if !(trainval.is_file() && test.is_file()) {
        return Ok(None);
    }
    Ok(Some(SceneLists {
        trainval: read_scene_list(&trainval)?,
        test: read_scene_list(&test)?,
    }))
}

/// Deterministic split: test when the first byte of the scene token falls
/// below `test_ratio * 256`.
pub fn ratio_split(scene_name: &str, test_ratio: f64) -> Split {
    let token = scene_token(scene_name);
    let first = u8::from_str_radix(&token[..2], 16).unwrap_or(u8::MAX);
    if f64::from(first) < test_ratio * 256.0 {
        Split::Test
    } else {
        Split::Trainval
    }
}

/// Assign each scene name to a split. With lists, a scene named in neither
/// list gets no entry.
pub fn assign_splits(
    scenes: &[String],
    lists: Option<&SceneLists>,
    test_ratio: f64,
) -> BTreeMap<String, Split> {
    let Some(lists) = lists else {
        return scenes
            .iter()
            .map(|s| (s.clone(), ratio_split(s, test_ratio)))
            .collect();
    };

    let test: BTreeSet<&str> = lists.test.iter().map(String::as_str).collect();
    let trainval: BTreeSet<&str> = lists.trainval.iter().map(String::as_str).collect();
    let mut splits = BTreeMap::new();
    for scene in scenes {
        if test.contains(scene.as_str()) {
            splits.insert(scene.clone(), Split::Test);
        } else if trainval.contains(scene.as_str()) {
            splits.insert(scene.clone(), Split::Trainval);
        }
    }
    splits
}

// ---------------------------------------------------------------------------
// Eligibility
// ---------------------------------------------------------------------------

/// Why a scene cannot be merged, or `None` when it can.
pub fn ineligibility(root: &Path) -> Option<String> {
    let scene = SceneDir::new(root);
    for (path, what) in [
        (scene.maps(), "maps/"),
        (scene.samples(), "samples/"),
        (scene.tables(), "table directory"),
    ] {
        if !path.is_dir() {
            return Some(format!("missing {what}"));
        }
    }
    for table in [INSTANCE_TABLE, SAMPLE_ANNOTATION_TABLE] {
        if !table_has_records(&scene.tables(), table) {
            return Some(format!("{table}.json is missing or empty"));
        }
    }
    if !scene.sweeps().is_dir() {
        tracing::warn!(scene = %scene.name(), "Scene has no sweeps/ directory");
    }
    None
}

// ---------------------------------------------------------------------------
// Asset copy
// ---------------------------------------------------------------------------

/// Recursively copy `src` into `dst`, overwriting files. Returns files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::io(src, std::io::Error::other(e.to_string())))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| PipelineError::io(entry.path(), std::io::Error::other(e.to_string())))?;
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| PipelineError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
            }
            std::fs::copy(entry.path(), &target).map_err(|e| PipelineError::io(entry.path(), e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy the assets of one scene into the output dataset.
pub fn copy_scene_assets(root: &Path, output: &Path) -> Result<usize> {
    let mut copied = 0;
    for dir in [MAPS_DIR, SAMPLES_DIR, SWEEPS_DIR] {
        let src = root.join(dir);
        if src.is_dir() {
            copied += copy_tree(&src, &output.join(dir))?;
        }
    }
    Ok(copied)
}

// ---------------------------------------------------------------------------
// Table reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableOutcome {
    pub split: Split,
    pub table: String,
    pub state: String,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn read_into(merge: &mut TableMerge, path: &Path) -> Result<()> {
    let value: Value = read_json(path)?;
    merge.read_input(value)?;
    Ok(())
}

/// Merge one table of one split. The existing output is read first, then
/// every scene in order, so later scenes win.
pub fn merge_table(split: Split, table: &str, scenes: &[PathBuf], out_dir: &Path) -> TableOutcome {
    let mut merge = TableMerge::new(table);

    let result = (|| -> Result<usize> {
        let existing = table_path(out_dir, table);
        if existing.exists() {
            read_into(&mut merge, &existing)?;
        }
        for root in scenes {
            let path = table_path(&SceneDir::new(root).tables(), table);
            if !path.exists() {
                tracing::debug!(table, scene = %root.display(), "Table missing in scene, skipping");
                continue;
            }
            read_into(&mut merge, &path)?;
        }
        let records = merge.reconcile()?;
        let rows = merge.begin_write()?;
        write_table(out_dir, table, &Value::Array(rows))?;
        merge.finish()?;
        Ok(records)
    })();

    match result {
        Ok(records) => TableOutcome {
            split,
            table: table.to_string(),
            state: merge.state().to_string(),
            records,
            error: None,
        },
        Err(e) => {
            if merge.state() != MergeState::Failed {
                merge.fail();
            }
            tracing::error!(table, split = split.version_dir(), error = %e, "Table merge failed");
            TableOutcome {
                split,
                table: table.to_string(),
                state: merge.state().to_string(),
                records: 0,
                error: Some(e.to_string()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset merge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub output: PathBuf,
    pub workers: usize,
    pub test_ratio: f64,
    /// Overrides lists found in the library.
    pub lists: Option<SceneLists>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedScene {
    pub scene: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub finished_at: DateTime<Utc>,
    pub splits: BTreeMap<Split, Vec<String>>,
    pub skipped: Vec<SkippedScene>,
    pub copy_failures: Vec<BatchFailure>,
    pub tables: Vec<TableOutcome>,
}

impl MergeReport {
    pub fn is_success(&self) -> bool {
        self.copy_failures.is_empty() && self.tables.iter().all(|t| t.error.is_none())
    }
}

/// Merge every eligible scene of `library` into `options.output`.
pub async fn merge_dataset(library: &Path, options: MergeOptions) -> Result<MergeReport> {
    let mut skipped = Vec::new();
    let mut eligible = Vec::new();
    for root in list_scene_dirs(library, &[])? {
        let scene = SceneDir::new(&root).name();
        match ineligibility(&root) {
            None => eligible.push(scene),
            Some(reason) => {
                tracing::warn!(scene = %scene, reason = %reason, "Scene not eligible for merge");
                skipped.push(SkippedScene { scene, reason });
            }
        }
    }
    if eligible.is_empty() {
        return Err(PipelineError::EmptyInput(format!(
            "no mergeable scenes in {}",
            library.display()
        )));
    }

    let lists = match options.lists {
        Some(lists) => Some(lists),
        None => library_scene_lists(library)?,
    };
    let assignment = assign_splits(&eligible, lists.as_ref(), options.test_ratio);
    for scene in eligible.iter().filter(|s| !assignment.contains_key(*s)) {
        tracing::warn!(scene = %scene, "Scene is in neither scene list, skipping");
        skipped.push(SkippedScene {
            scene: scene.clone(),
            reason: "not in any scene list".to_string(),
        });
    }

    for dir in [TRAINVAL_VERSION, TEST_VERSION, MAPS_DIR, SAMPLES_DIR, SWEEPS_DIR] {
        let path = options.output.join(dir);
        std::fs::create_dir_all(&path).map_err(|e| PipelineError::io(&path, e))?;
    }

    let roots: Vec<PathBuf> = assignment.keys().map(|s| library.join(s)).collect();
    let output = options.output.clone();
    let copies = run_scene_batch(roots, options.workers, move |root| {
        copy_scene_assets(root, &output)
    })
    .await?;

    let copied: BTreeSet<&str> = copies.succeeded_scenes().collect();
    let mut splits: BTreeMap<Split, Vec<String>> = BTreeMap::new();
    for (scene, split) in &assignment {
        if copied.contains(scene.as_str()) {
            splits.entry(*split).or_default().push(scene.clone());
        }
    }

    let mut tables = Vec::new();
    for (split, scenes) in &splits {
        let out_dir = options.output.join(split.version_dir());
        let roots: Vec<PathBuf> = scenes.iter().map(|s| library.join(s)).collect();
        tracing::info!(split = split.version_dir(), scenes = roots.len(), "Reconciling tables");
        for table in ALL_TABLES {
            tables.push(merge_table(*split, table, &roots, &out_dir));
        }
    }

    Ok(MergeReport {
        finished_at: Utc::now(),
        splits,
        skipped,
        copy_failures: copies.failed,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ratio_split_is_deterministic() {
        assert_eq!(ratio_split("0007_YC200-001", 0.2), ratio_split("0007_YC200-001", 0.2));
        assert_eq!(ratio_split("0007_YC200-001", 0.0), Split::Trainval);
        assert_eq!(ratio_split("0007_YC200-001", 1.0), Split::Test);
    }

    #[test]
    fn lists_override_ratio() {
        let scenes = vec!["0001_A".to_string(), "0002_A".to_string(), "0003_A".to_string()];
        let lists = SceneLists {
            trainval: vec!["0001_A".into()],
            test: vec!["0002_A".into()],
        };
        let splits = assign_splits(&scenes, Some(&lists), 0.5);
        assert_eq!(splits.len(), 2);
        assert_eq!(splits["0001_A"], Split::Trainval);
        assert_eq!(splits["0002_A"], Split::Test);
    }

    #[test]
    fn scene_list_ignores_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test_list.lst");
        std::fs::write(&path, "0001_A\n\n  0002_A \n").unwrap();
        assert_eq!(read_scene_list(&path).unwrap(), vec!["0001_A", "0002_A"]);
    }

    #[test]
    fn library_lists_need_both_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(TEST_LIST), "0001_A\n").unwrap();
        assert!(library_scene_lists(dir.path()).unwrap().is_none());
        std::fs::write(dir.path().join(TRAINVAL_LIST), "0002_A\n").unwrap();
        let lists = library_scene_lists(dir.path()).unwrap().unwrap();
        assert_eq!(lists.test, vec!["0001_A"]);
        assert_eq!(lists.trainval, vec!["0002_A"]);
    }

    #[test]
    fn unlabelled_scene_is_ineligible() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("0001_A");
        for sub in ["maps", "samples", "v1.0-all"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }
        write_table(&root.join("v1.0-all"), INSTANCE_TABLE, &json!([])).unwrap();
        let reason = ineligibility(&root).unwrap();
        assert!(reason.contains("instance.json"));

        write_table(&root.join("v1.0-all"), INSTANCE_TABLE, &json!([{"token": "i"}])).unwrap();
        write_table(&root.join("v1.0-all"), SAMPLE_ANNOTATION_TABLE, &json!([{"token": "a"}]))
            .unwrap();
        assert_eq!(ineligibility(&root), None);
    }

    #[test]
    fn copy_tree_preserves_layout() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("lidar-fusion")).unwrap();
        std::fs::write(src.join("lidar-fusion/a.pcd"), b"a").unwrap();
        std::fs::write(src.join("lidar-fusion/b.pcd"), b"b").unwrap();

        let dst = dir.path().join("dst");
        assert_eq!(copy_tree(&src, &dst).unwrap(), 2);
        assert_eq!(std::fs::read(dst.join("lidar-fusion/b.pcd")).unwrap(), b"b");
    }

    #[test]
    fn malformed_input_fails_only_that_table() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("0001_A");
        let tables = scene.join("v1.0-all");
        std::fs::create_dir_all(&tables).unwrap();
        std::fs::write(tables.join("log.json"), "[{\"token\": ").unwrap();
        write_table(&tables, "scene", &json!([{"token": "s"}])).unwrap();
        let out = dir.path().join("out");

        let log = merge_table(Split::Trainval, "log", &[scene.clone()], &out);
        assert_eq!(log.state, "failed");
        assert!(log.error.is_some());
        assert!(!out.join("log.json").exists());

        let scene_table = merge_table(Split::Trainval, "scene", &[scene], &out);
        assert_eq!(scene_table.state, "done");
        assert_eq!(scene_table.records, 1);
    }

    #[test]
    fn rerun_merges_into_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path().join("0001_A");
        let out = dir.path().join("out");
        write_table(
            &scene.join("v1.0-all"),
            "map",
            &json!([{"token": "m", "filename": "maps/m.png", "category": "default", "log_tokens": ["a", "b"]}]),
        )
        .unwrap();
        write_table(
            &out,
            "map",
            &json!([{"token": "m", "filename": "maps/m.png", "category": "default", "log_tokens": ["b", "c"]}]),
        )
        .unwrap();

        let outcome = merge_table(Split::Test, "map", &[scene], &out);
        assert_eq!(outcome.records, 1);
        let merged: Value = read_json(&out.join("map.json")).unwrap();
        assert_eq!(merged[0]["log_tokens"], json!(["a", "b", "c"]));
    }
}
