//! Bounded per-scene worker pool.
//!
//! Each scene job is blocking filesystem work, so it runs on the blocking
//! thread pool. A semaphore caps how many run at once. A failed job is
//! recorded and never cancels its siblings; finished scenes stay finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{PipelineError, Result};

/// One scene that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub scene: String,
    pub error: String,
}

/// Outcome of a batch, sorted by scene name.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<BatchFailure>,
}

impl<T> BatchReport<T> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_scenes(&self) -> impl Iterator<Item = &str> {
        self.succeeded.iter().map(|(scene, _)| scene.as_str())
    }
}

fn scene_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Run `job` once per scene directory with at most `workers` in flight.
pub async fn run_scene_batch<T, F>(
    scenes: Vec<PathBuf>,
    workers: usize,
    job: F,
) -> Result<BatchReport<T>>
where
    T: Send + 'static,
    F: Fn(&Path) -> Result<T> + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(workers.max(1)));
    let job = Arc::new(job);
    let mut tasks: JoinSet<(String, Result<T>)> = JoinSet::new();

    for root in scenes {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))?;
        let job = Arc::clone(&job);
        let name = scene_name(&root);

        tasks.spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || job(&root)).await;
            drop(permit);
            let result = match outcome {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Worker(e.to_string())),
            };
            (name, result)
        });
    }

    let mut report = BatchReport {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    while let Some(joined) = tasks.join_next().await {
        let (scene, result) = joined.map_err(|e| PipelineError::Worker(e.to_string()))?;
        match result {
            Ok(value) => report.succeeded.push((scene, value)),
            Err(e) => {
                tracing::error!(scene = %scene, error = %e, "Scene failed");
                report.failed.push(BatchFailure {
                    scene,
                    error: e.to_string(),
                });
            }
        }
    }

    report.succeeded.sort_by(|a, b| a.0.cmp(&b.0));
    report.failed.sort_by(|a, b| a.scene.cmp(&b.scene));
    tracing::info!(
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Batch complete",
    );
    Ok(report)
}

/// Child directories of a scene library, sorted by name.
///
/// With a non-empty `only`, just the named scenes are returned and a missing
/// one is an error.
pub fn list_scene_dirs(library: &Path, only: &[String]) -> Result<Vec<PathBuf>> {
    if !library.is_dir() {
        return Err(PipelineError::MissingPath(library.to_path_buf()));
    }

    if !only.is_empty() {
        return only
            .iter()
            .map(|name| {
                let path = library.join(name);
                if path.is_dir() {
                    Ok(path)
                } else {
                    Err(PipelineError::MissingPath(path))
                }
            })
            .collect();
    }

    let mut dirs = Vec::new();
    let entries = std::fs::read_dir(library).map_err(|e| PipelineError::io(library, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(library, e))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn failures_do_not_cancel_siblings() {
        let scenes = vec![
            PathBuf::from("/lib/0001_A"),
            PathBuf::from("/lib/0002_A"),
            PathBuf::from("/lib/0003_A"),
        ];
        let report = run_scene_batch(scenes, 2, |root| {
            if root.ends_with("0002_A") {
                Err(PipelineError::EmptyInput("no frames".into()))
            } else {
                Ok(1usize)
            }
        })
        .await
        .unwrap();

        let ok: Vec<&str> = report.succeeded_scenes().collect();
        assert_eq!(ok, vec!["0001_A", "0003_A"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].scene, "0002_A");
        assert!(report.failed[0].error.contains("no frames"));
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn panicking_job_is_reported() {
        let report = run_scene_batch(vec![PathBuf::from("/lib/0001_A")], 1, |_| -> Result<()> {
            panic!("boom")
        })
        .await
        .unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].scene, "0001_A");
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let scenes: Vec<PathBuf> = (0..8).map(|i| PathBuf::from(format!("/lib/{i:04}_A"))).collect();

        let (r, p) = (Arc::clone(&running), Arc::clone(&peak));
        let report = run_scene_batch(scenes, 2, move |_| {
            let now = r.fetch_add(1, Ordering::SeqCst) + 1;
            p.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            r.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(report.succeeded.len(), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn lists_child_directories_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("0002_A")).unwrap();
        std::fs::create_dir(dir.path().join("0001_A")).unwrap();
        std::fs::create_dir(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let dirs = list_scene_dirs(dir.path(), &[]).unwrap();
        let names: Vec<String> = dirs.iter().map(|p| scene_name(p)).collect();
        assert_eq!(names, vec!["0001_A", "0002_A"]);

        assert!(list_scene_dirs(dir.path(), &["0003_A".to_string()]).is_err());
    }
}
