//! Frame discovery.
//!
//! Key frames live under `samples/{channel}/` and non-key frames under
//! `sweeps/{channel}/`. Every file name is decoded with the frame codec and
//! must belong to the scene and channel of the directory it sits in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use roscenes_core::error::CoreError;
use roscenes_core::filename::{decode, FrameFilename};
use roscenes_core::records::SceneFrame;

use crate::error::{PipelineError, Result};
use crate::layout::{is_image_extension, SceneDir};

/// A decoded frame file.
#[derive(Debug, Clone)]
pub struct FrameFile {
    pub path: PathBuf,
    pub name: FrameFilename,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .is_some_and(|s| s.starts_with('.'))
}

/// Every frame file below `root/{channel}/`, sorted by path.
///
/// A missing `root` yields nothing.
pub fn list_frame_files(root: &Path) -> Result<Vec<FrameFile>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            PipelineError::io(path, std::io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let name = decode(&file_name)?;
        let dir_channel = entry
            .path()
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.channel != dir_channel {
            return Err(CoreError::MalformedFilename {
                filename: file_name,
                reason: format!(
                    "channel '{}' does not match directory '{dir_channel}'",
                    name.channel
                ),
            }
            .into());
        }

        files.push(FrameFile {
            path: entry.into_path(),
            name,
        });
    }
    Ok(files)
}

fn image_size(path: &Path) -> Result<(u32, u32)> {
    image::image_dimensions(path).map_err(|source| PipelineError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// All frames of a scene, ready for the table builders.
///
/// Width and height come from the first image of each channel; point clouds
/// and other non-image files report 0x0.
pub fn scan_scene_frames(scene: &SceneDir) -> Result<Vec<SceneFrame>> {
    let scene_name = scene.name();
    let mut sizes: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    let mut frames = Vec::new();

    for (root, is_key_frame) in [(scene.samples(), true), (scene.sweeps(), false)] {
        for file in list_frame_files(&root)? {
            if file.name.scene_name != scene_name {
                return Err(CoreError::MalformedFilename {
                    filename: file.name.encode(),
                    reason: format!("frame does not belong to scene '{scene_name}'"),
                }
                .into());
            }

            let (width, height) = if is_image_extension(&file.name.extension) {
                match sizes.get(&file.name.channel) {
                    Some(size) => *size,
                    None => {
                        let size = image_size(&file.path)?;
                        sizes.insert(file.name.channel.clone(), size);
                        size
                    }
                }
            } else {
                (0, 0)
            };

            frames.push(SceneFrame {
                channel: file.name.channel.clone(),
                timestamp: file.name.timestamp,
                is_key_frame,
                file_name: file.name.encode(),
                fileformat: file.name.extension.clone(),
                width,
                height,
            });
        }
    }

    tracing::debug!(scene = %scene_name, frames = frames.len(), "Scanned scene frames");
    Ok(frames)
}
