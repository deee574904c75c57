//! Directory and file names of the on-disk dataset layout.
//!
//! ```text
//! {scene}/
//!   meta/ego_pose.json        recorded poses (input)
//!   meta/calibration.json     per-channel extrinsics (input)
//!   meta/scene.json           description, map, capture date (optional input)
//!   samples/{channel}/...     key frames
//!   sweeps/{channel}/...      non-key frames
//!   maps/
//!   v1.0-all/*.json           thirteen tables
//!   sus/{lidar,camera,label,ego_pose,calib/camera}
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const META_DIR: &str = "meta";
pub const EGO_POSE_INPUT: &str = "ego_pose.json";
pub const CALIBRATION_INPUT: &str = "calibration.json";
pub const SCENE_META: &str = "scene.json";

pub const SAMPLES_DIR: &str = "samples";
pub const SWEEPS_DIR: &str = "sweeps";
pub const MAPS_DIR: &str = "maps";

pub const ALL_VERSION: &str = "v1.0-all";
pub const TRAINVAL_VERSION: &str = "v1.0-trainval";
pub const TEST_VERSION: &str = "v1.0-test";

pub const SUS_DIR: &str = "sus";
pub const SUS_LIDAR: &str = "lidar";
pub const SUS_CAMERA: &str = "camera";
pub const SUS_LABEL: &str = "label";
pub const SUS_EGO_POSE: &str = "ego_pose";
pub const SUS_CALIB: &str = "calib";

pub const TRAINVAL_LIST: &str = "trainval_list.lst";
pub const TEST_LIST: &str = "test_list.lst";

/// Extensions read for width/height.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Optional `meta/scene.json` of a raw scene.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneMeta {
    #[serde(default)]
    pub description: String,
    pub map_name: Option<String>,
    pub date_captured: Option<String>,
}

/// Paths inside one scene directory.
#[derive(Debug, Clone)]
pub struct SceneDir {
    root: PathBuf,
}

impl SceneDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory name, which is the scene name.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn meta(&self, file: &str) -> PathBuf {
        self.root.join(META_DIR).join(file)
    }

    pub fn samples(&self) -> PathBuf {
        self.root.join(SAMPLES_DIR)
    }

    pub fn sweeps(&self) -> PathBuf {
        self.root.join(SWEEPS_DIR)
    }

    pub fn maps(&self) -> PathBuf {
        self.root.join(MAPS_DIR)
    }

    pub fn tables(&self) -> PathBuf {
        self.root.join(ALL_VERSION)
    }

    pub fn sus(&self, sub: &str) -> PathBuf {
        self.root.join(SUS_DIR).join(sub)
    }

    pub fn sus_camera_calib(&self) -> PathBuf {
        self.sus(SUS_CALIB).join(SUS_CAMERA)
    }
}

pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}
