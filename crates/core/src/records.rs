//! Table records and the builders that assemble them.
//!
//! Each builder composes token rules and chain links into the flat record
//! shape of one JSON table. Builders are pure; a whole scene database is
//! produced by [`SceneTables::build`] and annotations are added later with
//! [`SceneTables::set_annotations`].

use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::chain::{build_chain, build_grouped_chains};
use crate::config::DatasetConfig;
use crate::error::CoreError;
use crate::filename::SceneName;
use crate::instance::{aggregate, AnnotationCandidate, TrackSummary};
use crate::taxonomy::{attribute_table, category_table, visibility_table};
use crate::token::{
    attribute_token, calibrated_sensor_token, category_token, ego_pose_token, instance_token,
    log_token, map_token, sample_annotation_token, sample_data_token, sample_link, sample_token,
    scene_token, sensor_token, visibility_token,
};
use crate::types::{Quat, Timestamp, Token, Vec3};

// ---------------------------------------------------------------------------
// Table names
// ---------------------------------------------------------------------------

pub const SCENE_TABLE: &str = "scene";
pub const SAMPLE_TABLE: &str = "sample";
pub const SAMPLE_DATA_TABLE: &str = "sample_data";
pub const EGO_POSE_TABLE: &str = "ego_pose";
pub const CALIBRATED_SENSOR_TABLE: &str = "calibrated_sensor";
pub const SENSOR_TABLE: &str = "sensor";
pub const LOG_TABLE: &str = "log";
pub const MAP_TABLE: &str = "map";
pub const INSTANCE_TABLE: &str = "instance";
pub const SAMPLE_ANNOTATION_TABLE: &str = "sample_annotation";
pub const CATEGORY_TABLE: &str = "category";
pub const ATTRIBUTE_TABLE: &str = "attribute";
pub const VISIBILITY_TABLE: &str = "visibility";

/// Every table of a scene database, in write order.
pub const ALL_TABLES: [&str; 13] = [
    SCENE_TABLE,
    SAMPLE_TABLE,
    SAMPLE_DATA_TABLE,
    EGO_POSE_TABLE,
    CALIBRATED_SENSOR_TABLE,
    SENSOR_TABLE,
    LOG_TABLE,
    MAP_TABLE,
    INSTANCE_TABLE,
    SAMPLE_ANNOTATION_TABLE,
    CATEGORY_TABLE,
    ATTRIBUTE_TABLE,
    VISIBILITY_TABLE,
];

/// File name of a table, e.g. `sample_data.json`.
pub fn table_file_name(table: &str) -> String {
    format!("{table}.json")
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub token: Token,
    pub name: String,
    pub description: String,
    pub log_token: Token,
    pub nbr_samples: usize,
    pub first_sample_token: Token,
    pub last_sample_token: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub token: Token,
    pub scene_token: Token,
    pub timestamp: Timestamp,
    pub prev: Token,
    pub next: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleDataRecord {
    pub token: Token,
    pub sample_token: Token,
    pub ego_pose_token: Token,
    pub calibrated_sensor_token: Token,
    pub filename: String,
    pub fileformat: String,
    pub width: u32,
    pub height: u32,
    pub timestamp: Timestamp,
    pub is_key_frame: bool,
    pub next: Token,
    pub prev: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgoPoseRecord {
    pub token: Token,
    pub translation: Vec3,
    pub rotation: Quat,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedSensorRecord {
    pub token: Token,
    pub sensor_token: Token,
    pub translation: Vec3,
    pub rotation: Quat,
    /// 3x3 intrinsic matrix for cameras, empty for other sensors.
    pub camera_intrinsic: Vec<Vec<f64>>,
    pub channel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    pub token: Token,
    pub channel: String,
    pub modality: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub token: Token,
    pub logfile: String,
    pub vehicle: String,
    pub date_captured: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapRecord {
    pub token: Token,
    pub filename: String,
    pub log_tokens: Vec<Token>,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub token: Token,
    pub category_token: Token,
    pub nbr_annotations: usize,
    pub first_annotation_token: Token,
    pub last_annotation_token: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleAnnotationRecord {
    pub token: Token,
    pub sample_token: Token,
    pub instance_token: Token,
    pub attribute_tokens: Vec<Token>,
    pub visibility_token: u8,
    pub translation: Vec3,
    pub size: Vec3,
    pub rotation: Quat,
    pub num_lidar_pts: u32,
    pub num_radar_pts: u32,
    pub prev: Token,
    pub next: Token,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub token: Token,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub token: Token,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRecord {
    pub token: u8,
    pub level: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// One frame file of a scene, as listed from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFrame {
    pub channel: String,
    pub timestamp: Timestamp,
    pub is_key_frame: bool,
    /// Bare file name or a path; only the last component is kept.
    pub file_name: String,
    pub fileformat: String,
    pub width: u32,
    pub height: u32,
}

/// A recorded vehicle pose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgoPoseInput {
    pub timestamp: Timestamp,
    pub translation: Vec3,
    pub rotation: Quat,
}

/// Extrinsics (and intrinsics for cameras) of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationInput {
    pub channel: String,
    pub translation: Vec3,
    pub rotation: Quat,
    #[serde(default)]
    pub camera_intrinsic: Option<Vec<Vec<f64>>>,
}

/// Everything needed to build one scene database.
#[derive(Debug, Clone)]
pub struct SceneInput {
    pub name: SceneName,
    pub description: String,
    /// Falls back to the configured default map.
    pub map_name: Option<String>,
    /// Falls back to the UTC date of the first sample.
    pub date_captured: Option<String>,
    pub frames: Vec<SceneFrame>,
    pub ego_poses: Vec<EgoPoseInput>,
    pub calibrations: Vec<CalibrationInput>,
}

// ---------------------------------------------------------------------------
// Scene level builders
// ---------------------------------------------------------------------------

/// Key-frame timestamps of the channel that defines samples.
///
/// Uses `main_channel` when it has frames, otherwise the lexicographically
/// first channel. Result is sorted and deduplicated.
pub fn sample_timestamps(frames: &[SceneFrame], main_channel: &str) -> Vec<Timestamp> {
    let channels: BTreeSet<&str> = frames.iter().map(|f| f.channel.as_str()).collect();
    let Some(reference) = channels
        .contains(main_channel)
        .then_some(main_channel)
        .or_else(|| channels.iter().next().copied())
    else {
        return Vec::new();
    };

    let timestamps: BTreeSet<Timestamp> = frames
        .iter()
        .filter(|f| f.channel == reference && f.is_key_frame)
        .map(|f| f.timestamp)
        .collect();
    timestamps.into_iter().collect()
}

pub fn build_scene(
    scene: &str,
    sample_timestamps: &[Timestamp],
    description: &str,
) -> Result<SceneRecord, CoreError> {
    let (Some(first), Some(last)) = (sample_timestamps.first(), sample_timestamps.last()) else {
        return Err(CoreError::Validation(format!(
            "Scene '{scene}' has no key-frame samples"
        )));
    };
    Ok(SceneRecord {
        token: scene_token(scene),
        name: scene.to_string(),
        description: description.to_string(),
        log_token: log_token(scene),
        nbr_samples: sample_timestamps.len(),
        first_sample_token: sample_token(scene, *first),
        last_sample_token: sample_token(scene, *last),
    })
}

pub fn build_samples(scene: &str, sample_timestamps: &[Timestamp]) -> Vec<SampleRecord> {
    let scene_token = scene_token(scene);
    build_chain(sample_timestamps.iter().copied())
        .into_iter()
        .map(|link| SampleRecord {
            token: sample_token(scene, link.key),
            scene_token: scene_token.clone(),
            timestamp: link.key,
            prev: sample_link(scene, link.prev),
            next: sample_link(scene, link.next),
        })
        .collect()
}

/// Sample a key frame belongs to: the nearest sample, earlier on a tie.
fn nearest_sample(sample_timestamps: &[Timestamp], ts: Timestamp) -> Option<Timestamp> {
    let idx = sample_timestamps.partition_point(|s| *s <= ts);
    let before = idx.checked_sub(1).map(|i| sample_timestamps[i]);
    let after = sample_timestamps.get(idx).copied();
    match (before, after) {
        (Some(b), Some(a)) => Some(if ts - b <= a - ts { b } else { a }),
        (b, a) => b.or(a),
    }
}

fn normalized_frame_path(frame: &SceneFrame) -> String {
    let base = frame
        .file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(&frame.file_name);
    let folder = if frame.is_key_frame { "samples" } else { "sweeps" };
    format!("{folder}/{}/{base}", frame.channel)
}

/// Sample data records, chained per channel.
///
/// Key frames attach to their nearest sample. A non-key frame attaches to the
/// sample of the most recent key frame before it in the same channel, or to
/// nothing if the channel has not had a key frame yet.
///
/// Two frames with the same channel and timestamp are an error, even when one
/// is a key frame and the other a sweep.
pub fn build_sample_data(
    scene: &str,
    frames: &[SceneFrame],
    sample_timestamps: &[Timestamp],
) -> Result<Vec<SampleDataRecord>, CoreError> {
    let mut by_channel: BTreeMap<&str, BTreeMap<Timestamp, &SceneFrame>> = BTreeMap::new();
    for frame in frames {
        let channel_frames = by_channel.entry(frame.channel.as_str()).or_default();
        if let Some(existing) = channel_frames.insert(frame.timestamp, frame) {
            return Err(CoreError::Validation(format!(
                "Duplicate frame for channel '{}' at {}: '{}' and '{}'",
                frame.channel,
                frame.timestamp,
                normalized_frame_path(existing),
                normalized_frame_path(frame)
            )));
        }
    }

    let chains = build_grouped_chains(
        frames
            .iter()
            .map(|f| (f.channel.as_str(), f.timestamp)),
    );

    let mut records = Vec::with_capacity(frames.len());
    for (channel, chain) in chains {
        let channel_frames = &by_channel[channel];
        let mut current_sample: Option<Timestamp> = None;

        for link in chain {
            let frame = channel_frames[&link.key];
            if frame.is_key_frame {
                current_sample = nearest_sample(sample_timestamps, frame.timestamp);
            }
            records.push(SampleDataRecord {
                token: sample_data_token(scene, frame.timestamp, channel),
                sample_token: sample_link(scene, current_sample),
                ego_pose_token: ego_pose_token(scene, frame.timestamp),
                calibrated_sensor_token: calibrated_sensor_token(scene, channel),
                filename: normalized_frame_path(frame),
                fileformat: frame.fileformat.clone(),
                width: frame.width,
                height: frame.height,
                timestamp: frame.timestamp,
                is_key_frame: frame.is_key_frame,
                next: link
                    .next
                    .map(|ts| sample_data_token(scene, ts, channel))
                    .unwrap_or_default(),
                prev: link
                    .prev
                    .map(|ts| sample_data_token(scene, ts, channel))
                    .unwrap_or_default(),
            });
        }
    }
    Ok(records)
}

/// Ego poses for every recorded pose and every frame timestamp.
///
/// Frames reference the pose at their own timestamp. When no pose was
/// recorded at exactly that time, the nearest recorded pose within
/// `tolerance_us` is reused; a frame farther than that from every pose is an
/// error.
pub fn build_ego_poses(
    scene: &str,
    poses: &[EgoPoseInput],
    frame_timestamps: &BTreeSet<Timestamp>,
    tolerance_us: i64,
) -> Result<Vec<EgoPoseRecord>, CoreError> {
    let mut recorded: BTreeMap<Timestamp, &EgoPoseInput> = BTreeMap::new();
    for pose in poses {
        recorded.insert(pose.timestamp, pose);
    }

    let mut resolved: BTreeMap<Timestamp, &EgoPoseInput> = recorded.clone();
    for &ts in frame_timestamps {
        if resolved.contains_key(&ts) {
            continue;
        }
        let before = recorded.range(..=ts).next_back();
        let after = recorded.range(ts..).next();
        let nearest = match (before, after) {
            (Some(b), Some(a)) => Some(if ts - b.0 <= a.0 - ts { b } else { a }),
            (b, a) => b.or(a),
        };
        match nearest {
            Some((pose_ts, pose)) if (ts - pose_ts).abs() <= tolerance_us => {
                resolved.insert(ts, *pose);
            }
            _ => {
                return Err(CoreError::Validation(format!(
                    "Scene '{scene}' has no ego pose within {tolerance_us}us of frame {ts}"
                )))
            }
        }
    }

    Ok(resolved
        .into_iter()
        .map(|(ts, pose)| EgoPoseRecord {
            token: ego_pose_token(scene, ts),
            translation: pose.translation,
            rotation: pose.rotation,
            timestamp: ts,
        })
        .collect())
}

pub fn build_calibrated_sensors(
    scene: &str,
    calibrations: &[CalibrationInput],
) -> Vec<CalibratedSensorRecord> {
    let mut by_channel: BTreeMap<&str, &CalibrationInput> = BTreeMap::new();
    for calibration in calibrations {
        by_channel.insert(calibration.channel.as_str(), calibration);
    }
    by_channel
        .into_values()
        .map(|c| CalibratedSensorRecord {
            token: calibrated_sensor_token(scene, &c.channel),
            sensor_token: sensor_token(&c.channel),
            translation: c.translation,
            rotation: c.rotation,
            camera_intrinsic: c.camera_intrinsic.clone().unwrap_or_default(),
            channel: c.channel.clone(),
        })
        .collect()
}

/// Modality inferred from a channel name.
pub fn sensor_modality(channel: &str) -> Result<&'static str, CoreError> {
    let lower = channel.to_ascii_lowercase();
    if lower.contains("cam") {
        Ok("camera")
    } else if lower.contains("lidar") {
        Ok("lidar")
    } else if lower.contains("radar") {
        Ok("radar")
    } else {
        Err(CoreError::Validation(format!(
            "Cannot infer sensor modality of channel '{channel}'"
        )))
    }
}

pub fn build_sensors<'a, I>(channels: I) -> Result<Vec<SensorRecord>, CoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let channels: BTreeSet<&str> = channels.into_iter().collect();
    channels
        .into_iter()
        .map(|channel| {
            Ok(SensorRecord {
                token: sensor_token(channel),
                channel: channel.to_string(),
                modality: sensor_modality(channel)?.to_string(),
            })
        })
        .collect()
}

pub fn build_log(scene: &SceneName, date_captured: &str, map_name: &str) -> LogRecord {
    LogRecord {
        token: log_token(&scene.to_string()),
        logfile: String::new(),
        vehicle: scene.car_id.clone(),
        date_captured: date_captured.to_string(),
        location: map_name.to_string(),
    }
}

pub fn build_map(scene: &str, map_name: &str, category: &str) -> MapRecord {
    let token = map_token(map_name);
    MapRecord {
        filename: format!("maps/{token}.png"),
        token,
        log_tokens: vec![log_token(scene)],
        category: category.to_string(),
    }
}

/// UTC calendar date of a microsecond timestamp.
pub fn capture_date(timestamp: Timestamp) -> Result<String, CoreError> {
    DateTime::from_timestamp_micros(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .ok_or_else(|| CoreError::Validation(format!("Timestamp {timestamp} is out of range")))
}

// ---------------------------------------------------------------------------
// Annotation builders
// ---------------------------------------------------------------------------

pub fn build_instances(tracks: &BTreeMap<String, TrackSummary>) -> Vec<InstanceRecord> {
    tracks
        .values()
        .map(|track| InstanceRecord {
            token: instance_token(&track.scene_name, Some(&track.track_id)),
            category_token: category_token(&track.category),
            nbr_annotations: track.count,
            first_annotation_token: sample_annotation_token(
                &track.scene_name,
                Some(track.first_timestamp),
                Some(track.first_object_id),
            ),
            last_annotation_token: sample_annotation_token(
                &track.scene_name,
                Some(track.last_timestamp),
                Some(track.last_object_id),
            ),
        })
        .collect()
}

/// Annotation records, chained per track in `(timestamp, object_id)` order.
///
/// Output follows the same order: by track id, then along the chain.
pub fn build_sample_annotations(
    candidates: &[AnnotationCandidate],
    tracks: &BTreeMap<String, TrackSummary>,
) -> Result<Vec<SampleAnnotationRecord>, CoreError> {
    let mut by_key: BTreeMap<(&str, Timestamp, usize), &AnnotationCandidate> = BTreeMap::new();
    for c in candidates {
        by_key.insert((c.track_id.as_str(), c.timestamp, c.object_id), c);
    }

    let mut records = Vec::with_capacity(candidates.len());
    for (track_id, track) in tracks {
        let scene = track.scene_name.as_str();
        let link_token = |key: Option<(Timestamp, usize)>| {
            key.map(|(ts, id)| sample_annotation_token(scene, Some(ts), Some(id)))
                .unwrap_or_default()
        };
        for link in build_chain(track.appearances()) {
            let (ts, object_id) = link.key;
            let candidate = by_key
                .get(&(track_id.as_str(), ts, object_id))
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Track '{track_id}' lists object {object_id} at {ts} with no annotation"
                    ))
                })?;

            records.push(SampleAnnotationRecord {
                token: sample_annotation_token(scene, Some(ts), Some(object_id)),
                sample_token: sample_token(scene, ts),
                instance_token: instance_token(scene, Some(track_id)),
                attribute_tokens: candidate
                    .attributes
                    .iter()
                    .map(|a| attribute_token(Some(a)))
                    .collect(),
                visibility_token: visibility_token(&candidate.visibility),
                translation: candidate.translation,
                size: candidate.size,
                rotation: candidate.rotation,
                num_lidar_pts: candidate.num_lidar_pts,
                num_radar_pts: 0,
                prev: link_token(link.prev),
                next: link_token(link.next),
            });
        }
    }
    Ok(records)
}

/// Instance and annotation tables of one scene.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationTables {
    pub instance: Vec<InstanceRecord>,
    pub sample_annotation: Vec<SampleAnnotationRecord>,
}

pub fn build_annotation_tables(
    candidates: &[AnnotationCandidate],
) -> Result<AnnotationTables, CoreError> {
    let tracks = aggregate(candidates)?;
    Ok(AnnotationTables {
        instance: build_instances(&tracks),
        sample_annotation: build_sample_annotations(candidates, &tracks)?,
    })
}

// ---------------------------------------------------------------------------
// Scene database
// ---------------------------------------------------------------------------

/// All thirteen tables of one scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTables {
    pub scene: Vec<SceneRecord>,
    pub sample: Vec<SampleRecord>,
    pub sample_data: Vec<SampleDataRecord>,
    pub ego_pose: Vec<EgoPoseRecord>,
    pub calibrated_sensor: Vec<CalibratedSensorRecord>,
    pub sensor: Vec<SensorRecord>,
    pub log: Vec<LogRecord>,
    pub map: Vec<MapRecord>,
    pub instance: Vec<InstanceRecord>,
    pub sample_annotation: Vec<SampleAnnotationRecord>,
    pub category: Vec<CategoryRecord>,
    pub attribute: Vec<AttributeRecord>,
    pub visibility: Vec<VisibilityRecord>,
}

impl SceneTables {
    /// Build the full database of one scene with empty annotation tables.
    pub fn build(input: &SceneInput, config: &DatasetConfig) -> Result<Self, CoreError> {
        let scene = input.name.to_string();
        let samples = sample_timestamps(&input.frames, &config.main_channel);
        let scene_record = build_scene(&scene, &samples, &input.description)?;

        let map_name = input
            .map_name
            .clone()
            .unwrap_or_else(|| config.default_map_name.clone());
        let date_captured = match &input.date_captured {
            Some(date) => date.clone(),
            None => capture_date(samples[0])?,
        };

        let frame_timestamps: BTreeSet<Timestamp> =
            input.frames.iter().map(|f| f.timestamp).collect();
        let channels: BTreeSet<&str> = input
            .frames
            .iter()
            .map(|f| f.channel.as_str())
            .chain(input.calibrations.iter().map(|c| c.channel.as_str()))
            .collect();

        Ok(Self {
            scene: vec![scene_record],
            sample: build_samples(&scene, &samples),
            sample_data: build_sample_data(&scene, &input.frames, &samples)?,
            ego_pose: build_ego_poses(
                &scene,
                &input.ego_poses,
                &frame_timestamps,
                config.pose_tolerance_us,
            )?,
            calibrated_sensor: build_calibrated_sensors(&scene, &input.calibrations),
            sensor: build_sensors(channels)?,
            log: vec![build_log(&input.name, &date_captured, &map_name)],
            map: vec![build_map(&scene, &map_name, &config.map_category)],
            instance: Vec::new(),
            sample_annotation: Vec::new(),
            category: category_table(),
            attribute: attribute_table(),
            visibility: visibility_table(),
        })
    }

    pub fn set_annotations(&mut self, tables: AnnotationTables) {
        self.instance = tables.instance;
        self.sample_annotation = tables.sample_annotation;
    }

    /// Every table as a `(name, JSON array)` pair, in [`ALL_TABLES`] order.
    pub fn to_json_tables(&self) -> Result<Vec<(&'static str, serde_json::Value)>, CoreError> {
        fn json<T: Serialize>(table: &str, rows: &[T]) -> Result<serde_json::Value, CoreError> {
            serde_json::to_value(rows).map_err(|e| CoreError::MalformedRecord {
                table: table.to_string(),
                reason: e.to_string(),
            })
        }

        Ok(vec![
            (SCENE_TABLE, json(SCENE_TABLE, &self.scene)?),
            (SAMPLE_TABLE, json(SAMPLE_TABLE, &self.sample)?),
            (SAMPLE_DATA_TABLE, json(SAMPLE_DATA_TABLE, &self.sample_data)?),
            (EGO_POSE_TABLE, json(EGO_POSE_TABLE, &self.ego_pose)?),
            (
                CALIBRATED_SENSOR_TABLE,
                json(CALIBRATED_SENSOR_TABLE, &self.calibrated_sensor)?,
            ),
            (SENSOR_TABLE, json(SENSOR_TABLE, &self.sensor)?),
            (LOG_TABLE, json(LOG_TABLE, &self.log)?),
            (MAP_TABLE, json(MAP_TABLE, &self.map)?),
            (INSTANCE_TABLE, json(INSTANCE_TABLE, &self.instance)?),
            (
                SAMPLE_ANNOTATION_TABLE,
                json(SAMPLE_ANNOTATION_TABLE, &self.sample_annotation)?,
            ),
            (CATEGORY_TABLE, json(CATEGORY_TABLE, &self.category)?),
            (ATTRIBUTE_TABLE, json(ATTRIBUTE_TABLE, &self.attribute)?),
            (VISIBILITY_TABLE, json(VISIBILITY_TABLE, &self.visibility)?),
        ])
    }
}
