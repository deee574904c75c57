//! Instance aggregation.
//!
//! Groups per-frame annotation candidates by track id and keeps, per track,
//! what the instance and annotation builders need: the annotation count, the
//! first and last appearance and a timestamp to object id side table for
//! per-track chain linkage.
//!
//! Within a track, appearances are ordered by `(timestamp, object_id)`, so two
//! boxes of one track in the same frame still get a total order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{Quat, Timestamp, Vec3};

/// One labelled object in one frame, already mapped onto the taxonomy and
/// expressed in the global frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationCandidate {
    pub scene_name: String,
    pub timestamp: Timestamp,
    /// Index of the object within its source frame.
    pub object_id: usize,
    pub track_id: String,
    pub category: String,
    pub attributes: Vec<String>,
    pub visibility: String,
    pub translation: Vec3,
    /// `[width, length, height]`.
    pub size: Vec3,
    pub rotation: Quat,
    pub num_lidar_pts: u32,
}

/// Everything known about one track after aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSummary {
    pub scene_name: String,
    pub track_id: String,
    /// Category of the first candidate seen for the track.
    pub category: String,
    pub count: usize,
    pub first_timestamp: Timestamp,
    pub first_object_id: usize,
    pub last_timestamp: Timestamp,
    pub last_object_id: usize,
    /// Object ids per timestamp, ascending.
    pub timestamp_to_object_id: BTreeMap<Timestamp, Vec<usize>>,
}

impl TrackSummary {
    /// Every appearance in chain order.
    pub fn appearances(&self) -> impl Iterator<Item = (Timestamp, usize)> + '_ {
        self.timestamp_to_object_id
            .iter()
            .flat_map(|(ts, ids)| ids.iter().map(move |id| (*ts, *id)))
    }
}

#[derive(Debug, Default)]
pub struct InstanceAggregator {
    tracks: BTreeMap<String, TrackSummary>,
}

impl InstanceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one candidate into its track.
    ///
    /// The same `(timestamp, object_id)` may not be pushed twice, and
    /// candidates from another scene are rejected since track ids are only
    /// unique within a scene.
    pub fn push(&mut self, candidate: &AnnotationCandidate) -> Result<(), CoreError> {
        let ts = candidate.timestamp;
        let object_id = candidate.object_id;

        let Some(track) = self.tracks.get_mut(&candidate.track_id) else {
            self.tracks.insert(
                candidate.track_id.clone(),
                TrackSummary {
                    scene_name: candidate.scene_name.clone(),
                    track_id: candidate.track_id.clone(),
                    category: candidate.category.clone(),
                    count: 1,
                    first_timestamp: ts,
                    first_object_id: object_id,
                    last_timestamp: ts,
                    last_object_id: object_id,
                    timestamp_to_object_id: BTreeMap::from([(ts, vec![object_id])]),
                },
            );
            return Ok(());
        };

        if track.scene_name != candidate.scene_name {
            return Err(CoreError::Validation(format!(
                "Track '{}' appears in scenes '{}' and '{}'",
                candidate.track_id, track.scene_name, candidate.scene_name
            )));
        }
        let ids = track.timestamp_to_object_id.entry(ts).or_default();
        let slot = match ids.binary_search(&object_id) {
            Ok(_) => {
                return Err(CoreError::Validation(format!(
                    "Object {object_id} of track '{}' pushed twice at timestamp {ts}",
                    candidate.track_id
                )))
            }
            Err(slot) => slot,
        };
        ids.insert(slot, object_id);

        track.count += 1;
        if (ts, object_id) < (track.first_timestamp, track.first_object_id) {
            track.first_timestamp = ts;
            track.first_object_id = object_id;
        }
        if (ts, object_id) > (track.last_timestamp, track.last_object_id) {
            track.last_timestamp = ts;
            track.last_object_id = object_id;
        }
        Ok(())
    }

    pub fn tracks(&self) -> &BTreeMap<String, TrackSummary> {
        &self.tracks
    }

    pub fn into_tracks(self) -> BTreeMap<String, TrackSummary> {
        self.tracks
    }
}

/// Aggregate a whole candidate list in one pass.
pub fn aggregate(
    candidates: &[AnnotationCandidate],
) -> Result<BTreeMap<String, TrackSummary>, CoreError> {
    let mut aggregator = InstanceAggregator::new();
    for candidate in candidates {
        aggregator.push(candidate)?;
    }
    Ok(aggregator.into_tracks())
}
