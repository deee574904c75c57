//! Dataset-wide properties of the core builders.
//!
//! Exercises token determinism, chain integrity across interleaved tracks,
//! instance/annotation count consistency and merge behaviour through the
//! public API only.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use roscenes_core::chain::build_grouped_chains;
use roscenes_core::filename::{decode, encode};
use roscenes_core::instance::AnnotationCandidate;
use roscenes_core::merge::merge;
use roscenes_core::records::build_annotation_tables;
use roscenes_core::token::{identify, sample_annotation_token, sample_data_token};

const SCENE: &str = "0007_YC200-001";

fn candidate(track: &str, ts: i64, object_id: usize) -> AnnotationCandidate {
    AnnotationCandidate {
        scene_name: SCENE.to_string(),
        timestamp: ts,
        object_id,
        track_id: track.to_string(),
        category: "vehicle.car".to_string(),
        attributes: vec!["vehicle.moving".to_string()],
        visibility: "v80-100".to_string(),
        translation: [0.0, 0.0, 0.0],
        size: [2.0, 4.0, 1.5],
        rotation: [1.0, 0.0, 0.0, 0.0],
        num_lidar_pts: 10,
    }
}

// ---------------------------------------------------------------------------
// Test: identifiers
// ---------------------------------------------------------------------------

/// Same natural key, same token; neighbouring keys never collide.
#[test]
fn tokens_are_deterministic_and_distinct() {
    assert_eq!(identify("0007_YC200-001-scene"), identify("0007_YC200-001-scene"));

    let tokens: BTreeSet<String> = (0..200)
        .map(|ts| sample_data_token(SCENE, ts, "lidar-fusion"))
        .collect();
    assert_eq!(tokens.len(), 200);
    assert_ne!(
        sample_data_token(SCENE, 100, "lidar-top"),
        sample_data_token(SCENE, 100, "lidar-fusion")
    );
}

/// A filename with an underscored channel decodes back to its parts.
#[test]
fn filename_with_underscored_channel_survives_codec() {
    let name = encode(SCENE, "cam_front_left", 1_698_000_000_123_456, "jpg");
    let frame = decode(&name).expect("decode should succeed");
    assert_eq!(frame.scene_name, SCENE);
    assert_eq!(frame.channel, "cam_front_left");
    assert_eq!(frame.timestamp, 1_698_000_000_123_456);
    assert_eq!(frame.extension, "jpg");
}

// ---------------------------------------------------------------------------
// Test: chains
// ---------------------------------------------------------------------------

/// Interleaved groups each form one chain with a single head and tail.
#[test]
fn interleaved_groups_form_isolated_chains() {
    let items = (0..30).map(|i| (["a", "b", "c"][i % 3], i as i64 * 10));
    let chains = build_grouped_chains(items);
    assert_eq!(chains.len(), 3);
    for (group, chain) in &chains {
        assert_eq!(chain.len(), 10, "group {group}");
        assert_eq!(chain.iter().filter(|l| l.is_head()).count(), 1);
        assert_eq!(chain.iter().filter(|l| l.is_tail()).count(), 1);
        let members: BTreeSet<i64> = chain.iter().map(|l| l.key).collect();
        for link in chain {
            assert!(link.prev.map_or(true, |p| members.contains(&p)));
            assert!(link.next.map_or(true, |n| members.contains(&n)));
        }
    }
}

// ---------------------------------------------------------------------------
// Test: instances and annotations
// ---------------------------------------------------------------------------

/// Every instance counts exactly the annotations that point at it, and
/// annotation chains never cross tracks.
#[test]
fn instance_counts_match_annotations() {
    let mut candidates = Vec::new();
    for ts in [100, 200, 300, 400] {
        candidates.push(candidate("obj-1", ts, 0));
        if ts != 200 {
            candidates.push(candidate("obj-2", ts, 1));
        }
    }
    candidates.push(candidate("obj-3", 300, 2));

    let tables = build_annotation_tables(&candidates).expect("tables should build");
    assert_eq!(tables.instance.len(), 3);
    assert_eq!(tables.sample_annotation.len(), candidates.len());

    let mut per_instance: BTreeMap<&str, usize> = BTreeMap::new();
    for annotation in &tables.sample_annotation {
        *per_instance.entry(annotation.instance_token.as_str()).or_default() += 1;
    }
    for instance in &tables.instance {
        assert_eq!(per_instance[instance.token.as_str()], instance.nbr_annotations);
    }

    let by_token: BTreeMap<&str, &str> = tables
        .sample_annotation
        .iter()
        .map(|a| (a.token.as_str(), a.instance_token.as_str()))
        .collect();
    for annotation in &tables.sample_annotation {
        for neighbour in [&annotation.prev, &annotation.next] {
            if !neighbour.is_empty() {
                assert_eq!(by_token[neighbour.as_str()], annotation.instance_token);
            }
        }
    }

    let obj2_head = tables
        .sample_annotation
        .iter()
        .find(|a| a.token == sample_annotation_token(SCENE, Some(300), Some(1)))
        .expect("obj-2 at 300");
    assert_eq!(obj2_head.prev, sample_annotation_token(SCENE, Some(100), Some(1)));
}

// ---------------------------------------------------------------------------
// Test: merge
// ---------------------------------------------------------------------------

/// Merging a table with itself equals merging it once.
#[test]
fn merge_is_idempotent() {
    let table = vec![
        json!({"token": "a", "name": "first"}),
        json!({"token": "b", "name": "second"}),
    ];
    let once = merge("scene", vec![table.clone()]).expect("merge should succeed");
    let twice = merge("scene", vec![table.clone(), table]).expect("merge should succeed");
    assert_eq!(once, twice);
}

/// Map records sharing a token keep one record with the union of logs.
#[test]
fn map_log_tokens_are_unioned() {
    let existing = vec![json!({"token": "T", "category": "default", "log_tokens": ["b", "c"]})];
    let incoming = vec![json!({"token": "T", "category": "default", "log_tokens": ["a", "b"]})];
    let merged = merge("map", vec![existing, incoming]).expect("merge should succeed");

    assert_eq!(merged.len(), 1);
    let logs: BTreeSet<&str> = merged[0]["log_tokens"]
        .as_array()
        .expect("log_tokens array")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(logs, BTreeSet::from(["a", "b", "c"]));
}

/// Other tables take the last writer's record.
#[test]
fn non_map_tables_keep_last_writer() {
    let merged = merge(
        "log",
        vec![
            vec![json!({"token": "L", "location": "old"})],
            vec![json!({"token": "L", "location": "new"})],
        ],
    )
    .expect("merge should succeed");
    assert_eq!(merged, vec![json!({"token": "L", "location": "new"})]);
}
