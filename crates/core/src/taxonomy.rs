//! Fixed category, attribute and visibility tables, plus the mapping from
//! SUS annotation object types onto them.

use crate::config::ValidationMode;
use crate::error::CoreError;
use crate::records::{AttributeRecord, CategoryRecord, VisibilityRecord};
use crate::token::{attribute_token, category_token};

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// `(name, description)` of every category.
pub const CATEGORIES: [(&str, &str); 23] = [
    ("human.pedestrian.adult", "Adult subcategory."),
    ("human.pedestrian.child", "Child subcategory."),
    (
        "human.pedestrian.wheelchair",
        "Wheelchairs. If a person is in the wheelchair, include in the annotation.",
    ),
    (
        "human.pedestrian.stroller",
        "Strollers. If a person is in the stroller, include in the annotation.",
    ),
    (
        "human.pedestrian.personal_mobility",
        "A small electric or self-propelled vehicle, e.g. skateboard, segway, or scooters, on which the person typically travels in a upright position. Driver and (if applicable) rider should be included in the bounding box along with the vehicle.",
    ),
    ("human.pedestrian.police_officer", "Police officer."),
    ("human.pedestrian.construction_worker", "Construction worker"),
    ("animal", "All animals, e.g. cats, rats, dogs, deer, birds."),
    (
        "vehicle.car",
        "Vehicle designed primarily for personal use, e.g. sedans, hatch-backs, wagons, vans, mini-vans, SUVs and jeeps. If the vehicle is designed to carry more than 10 people use vehicle.bus. If it is primarily designed to haul cargo use vehicle.truck. ",
    ),
    (
        "vehicle.motorcycle",
        "Gasoline or electric powered 2-wheeled vehicle designed to move rapidly (at the speed of standard cars) on the road surface. This category includes all motorcycles, vespas and scooters.",
    ),
    (
        "vehicle.bicycle",
        "Human or electric powered 2-wheeled vehicle designed to travel at lower speeds either on road surface, sidewalks or bike paths.",
    ),
    (
        "vehicle.bus.bendy",
        "Bendy bus subcategory. Annotate each section of the bendy bus individually.",
    ),
    ("vehicle.bus.rigid", "Rigid bus subcategory."),
    (
        "vehicle.truck",
        "Vehicles primarily designed to haul cargo including pick-ups, lorrys, trucks and semi-tractors. Trailers hauled after a semi-tractor should be labeled as vehicle.trailer",
    ),
    (
        "vehicle.construction",
        "Vehicles primarily designed for construction. Typically very slow moving or stationary. Cranes and extremities of construction vehicles are only included in annotations if they interfere with traffic. Trucks used to haul rocks or building materials are considered vehicle.truck rather than construction vehicles.",
    ),
    ("vehicle.emergency.ambulance", "All types of ambulances."),
    (
        "vehicle.emergency.police",
        "All types of police vehicles including police bicycles and motorcycles.",
    ),
    (
        "vehicle.trailer",
        "Any vehicle trailer, both for trucks, cars and bikes.",
    ),
    (
        "movable_object.barrier",
        "Temporary road barrier placed in the scene in order to redirect traffic. Commonly used at construction sites. This includes concrete barrier, metal barrier and water barrier. No fences.",
    ),
    ("movable_object.trafficcone", "All types of traffic cone."),
    (
        "movable_object.pushable_pullable",
        "Objects that a pedestrian may push or pull. For example dolleys, wheel barrows, garbage-bins, or shopping carts.",
    ),
    (
        "movable_object.debris",
        "Movable object that is left on the driveable surface that is too large to be driven over safely, e.g tree branch, full trash bag etc.",
    ),
    (
        "static_object.bicycle_rack",
        "Area or device intended to park or secure the bicycles in a row. It includes all the bikes parked in it and any empty slots that are intended for parking bikes.",
    ),
];

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

pub const ATTRIBUTES: [(&str, &str); 8] = [
    ("vehicle.moving", "Vehicle is moving."),
    (
        "vehicle.stopped",
        "Vehicle, with a driver/rider in/on it, is currently stationary but has an intent to move.",
    ),
    (
        "vehicle.parked",
        "Vehicle is stationary (usually for longer duration) with no immediate intent to move.",
    ),
    (
        "cycle.with_rider",
        "There is a rider on the bicycle or motorcycle.",
    ),
    (
        "cycle.without_rider",
        "There is no rider on the bicycle or motorcycle.",
    ),
    (
        "pedestrian.sitting_lying_down",
        "The human is sitting or lying down.",
    ),
    ("pedestrian.standing", "The human is standing."),
    ("pedestrian.moving", "The human is moving."),
];

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// `(token, level, description)` of every visibility bucket.
pub const VISIBILITIES: [(u8, &str, &str); 4] = [
    (1, "v0-40", "visibility of whole object is between 0 and 40%"),
    (2, "v40-60", "visibility of whole object is between 40 and 60%"),
    (3, "v60-80", "visibility of whole object is between 60 and 80%"),
    (4, "v80-100", "visibility of whole object is between 80 and 100%"),
];

/// Visibility assigned to imported labels and substituted in lenient mode.
pub const DEFAULT_VISIBILITY: &str = "v80-100";

pub fn is_category(name: &str) -> bool {
    CATEGORIES.iter().any(|(n, _)| *n == name)
}

pub fn is_attribute(name: &str) -> bool {
    ATTRIBUTES.iter().any(|(n, _)| *n == name)
}

pub fn is_visibility(level: &str) -> bool {
    VISIBILITIES.iter().any(|(_, l, _)| *l == level)
}

// ---------------------------------------------------------------------------
// Static tables
// ---------------------------------------------------------------------------

pub fn category_table() -> Vec<CategoryRecord> {
    CATEGORIES
        .iter()
        .map(|(name, description)| CategoryRecord {
            token: category_token(name),
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn attribute_table() -> Vec<AttributeRecord> {
    ATTRIBUTES
        .iter()
        .map(|(name, description)| AttributeRecord {
            token: attribute_token(Some(name)),
            name: name.to_string(),
            description: description.to_string(),
        })
        .collect()
}

pub fn visibility_table() -> Vec<VisibilityRecord> {
    VISIBILITIES
        .iter()
        .map(|(token, level, description)| VisibilityRecord {
            token: *token,
            level: level.to_string(),
            description: description.to_string(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// SUS object type mapping
// ---------------------------------------------------------------------------

/// Category for a SUS `obj_type` (case-insensitive).
///
/// `None` for types that have no counterpart or are deliberately not
/// imported (cycles without a rider, furniture).
pub fn category_for_obj_type(obj_type: &str) -> Option<&'static str> {
    match obj_type.to_ascii_lowercase().as_str() {
        "car" => Some("vehicle.car"),
        "van" | "pickup" | "cargo" | "truck" | "trailer" | "construction_vehicle" => {
            Some("vehicle.truck")
        }
        "micro_bus" | "mini_bus" | "bus" => Some("vehicle.bus.rigid"),
        "rider" => Some("vehicle.bicycle"),
        "pedestrian" => Some("human.pedestrian.adult"),
        "animal" => Some("animal"),
        "barrier" => Some("movable_object.barrier"),
        "traffic_cone" | "stone" => Some("movable_object.trafficcone"),
        _ => None,
    }
}

/// Attributes assigned to an imported object of `category` by default.
pub fn default_attributes(category: &str) -> &'static [&'static str] {
    match category {
        "vehicle.car" | "vehicle.truck" | "vehicle.bus.rigid" => &["vehicle.moving"],
        "vehicle.trailer" | "vehicle.construction" | "vehicle.bicycle" | "vehicle.motorcycle" => {
            &["vehicle.parked"]
        }
        "human.pedestrian.adult" => &["pedestrian.standing"],
        _ => &[],
    }
}

/// Full attribute name for a short SUS attribute label (`parked`, `standing`).
pub fn extended_attribute(short: &str) -> Option<&'static str> {
    match short {
        "stopped" => Some("vehicle.stopped"),
        "parked" => Some("vehicle.parked"),
        "with_rider" => Some("cycle.with_rider"),
        "without_rider" => Some("cycle.without_rider"),
        "sitting_lying_down" => Some("pedestrian.sitting_lying_down"),
        "standing" => Some("pedestrian.standing"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Check a category name against the table.
///
/// Strict: unknown names are an error. Lenient: `Ok(None)`, the caller drops
/// the object.
pub fn resolve_category(name: &str, mode: ValidationMode) -> Result<Option<String>, CoreError> {
    if is_category(name) {
        return Ok(Some(name.to_string()));
    }
    match mode {
        ValidationMode::Strict => Err(CoreError::UnknownTaxonomy {
            kind: "category",
            value: name.to_string(),
        }),
        ValidationMode::Lenient => {
            tracing::warn!(category = %name, "Unknown category, dropping object");
            Ok(None)
        }
    }
}

/// Check attribute names; lenient mode removes unknown ones.
pub fn resolve_attributes(names: &[String], mode: ValidationMode) -> Result<Vec<String>, CoreError> {
    let mut resolved = Vec::with_capacity(names.len());
    for name in names {
        if is_attribute(name) {
            resolved.push(name.clone());
            continue;
        }
        match mode {
            ValidationMode::Strict => {
                return Err(CoreError::UnknownTaxonomy {
                    kind: "attribute",
                    value: name.clone(),
                })
            }
            ValidationMode::Lenient => {
                tracing::warn!(attribute = %name, "Unknown attribute, removing");
            }
        }
    }
    Ok(resolved)
}

/// Check a visibility level; lenient mode substitutes [`DEFAULT_VISIBILITY`].
pub fn resolve_visibility(level: &str, mode: ValidationMode) -> Result<String, CoreError> {
    if is_visibility(level) {
        return Ok(level.to_string());
    }
    match mode {
        ValidationMode::Strict => Err(CoreError::UnknownTaxonomy {
            kind: "visibility",
            value: level.to_string(),
        }),
        ValidationMode::Lenient => {
            tracing::warn!(visibility = %level, "Unknown visibility, using default");
            Ok(DEFAULT_VISIBILITY.to_string())
        }
    }
}
