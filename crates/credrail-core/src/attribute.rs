//! # Proof Attribute Normalization
//!
//! Flattens the credential platform's proof-detail payload into a single
//! deterministic name → value map.
//!
//! The platform returns an ordered sequence of "credential bags": one flat
//! JSON object per presented credential, mixing real attribute entries with
//! the metadata keys `schemaId` and `credDefId`. Attribute values arrive in
//! two shapes — a bare string, or a `{"raw": "..."}` wrapper — depending on
//! which platform code path produced the response.
//!
//! ## Algorithm
//!
//! 1. Drop the metadata keys from each bag.
//! 2. Decode every remaining entry through [`AttributeValue`]: bare strings
//!    are taken as-is, `raw`-wrapped strings are unwrapped, anything else is
//!    an unknown shape and is dropped.
//! 3. Merge across bags, last bag wins on name collisions.
//!
//! Last-bag-wins mirrors the platform's observed behavior. It is safe for
//! the enrollment flows because each phase restricts every attribute to a
//! single credential definition, so a name can only collide with itself.
//! Do not rely on it for attributes that may legitimately appear in two
//! credentials with different values.
//!
//! This module is pure: no I/O, no clock, no logging. Given the same input
//! order it always produces the same map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::identity::Nin;

/// Metadata keys the platform mixes into each credential bag.
pub const ATTRIBUTE_METADATA_KEYS: [&str; 2] = ["schemaId", "credDefId"];

/// One decoded proof-detail entry.
///
/// Untagged: deserialization tries each shape in order, so a bare string
/// becomes [`AttributeValue::Text`], a `{"raw": "..."}` object becomes
/// [`AttributeValue::RawWrapped`], and every other shape — numbers, nested
/// objects, a `raw` field holding a non-string — falls through to
/// [`AttributeValue::Unknown`] and is discarded by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A bare string value.
    Text(String),
    /// A `{"raw": value}` wrapper around the string value.
    RawWrapped {
        /// The wrapped attribute value.
        raw: String,
    },
    /// Any shape the platform is not documented to produce.
    Unknown(Value),
}

impl AttributeValue {
    /// The usable string value, if this entry decoded to a known shape.
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::RawWrapped { raw } => Some(raw),
            Self::Unknown(_) => None,
        }
    }
}

/// Flatten a proof-detail payload into a name → value map.
///
/// Accepts either an array of credential bags or a single bag object (the
/// latter makes the function idempotent on its own output). Any other
/// top-level shape, and any non-object element inside the array, yields no
/// entries rather than an error — unknown upstream shapes are dropped, not
/// merged and not fatal.
pub fn normalize(raw_detail: &Value) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    match raw_detail {
        Value::Array(bags) => {
            for bag in bags {
                if let Value::Object(entries) = bag {
                    merge_bag(&mut attributes, entries);
                }
            }
        }
        Value::Object(entries) => merge_bag(&mut attributes, entries),
        _ => {}
    }
    attributes
}

/// Merge one credential bag into the accumulated map (later entries win).
fn merge_bag(attributes: &mut BTreeMap<String, String>, entries: &serde_json::Map<String, Value>) {
    for (name, value) in entries {
        if ATTRIBUTE_METADATA_KEYS.contains(&name.as_str()) {
            continue;
        }
        let decoded: AttributeValue = match serde_json::from_value(value.clone()) {
            Ok(decoded) => decoded,
            Err(_) => continue,
        };
        if let Some(text) = decoded.into_text() {
            attributes.insert(name.clone(), text);
        }
    }
}

/// Required attributes absent from a normalized proof.
///
/// Lists every offending attribute so the holder can fix all of them in one
/// re-presentation rather than discovering them one at a time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("missing required attributes: {}", missing.join(", "))]
pub struct MissingAttributeError {
    /// The attribute names that were absent, empty, or placeholder-valued.
    pub missing: Vec<String>,
}

/// Validate that every required attribute carries a usable value.
///
/// An attribute counts as missing when it is absent from the map, empty
/// after trimming, one of the literal junk strings `"null"`/`"undefined"`
/// that loosely-typed upstream layers leak, or the known national-id
/// placeholder (all zeros).
pub fn validate_required(
    attributes: &BTreeMap<String, String>,
    required: &[&str],
) -> Result<(), MissingAttributeError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| {
            attributes
                .get(**name)
                .map(|value| !is_usable(value))
                .unwrap_or(true)
        })
        .map(|name| (*name).to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingAttributeError { missing })
    }
}

fn is_usable(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty()
        && !trimmed.eq_ignore_ascii_case("null")
        && !trimmed.eq_ignore_ascii_case("undefined")
        && !Nin::is_placeholder(trimmed)
}
