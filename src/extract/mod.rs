//! Extractor payload handling.
//!
//! The upstream extraction service answers with whatever its language model
//! produced: sometimes well-formed JSON, sometimes "- key: value" text
//! blocks, sometimes garbage. Both shapes funnel through one conversion
//! point into [`RawExtraction`]; nothing downstream touches the payload
//! directly.

pub mod freeform;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::canonicalize;

/// What the extraction service actually returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExtractorPayload {
    Structured { data: Value },
    Freeform { text: String },
}

impl ExtractorPayload {
    /// Sniff a raw response body: parseable JSON is structured, anything
    /// else is freeform text.
    pub fn from_response_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(data) => ExtractorPayload::Structured { data },
            Err(_) => ExtractorPayload::Freeform { text: body.to_string() },
        }
    }
}

/// Field-level extractor output, still untyped text fragments. The draft
/// builder owns turning these into timestamps and participant matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExtraction {
    pub participants: Vec<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub stop: Option<String>,
    pub duration: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl RawExtraction {
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
            && self.date.is_none()
            && self.time.is_none()
            && self.stop.is_none()
            && self.duration.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }

    /// Single conversion point from the tagged payload.
    pub fn from_payload(payload: &ExtractorPayload) -> Self {
        match payload {
            ExtractorPayload::Structured { data } => match data {
                Value::Object(map) => from_object(map),
                // Some models wrap their text answer in a JSON string.
                Value::String(text) => freeform::parse(text),
                other => {
                    debug!("extractor returned unusable JSON shape: {}", other);
                    RawExtraction::default()
                }
            },
            ExtractorPayload::Freeform { text } => freeform::parse(text),
        }
    }
}

const PARTICIPANT_KEYS: [&str; 13] = [
    "participants",
    "participant",
    "contacts",
    "contact",
    "personnes",
    "personne",
    "patients",
    "patient",
    "avec",
    "with",
    "attendees",
    "attendee",
    "invites",
];
const DATE_KEYS: [&str; 3] = ["date", "jour", "day"];
const TIME_KEYS: [&str; 5] = ["heure", "time", "debut", "start", "depart"];
const STOP_KEYS: [&str; 4] = ["fin", "end", "stop", "jusqu'a"];
const DURATION_KEYS: [&str; 3] = ["duree", "duration", "pour"];
const DESCRIPTION_KEYS: [&str; 8] =
    ["description", "motif", "objet", "sujet", "notes", "subject", "titre", "title"];
const LOCATION_KEYS: [&str; 6] = ["lieu", "adresse", "location", "address", "place", "endroit"];

fn from_object(map: &serde_json::Map<String, Value>) -> RawExtraction {
    let mut out = RawExtraction::default();

    for (key, value) in map {
        let key = canonicalize(key);
        if PARTICIPANT_KEYS.contains(&key.as_str()) {
            out.participants.extend(names_from_value(value));
        } else if DATE_KEYS.contains(&key.as_str()) {
            out.date = scalar(value);
        } else if TIME_KEYS.contains(&key.as_str()) {
            out.time = scalar(value);
        } else if STOP_KEYS.contains(&key.as_str()) {
            out.stop = scalar(value);
        } else if DURATION_KEYS.contains(&key.as_str()) {
            out.duration = scalar(value);
        } else if DESCRIPTION_KEYS.contains(&key.as_str()) {
            out.description = scalar(value);
        } else if LOCATION_KEYS.contains(&key.as_str()) {
            out.location = scalar(value);
        } else {
            debug!("ignoring unknown extractor field '{}'", key);
        }
    }

    out
}

/// Accept a string, a number, or nothing. Other shapes are dropped rather
/// than propagated.
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn names_from_value(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => split_names(s),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(s) => split_names(s),
                // Objects like {"name": "...", "id": ...} keep their name.
                Value::Object(obj) => obj
                    .get("name")
                    .or_else(|| obj.get("nom"))
                    .and_then(|v| scalar(v))
                    .map(|n| vec![n])
                    .unwrap_or_default(),
                _ => Vec::new(),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Split a dictated name list on commas, semicolons and spoken connectors.
pub fn split_names(input: &str) -> Vec<String> {
    input
        .replace(" et ", ",")
        .replace(" and ", ",")
        .split([',', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
