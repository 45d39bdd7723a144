//! Operation intent derived from dictated text, and target-event location
//! for update/cancel operations.

use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::services::CalendarService;
use crate::utils::canonicalize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Create,
    Update,
    Cancel,
}

// Stem-based so conjugations ("annule", "annuler", "annulation") all hit.
static RE_CANCEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(annul\w*|cancel\w*|supprim\w*)").unwrap());
static RE_UPDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(deplac\w*|report\w*|chang\w*|modif\w*|decal\w*|resched\w*|postpone\w*|move\b)")
        .unwrap()
});

/// Rule-based intent classification; cancellation outranks modification,
/// everything else is a creation.
pub fn classify(text: &str) -> Intent {
    let text = canonicalize(text);
    if RE_CANCEL.is_match(&text) {
        Intent::Cancel
    } else if RE_UPDATE.is_match(&text) {
        Intent::Update
    } else {
        Intent::Create
    }
}

/// Lookup key used when an update/cancel arrives without an event id:
/// the appointment's original start plus its participant set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMatchQuery {
    pub original_start: DateTime<Utc>,
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

/// Resolve the target of an update/cancel to exactly one event id.
///
/// A supplied id wins outright. Otherwise the external lookup runs once;
/// zero or several matches are both fatal `EventNotFound` — this layer
/// never guesses between candidate events.
pub async fn locate_event(
    calendar: &dyn CalendarService,
    event_id: Option<&str>,
    query: Option<&EventMatchQuery>,
) -> Result<String, EngineError> {
    if let Some(id) = event_id {
        if !id.trim().is_empty() {
            return Ok(id.to_string());
        }
    }

    let Some(query) = query else {
        return Err(EngineError::EventNotFound);
    };

    let matches = calendar.find_events(query).await?;
    match matches.as_slice() {
        [single] => Ok(single.clone()),
        [] => {
            debug!("no event matches start {} with {} participants", query.original_start, query.participant_ids.len());
            Err(EngineError::EventNotFound)
        }
        several => {
            debug!("{} events match the query; refusing to guess", several.len());
            Err(EngineError::EventNotFound)
        }
    }
}
