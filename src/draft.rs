//! The in-memory appointment draft.
//!
//! A draft is built fresh for every preparation request, lives only in the
//! calling session, may be edited in place while the user disambiguates,
//! and is discarded once a commit attempt returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::extract::RawExtraction;
use crate::intent::Intent;
use crate::matching::{MatchStatus, ParticipantMatch};

// User-facing warnings, shown inline in the product UI.
pub const WARN_NO_PARTICIPANTS: &str = "aucun participant détecté";
pub const WARN_NO_TIME: &str = "aucune date ou heure détectée";
pub const WARN_EXTRACTION_UNAVAILABLE: &str =
    "service d'extraction indisponible, brouillon construit sans analyse";
pub const WARN_DUPLICATE_PARTICIPANT: &str = "mentions de participant en double regroupées";
pub const WARN_DEADLINE_EXCEEDED: &str = "délai de préparation dépassé, brouillon partiel";
pub const WARN_DIRECTORY_UNAVAILABLE: &str = "annuaire indisponible, participants non vérifiés";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub participants: Vec<ParticipantMatch>,
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
    pub description: String,
    pub location: Option<String>,
    pub intent: Intent,
    pub warnings: Vec<String>,
    pub raw_extraction: RawExtraction,
}

impl EventDraft {
    /// Degraded-but-valid draft used when extraction is unavailable or the
    /// request deadline fires: the dictation is preserved as description.
    pub fn degraded(dictation: &str, warning: &str) -> Self {
        Self {
            participants: Vec::new(),
            start: None,
            stop: None,
            description: dictation.trim().to_string(),
            location: None,
            intent: crate::intent::classify(dictation),
            warnings: vec![warning.to_string()],
            raw_extraction: RawExtraction::default(),
        }
    }

    /// Ids of participants resolved so far, in mention order.
    pub fn resolved_ids(&self) -> Vec<String> {
        self.participants.iter().filter_map(|p| p.resolved_id.clone()).collect()
    }

    /// Mentions still needing a user decision before commit.
    pub fn ambiguous_names(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.status == MatchStatus::Ambiguous)
            .map(|p| p.input_name.as_str())
            .collect()
    }

    pub fn has_time(&self) -> bool {
        self.start.is_some()
    }

    /// One-screen summary for the terminal and confirmation responses.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        let action = match self.intent {
            Intent::Create => "Création",
            Intent::Update => "Modification",
            Intent::Cancel => "Annulation",
        };
        lines.push(format!("{} de rendez-vous", action));

        match (self.start, self.stop) {
            (Some(start), Some(stop)) => lines.push(format!(
                "  le {} de {} à {}",
                start.format("%d/%m/%Y"),
                start.format("%H:%M"),
                stop.format("%H:%M")
            )),
            (Some(start), None) => {
                lines.push(format!("  le {}", start.format("%d/%m/%Y à %H:%M")))
            }
            _ => lines.push("  date à préciser".to_string()),
        }

        for p in &self.participants {
            let line = match p.status {
                MatchStatus::Matched => format!(
                    "  avec {} (fiche {})",
                    p.resolved_name.as_deref().unwrap_or(&p.input_name),
                    p.resolved_id.as_deref().unwrap_or("?")
                ),
                MatchStatus::Ambiguous => format!(
                    "  avec {} — {} fiches possibles, à préciser",
                    p.input_name,
                    p.candidates.len()
                ),
                MatchStatus::Unmatched => {
                    format!("  avec {} — inconnu, fiche à créer", p.input_name)
                }
            };
            lines.push(line);
        }

        if let Some(location) = &self.location {
            lines.push(format!("  lieu: {}", location));
        }
        if !self.description.is_empty() {
            lines.push(format!("  motif: {}", self.description));
        }
        for warning in &self.warnings {
            lines.push(format!("  ⚠ {}", warning));
        }

        lines.join("\n")
    }
}
