//! Event draft construction.
//!
//! Orchestrates the external extractor, the temporal normalizer and the
//! fuzzy name matcher into a warning-annotated [`EventDraft`]. Extractor
//! output is treated as untrusted, partial data throughout; any hole
//! degrades into a warning instead of an error.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::collections::HashSet;

use crate::config::Config;
use crate::contacts::DirectoryIndex;
use crate::draft::{
    EventDraft, WARN_DUPLICATE_PARTICIPANT, WARN_EXTRACTION_UNAVAILABLE, WARN_NO_PARTICIPANTS,
    WARN_NO_TIME,
};
use crate::extract::{ExtractorPayload, RawExtraction};
use crate::intent;
use crate::matching::resolve_participant;
use crate::services::ExtractionService;
use crate::temporal::{normalize_with, Locale};
use crate::utils::{canonicalize, sanitize_dictation};

pub struct DraftBuilder<'a> {
    extractor: &'a dyn ExtractionService,
    config: &'a Config,
}

impl<'a> DraftBuilder<'a> {
    pub fn new(extractor: &'a dyn ExtractionService, config: &'a Config) -> Self {
        Self { extractor, config }
    }

    /// Phase one: ask the extractor. `None` means unavailable or unusable —
    /// never an error, the assembly phase degrades instead.
    pub async fn fetch_payload(&self, raw_text: &str) -> Option<ExtractorPayload> {
        match self.extractor.extract(raw_text).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("extraction unavailable, building degraded draft: {}", e);
                None
            }
        }
    }

    /// Phase two: assemble the draft from whatever the extractor produced
    /// and the request-scoped directory snapshot. Synchronous and
    /// deterministic given its inputs.
    pub fn assemble(
        &self,
        raw_text: &str,
        payload: Option<ExtractorPayload>,
        directory: &DirectoryIndex,
        reference_now: DateTime<Utc>,
    ) -> EventDraft {
        let dictation = sanitize_dictation(raw_text);

        let Some(payload) = payload else {
            return EventDraft::degraded(&dictation, WARN_EXTRACTION_UNAVAILABLE);
        };

        let raw = RawExtraction::from_payload(&payload);
        let mut warnings = Vec::new();

        let participants = self.resolve_participants(&raw, directory, &mut warnings);
        if participants.is_empty() {
            warnings.push(WARN_NO_PARTICIPANTS.to_string());
        }

        let (start, stop, temporal_warnings) = self.resolve_window(&raw, &dictation, reference_now);
        warnings.extend(temporal_warnings);
        if start.is_none() {
            warnings.push(WARN_NO_TIME.to_string());
        }

        EventDraft {
            participants,
            start,
            stop,
            description: raw
                .description
                .clone()
                .unwrap_or_else(|| dictation.clone()),
            location: raw.location.clone(),
            intent: intent::classify(&dictation),
            warnings,
            raw_extraction: raw,
        }
    }

    /// Both phases in sequence.
    pub async fn build(
        &self,
        raw_text: &str,
        directory: &DirectoryIndex,
        reference_now: DateTime<Utc>,
    ) -> EventDraft {
        let payload = self.fetch_payload(raw_text).await;
        self.assemble(raw_text, payload, directory, reference_now)
    }

    fn resolve_participants(
        &self,
        raw: &RawExtraction,
        directory: &DirectoryIndex,
        warnings: &mut Vec<String>,
    ) -> Vec<crate::matching::ParticipantMatch> {
        let mut seen_mentions = HashSet::new();
        let mut seen_ids = HashSet::new();
        let mut collapsed = false;
        let mut participants = Vec::new();

        for mention in &raw.participants {
            // Same name dictated twice collapses to one mention.
            if !seen_mentions.insert(canonicalize(mention)) {
                collapsed = true;
                continue;
            }

            let resolved = resolve_participant(mention, directory, &self.config.matching);

            // Two different mentions landing on the same directory entry
            // also collapse; one contact attends once.
            if let Some(id) = &resolved.resolved_id {
                if !seen_ids.insert(id.clone()) {
                    debug!("mention '{}' resolves to already-present contact {}", mention, id);
                    collapsed = true;
                    continue;
                }
            }

            participants.push(resolved);
        }

        if collapsed {
            warnings.push(WARN_DUPLICATE_PARTICIPANT.to_string());
        }

        participants
    }

    /// Normalize the extracted fragments into a start/stop window. An
    /// explicit end always wins over a duration-derived one.
    fn resolve_window(
        &self,
        raw: &RawExtraction,
        dictation: &str,
        reference_now: DateTime<Utc>,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Vec<String>) {
        let locale = Locale::from_tag(&self.config.temporal.locale);
        let default_minutes = self.config.temporal.default_duration_minutes;

        // When the extractor produced no usable fragments, run the
        // normalizer over the whole dictation instead.
        let fragment = [raw.date.as_deref(), raw.time.as_deref(), raw.duration.as_deref()]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let fragment = if fragment.trim().is_empty() { dictation.to_string() } else { fragment };

        let resolution = normalize_with(&fragment, reference_now, locale, default_minutes);
        let mut warnings = resolution.warnings.clone();

        let Some(start) = resolution.start else {
            return (None, None, warnings);
        };

        let stop = match raw.stop.as_deref() {
            Some(stop_fragment) => {
                // Re-anchor the dictated end on the same date as the start.
                let fragment =
                    format!("{} {}", raw.date.as_deref().unwrap_or_default(), stop_fragment);
                let end = normalize_with(&fragment, reference_now, locale, default_minutes);
                match end.start {
                    Some(mut explicit_stop) => {
                        if explicit_stop <= start {
                            explicit_stop += Duration::days(1);
                        }
                        explicit_stop
                    }
                    None => {
                        warnings.push(format!("heure de fin illisible: \"{}\"", stop_fragment));
                        match resolution.stop {
                            Some(stop) => stop,
                            None => start + Duration::minutes(default_minutes),
                        }
                    }
                }
            }
            None => match resolution.stop {
                Some(stop) => stop,
                None => start + Duration::minutes(default_minutes),
            },
        };

        (Some(start), Some(stop), warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::ContactRecord;
    use crate::error::ServiceError;
    use crate::intent::Intent;
    use crate::matching::MatchStatus;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct FakeExtractor {
        response: Result<ExtractorPayload, ()>,
    }

    impl FakeExtractor {
        fn structured(data: serde_json::Value) -> Self {
            Self { response: Ok(ExtractorPayload::Structured { data }) }
        }

        fn freeform(text: &str) -> Self {
            Self { response: Ok(ExtractorPayload::Freeform { text: text.to_string() }) }
        }

        fn down() -> Self {
            Self { response: Err(()) }
        }
    }

    #[async_trait]
    impl ExtractionService for FakeExtractor {
        async fn extract(&self, _text: &str) -> Result<ExtractorPayload, ServiceError> {
            self.response
                .clone()
                .map_err(|_| ServiceError::Transport("extractor down".to_string()))
        }
    }

    fn directory() -> DirectoryIndex {
        DirectoryIndex::new(vec![
            ContactRecord {
                id: "1".to_string(),
                name: "Jean Dupont".to_string(),
                email: None,
                phone: None,
            },
            ContactRecord {
                id: "2".to_string(),
                name: "Marie Martin".to_string(),
                email: None,
                phone: None,
            },
        ])
    }

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 0, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[tokio::test]
    async fn test_structured_extraction_builds_full_draft() {
        let extractor = FakeExtractor::structured(json!({
            "participants": "Jean Dupont",
            "date": "demain",
            "heure": "14h",
            "duree": "30 minutes",
            "motif": "visite de contrôle"
        }));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder
            .build("rendez-vous avec Jean Dupont demain à 14h", &directory(), reference())
            .await;

        assert_eq!(draft.intent, Intent::Create);
        assert_eq!(draft.start, Some(utc(2025, 1, 11, 14, 0)));
        assert_eq!(draft.stop, Some(utc(2025, 1, 11, 14, 30)));
        assert_eq!(draft.participants.len(), 1);
        assert_eq!(draft.participants[0].status, MatchStatus::Matched);
        assert_eq!(draft.participants[0].resolved_id.as_deref(), Some("1"));
        assert_eq!(draft.description, "visite de contrôle");
        assert!(draft.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_extractor_down_degrades_with_warning() {
        let extractor = FakeExtractor::down();
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder.build("annule la visite de Jean", &directory(), reference()).await;

        assert_eq!(draft.warnings, vec![WARN_EXTRACTION_UNAVAILABLE.to_string()]);
        assert_eq!(draft.description, "annule la visite de Jean");
        assert_eq!(draft.intent, Intent::Cancel);
        assert!(draft.participants.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_mentions_collapse() {
        let extractor = FakeExtractor::structured(json!({
            "participants": ["Jean Dupont", "jean DUPONT", "Jean Dupond"],
            "date": "demain", "heure": "10h"
        }));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder.build("visite", &directory(), reference()).await;

        // "jean DUPONT" collapses as a repeated mention, "Jean Dupond"
        // resolves to the same directory entry and collapses too.
        assert_eq!(draft.participants.len(), 1);
        assert_eq!(draft.participants[0].resolved_id.as_deref(), Some("1"));
        assert!(draft.warnings.contains(&WARN_DUPLICATE_PARTICIPANT.to_string()));
    }

    #[tokio::test]
    async fn test_missing_participants_and_time_warn() {
        let extractor = FakeExtractor::structured(json!({ "motif": "visite" }));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder.build("on verra", &directory(), reference()).await;

        assert!(draft.warnings.contains(&WARN_NO_PARTICIPANTS.to_string()));
        assert!(draft.warnings.contains(&WARN_NO_TIME.to_string()));
        assert!(draft.start.is_none());
        assert!(draft.stop.is_none());
    }

    #[tokio::test]
    async fn test_explicit_stop_wins_over_duration() {
        let extractor = FakeExtractor::structured(json!({
            "participants": "Marie Martin",
            "date": "demain",
            "heure": "14h",
            "fin": "15h30",
            "duree": "30 minutes"
        }));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder.build("visite", &directory(), reference()).await;

        assert_eq!(draft.start, Some(utc(2025, 1, 11, 14, 0)));
        assert_eq!(draft.stop, Some(utc(2025, 1, 11, 15, 30)));
    }

    #[tokio::test]
    async fn test_freeform_payload_path() {
        let extractor = FakeExtractor::freeform(
            "- participants: Marie Martin\n- date: 12/03/2025\n- heure: 9h30",
        );
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft = builder.build("visite de Marie", &directory(), reference()).await;

        assert_eq!(draft.participants[0].resolved_id.as_deref(), Some("2"));
        assert_eq!(draft.start, Some(utc(2025, 3, 12, 9, 30)));
    }

    #[tokio::test]
    async fn test_empty_payload_falls_back_to_dictation() {
        let extractor = FakeExtractor::structured(json!({}));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let draft =
            builder.build("rendez-vous demain à 14h pour 30 minutes", &directory(), reference()).await;

        // The normalizer ran over the dictation itself.
        assert_eq!(draft.start, Some(utc(2025, 1, 11, 14, 0)));
        assert_eq!(draft.stop, Some(utc(2025, 1, 11, 14, 30)));
    }

    #[tokio::test]
    async fn test_ambiguous_participant_is_a_draft_state() {
        let extractor = FakeExtractor::structured(json!({
            "participants": "Marie M.",
            "date": "demain", "heure": "10h"
        }));
        let config = Config::default();
        let builder = DraftBuilder::new(&extractor, &config);

        let dir = DirectoryIndex::new(vec![
            ContactRecord {
                id: "1".to_string(),
                name: "Marie Martin".to_string(),
                email: None,
                phone: None,
            },
            ContactRecord {
                id: "2".to_string(),
                name: "Marie Morin".to_string(),
                email: None,
                phone: None,
            },
        ]);
        let draft = builder.build("visite de Marie M. demain à 10h", &dir, reference()).await;

        assert_eq!(draft.participants.len(), 1);
        assert_eq!(draft.participants[0].status, MatchStatus::Ambiguous);
        assert!(draft.participants[0].candidates.len() >= 2);
    }
}
