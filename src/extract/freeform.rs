//! Tolerant parser for the extractor's "- key: value" text fallback.
//!
//! The upstream model is asked for JSON but frequently answers with bullet
//! lists, varying key spellings, or prose. This parser accepts anything
//! line-shaped and silently drops what it cannot read; the builder decides
//! afterwards whether enough survived.

use log::debug;

use super::{split_names, RawExtraction};
use crate::utils::canonicalize;

pub fn parse(text: &str) -> RawExtraction {
    let mut out = RawExtraction::default();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '•']).trim_start();
        if line.is_empty() {
            continue;
        }

        // Accept ":" or "=" as separator; a line without either is prose.
        let Some((raw_key, raw_value)) = line.split_once(':').or_else(|| line.split_once('=')) else {
            debug!("skipping freeform line without separator: '{}'", line);
            continue;
        };

        let key = canonicalize(raw_key);
        let value = raw_value.trim();
        if value.is_empty() {
            continue;
        }

        if super::PARTICIPANT_KEYS.contains(&key.as_str()) {
            out.participants.extend(split_names(value));
        } else if super::DATE_KEYS.contains(&key.as_str()) {
            out.date = Some(value.to_string());
        } else if super::TIME_KEYS.contains(&key.as_str()) {
            out.time = Some(value.to_string());
        } else if super::STOP_KEYS.contains(&key.as_str()) {
            out.stop = Some(value.to_string());
        } else if super::DURATION_KEYS.contains(&key.as_str()) {
            out.duration = Some(value.to_string());
        } else if super::DESCRIPTION_KEYS.contains(&key.as_str()) {
            out.description = Some(value.to_string());
        } else if super::LOCATION_KEYS.contains(&key.as_str()) {
            out.location = Some(value.to_string());
        } else {
            debug!("ignoring unknown freeform key '{}'", key);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bullet_list() {
        let raw = parse("- participants: Jean Dupont, Marie Martin\n- date: demain\n- heure: 14h30");
        assert_eq!(raw.participants, vec!["Jean Dupont", "Marie Martin"]);
        assert_eq!(raw.date.as_deref(), Some("demain"));
        assert_eq!(raw.time.as_deref(), Some("14h30"));
    }

    #[test]
    fn test_mixed_bullets_and_case() {
        let raw = parse("* Participants : Jean Dupont\n• LIEU: cabinet\nDurée = 45 minutes");
        assert_eq!(raw.participants, vec!["Jean Dupont"]);
        assert_eq!(raw.location.as_deref(), Some("cabinet"));
        assert_eq!(raw.duration.as_deref(), Some("45 minutes"));
    }

    #[test]
    fn test_lines_without_separator_are_skipped() {
        let raw = parse("voici le rendez-vous demandé\n- date: demain\nmerci de confirmer");
        assert_eq!(raw.date.as_deref(), Some("demain"));
        assert!(raw.participants.is_empty());
        assert!(raw.description.is_none());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let raw = parse("- humeur: enjouée\n- date: demain\n- confiance: 0.93");
        assert_eq!(raw.date.as_deref(), Some("demain"));
        assert!(raw.description.is_none());
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let raw = parse("- participants:\n- date: demain\n- lieu:   ");
        assert!(raw.participants.is_empty());
        assert!(raw.location.is_none());
        assert_eq!(raw.date.as_deref(), Some("demain"));
    }

    #[test]
    fn test_repeated_keys_accumulate_names_and_overwrite_scalars() {
        let raw = parse("- participant: Jean Dupont\n- participant: Marie Martin\n- heure: 10h\n- heure: 11h");
        assert_eq!(raw.participants, vec!["Jean Dupont", "Marie Martin"]);
        // Scalars keep the last occurrence, matching how the model corrects itself.
        assert_eq!(raw.time.as_deref(), Some("11h"));
    }

    #[test]
    fn test_accented_and_spaced_keys() {
        let raw = parse("-   Début : 9h\n- jusqu'à: 10h30");
        assert_eq!(raw.time.as_deref(), Some("9h"));
        assert_eq!(raw.stop.as_deref(), Some("10h30"));
    }

    #[test]
    fn test_garbage_yields_empty_extraction() {
        let raw = parse("%%% ???\n\n12345\n");
        assert!(raw.is_empty());
    }

    #[test]
    fn test_time_with_colon_value_survives_split() {
        // "heure: 14:30" splits on the first colon only.
        let raw = parse("- heure: 14:30");
        assert_eq!(raw.time.as_deref(), Some("14:30"));
    }
}
