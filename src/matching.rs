//! Fuzzy resolution of dictated participant names against the directory.
//!
//! Scoring is a weighted blend of token-set overlap and inverse normalized
//! edit distance. Dictation mangles surnames more often than it drops
//! tokens, so token overlap carries the larger weight.

use serde::{Deserialize, Serialize};

use crate::config::MatchingConfig;
use crate::contacts::{normalize_name, DirectoryIndex, ProposedContact};

/// Weight of the token-set component; the remainder goes to edit distance.
const TOKEN_WEIGHT: f64 = 0.6;
/// Credit for a single-letter initial matching a token's first letter.
const INITIAL_CREDIT: f64 = 0.9;
/// Per-token edit-distance similarity below this contributes nothing.
const TOKEN_SIMILARITY_FLOOR: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Matched,
    Ambiguous,
    Unmatched,
}

/// Resolution of one dictated participant mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantMatch {
    pub input_name: String,
    pub status: MatchStatus,
    pub resolved_id: Option<String>,
    pub resolved_name: Option<String>,
    pub score: f64,
    pub candidates: Vec<ScoredCandidate>,
    pub proposed_contact: Option<ProposedContact>,
}

impl ParticipantMatch {
    /// Pin this mention to one of its candidates, clearing the ambiguity.
    /// Used when the user picks from the candidate list.
    pub fn choose(&mut self, candidate: &ScoredCandidate) {
        self.status = MatchStatus::Matched;
        self.resolved_id = Some(candidate.id.clone());
        self.resolved_name = Some(candidate.name.clone());
        self.score = candidate.score;
        self.proposed_contact = None;
    }
}

/// Score `candidate_name` against every directory entry, best first.
/// Pure: no directory mutation, no caching.
pub fn match_name(
    candidate_name: &str,
    directory: &DirectoryIndex,
    top_n: usize,
) -> Vec<ScoredCandidate> {
    let (normalized, tokens) = normalize_name(candidate_name);
    if normalized.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredCandidate> = directory
        .entries()
        .iter()
        .map(|entry| ScoredCandidate {
            id: entry.record.id.clone(),
            name: entry.record.name.clone(),
            score: name_score(&normalized, &tokens, &entry.normalized, &entry.tokens),
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.name.cmp(&b.name))
    });
    scored.truncate(top_n);
    scored
}

/// Resolve one mention into a classified `ParticipantMatch`.
pub fn resolve_participant(
    input_name: &str,
    directory: &DirectoryIndex,
    config: &MatchingConfig,
) -> ParticipantMatch {
    let candidates = match_name(input_name, directory, config.top_candidates);

    let top_score = candidates.first().map(|c| c.score).unwrap_or(0.0);
    let runner_up = candidates.get(1).map(|c| c.score).unwrap_or(0.0);

    if top_score < config.match_threshold {
        return ParticipantMatch {
            input_name: input_name.to_string(),
            status: MatchStatus::Unmatched,
            resolved_id: None,
            resolved_name: None,
            score: top_score,
            candidates,
            proposed_contact: Some(ProposedContact {
                name: input_name.trim().to_string(),
                email: None,
                phone: None,
            }),
        };
    }

    let margin = top_score - runner_up;
    // An exact normalized hit is never ambiguous unless the directory itself
    // holds two identical names.
    let exact_and_unique = top_score >= 1.0 && runner_up < 1.0;

    if exact_and_unique || margin >= config.ambiguity_margin {
        let top = candidates.first().cloned().expect("top_score >= threshold implies a candidate");
        ParticipantMatch {
            input_name: input_name.to_string(),
            status: MatchStatus::Matched,
            resolved_id: Some(top.id),
            resolved_name: Some(top.name),
            score: top_score,
            candidates,
            proposed_contact: None,
        }
    } else {
        ParticipantMatch {
            input_name: input_name.to_string(),
            status: MatchStatus::Ambiguous,
            resolved_id: None,
            resolved_name: None,
            score: top_score,
            candidates,
            proposed_contact: None,
        }
    }
}

fn name_score(
    input_norm: &str,
    input_tokens: &[String],
    entry_norm: &str,
    entry_tokens: &[String],
) -> f64 {
    if entry_norm.is_empty() {
        return 0.0;
    }
    if input_norm == entry_norm {
        return 1.0;
    }

    let token_component = token_set_score(input_tokens, entry_tokens);
    let string_component = edit_similarity(input_norm, entry_norm);

    (TOKEN_WEIGHT * token_component + (1.0 - TOKEN_WEIGHT) * string_component).clamp(0.0, 1.0)
}

/// Best-pairing token overlap, normalized by the longer token list so extra
/// tokens on either side cost score.
fn token_set_score(input_tokens: &[String], entry_tokens: &[String]) -> f64 {
    if input_tokens.is_empty() || entry_tokens.is_empty() {
        return 0.0;
    }

    let total: f64 = input_tokens
        .iter()
        .map(|it| {
            entry_tokens
                .iter()
                .map(|et| token_pair_score(it, et))
                .fold(0.0, f64::max)
        })
        .sum();

    total / input_tokens.len().max(entry_tokens.len()) as f64
}

fn token_pair_score(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    // "m" against "martin": dictated initials keep most of their weight.
    if a.len() == 1 && b.starts_with(a) || b.len() == 1 && a.starts_with(b) {
        return INITIAL_CREDIT;
    }
    let similarity = edit_similarity(a, b);
    if similarity >= TOKEN_SIMILARITY_FLOOR {
        similarity
    } else {
        0.0
    }
}

fn edit_similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - strsim::levenshtein(a, b) as f64 / longest as f64
}
