//! Participant directory snapshot.
//!
//! The directory is rebuilt per request from the list the directory service
//! returned; nothing here outlives a single preparation or confirmation.

use serde::{Deserialize, Serialize};

use crate::utils::canonicalize;

/// A contact as supplied by the external directory service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Skeleton contact offered for creation when a dictated name matches nobody.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedContact {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Titles dropped before matching; dictation tends to include them while the
/// directory stores bare names. Only leading tokens count: a trailing "M."
/// is an initial, not a title.
const HONORIFICS: [&str; 11] = [
    "m", "mr", "mme", "mlle", "dr", "pr", "monsieur", "madame", "mademoiselle", "docteur",
    "professeur",
];

/// A directory entry with its matching form precomputed.
#[derive(Debug, Clone)]
pub struct IndexedContact {
    pub record: ContactRecord,
    pub normalized: String,
    pub tokens: Vec<String>,
}

/// Request-scoped snapshot of the known contacts, indexed for fuzzy lookup.
#[derive(Debug, Default)]
pub struct DirectoryIndex {
    entries: Vec<IndexedContact>,
}

impl DirectoryIndex {
    pub fn new(contacts: Vec<ContactRecord>) -> Self {
        let entries = contacts
            .into_iter()
            .map(|record| {
                let (normalized, tokens) = normalize_name(&record.name);
                IndexedContact { record, normalized, tokens }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[IndexedContact] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical matching form of a name: lowercased, diacritics folded,
/// honorifics dropped, tokenized.
pub fn normalize_name(name: &str) -> (String, Vec<String>) {
    let mut tokens: Vec<String> = canonicalize(name)
        .split_whitespace()
        .map(|t| t.trim_matches('.').to_string())
        .filter(|t| !t.is_empty())
        .collect();
    while tokens.len() > 1
        && tokens.first().map(|t| HONORIFICS.contains(&t.as_str())).unwrap_or(false)
    {
        tokens.remove(0);
    }
    (tokens.join(" "), tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> ContactRecord {
        ContactRecord { id: id.to_string(), name: name.to_string(), email: None, phone: None }
    }

    #[test]
    fn test_normalize_name_drops_honorifics_and_accents() {
        let (normalized, tokens) = normalize_name("Mme Hélène Lefèvre");
        assert_eq!(normalized, "helene lefevre");
        assert_eq!(tokens, vec!["helene", "lefevre"]);

        let (normalized, _) = normalize_name("Dr. Jean DUPONT");
        assert_eq!(normalized, "jean dupont");
    }

    #[test]
    fn test_index_precomputes_tokens() {
        let index = DirectoryIndex::new(vec![record("1", "Marie Martin")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.entries()[0].tokens, vec!["marie", "martin"]);
    }

    #[test]
    fn test_empty_directory() {
        let index = DirectoryIndex::new(Vec::new());
        assert!(index.is_empty());
    }
}
