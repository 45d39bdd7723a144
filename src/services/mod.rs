//! Trait seams for the external collaborators.
//!
//! The engine only ever talks to these traits; production wires in the
//! HTTP clients from [`http`], tests substitute in-memory fakes. Clients
//! are injected per engine instance — there is no process-wide client or
//! cache anywhere in the core.

pub mod http;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contacts::{ContactRecord, ProposedContact};
use crate::error::ServiceError;
use crate::extract::ExtractorPayload;
use crate::intent::EventMatchQuery;

/// Calendar event fields sent on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub title: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub participant_ids: Vec<String>,
}

/// Partial field set sent on update; `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub stop: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub participant_ids: Option<Vec<String>>,
}

/// Best-effort structured extraction of a dictated request.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, text: &str) -> Result<ExtractorPayload, ServiceError>;
}

/// Snapshot of the known contacts, fetched fresh per request.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn fetch_contacts(&self) -> Result<Vec<ContactRecord>, ServiceError>;
}

/// Busy/free indicator for a participant set over a window.
#[async_trait]
pub trait AvailabilityService: Send + Sync {
    async fn is_busy(
        &self,
        participant_ids: &[String],
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<bool, ServiceError>;
}

/// The calendar store: one call per mutation, plus the lookup used when an
/// update/cancel arrives without an event id.
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn create_event(&self, event: &EventPayload) -> Result<String, ServiceError>;
    async fn update_event(&self, event_id: &str, fields: &EventPatch)
        -> Result<String, ServiceError>;
    async fn delete_event(&self, event_id: &str) -> Result<String, ServiceError>;
    async fn find_events(&self, query: &EventMatchQuery) -> Result<Vec<String>, ServiceError>;
}

/// Creates a directory entry from an unmatched participant's proposal.
#[async_trait]
pub trait ContactService: Send + Sync {
    async fn create_contact(&self, contact: &ProposedContact) -> Result<String, ServiceError>;
}
