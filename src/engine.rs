//! Engine façade: the boundary surface of the resolution core.
//!
//! One engine instance owns its collaborator clients and configuration;
//! every prepare/confirm/update/cancel call is a self-contained request
//! with its own directory snapshot, draft and deadline. Nothing is shared
//! mutably across requests.

use chrono::{DateTime, Utc};
use futures::join;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use uuid::Uuid;

use crate::availability::{AvailabilityResolver, AvailabilityResult};
use crate::builder::DraftBuilder;
use crate::commit::CommitGateway;
use crate::config::Config;
use crate::contacts::DirectoryIndex;
use crate::draft::{EventDraft, WARN_DEADLINE_EXCEEDED, WARN_DIRECTORY_UNAVAILABLE};
use crate::error::{EngineError, ServiceError};
use crate::intent::{locate_event, EventMatchQuery};
use crate::matching::{MatchStatus, ParticipantMatch};
use crate::services::http::HttpServices;
use crate::services::{
    AvailabilityService, CalendarService, ContactService, DirectoryService, EventPatch,
    EventPayload, ExtractionService,
};

/// The five collaborator seams, injected per engine instance.
pub struct EngineServices {
    pub extraction: Arc<dyn ExtractionService>,
    pub directory: Arc<dyn DirectoryService>,
    pub availability: Arc<dyn AvailabilityService>,
    pub calendar: Arc<dyn CalendarService>,
    pub contacts: Arc<dyn ContactService>,
}

impl EngineServices {
    /// Production wiring: one HTTP client shared across all seams.
    pub fn over_http(config: &Config) -> Result<Self, ServiceError> {
        let http = Arc::new(HttpServices::new(config.services.clone())?);
        Ok(Self {
            extraction: http.clone(),
            directory: http.clone(),
            availability: http.clone(),
            calendar: http.clone(),
            contacts: http,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub event: EventPayload,
    pub participants: Vec<ParticipantMatch>,
    #[serde(default)]
    pub skip_availability_check: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmOutcome {
    /// The slot was free (or the check was skipped) and the event exists.
    Committed { event_id: String, summary: String },
    /// The requested slot conflicted; `suggestion` carries the nearest
    /// candidate found, or the next untried one if the search exhausted.
    Conflict { suggestion: AvailabilityResult },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub query: Option<EventMatchQuery>,
    pub fields: EventPatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub query: Option<EventMatchQuery>,
}

pub struct Engine {
    config: Config,
    services: EngineServices,
}

impl Engine {
    pub fn new(config: Config, services: EngineServices) -> Self {
        Self { config, services }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn deadline(&self) -> Duration {
        Duration::from_secs(self.config.services.request_deadline_seconds)
    }

    /// Build a draft from dictated text. Never fails: collaborator outages
    /// and deadline overruns degrade into warnings on the draft.
    pub async fn prepare(&self, request: PrepareRequest) -> EventDraft {
        self.prepare_at(request, Utc::now()).await
    }

    /// Deterministic variant used by tests and replays: the reference
    /// instant is supplied instead of sampled.
    pub async fn prepare_at(
        &self,
        request: PrepareRequest,
        reference_now: DateTime<Utc>,
    ) -> EventDraft {
        let request_id = Uuid::new_v4();
        info!("[{}] preparing draft from {} chars of dictation", request_id, request.text.len());

        let builder = DraftBuilder::new(self.services.extraction.as_ref(), &self.config);

        // Directory snapshot and extraction are independent; fetch both at
        // once under the request deadline.
        let gathered = timeout(self.deadline(), async {
            join!(self.services.directory.fetch_contacts(), builder.fetch_payload(&request.text))
        })
        .await;

        let (contacts, payload) = match gathered {
            Ok(results) => results,
            Err(_) => {
                warn!("[{}] request deadline exceeded, returning best-effort draft", request_id);
                return EventDraft::degraded(&request.text, WARN_DEADLINE_EXCEEDED);
            }
        };

        let (directory, directory_warning) = match contacts {
            Ok(list) => (DirectoryIndex::new(list), None),
            Err(e) => {
                warn!("[{}] directory unavailable: {}", request_id, e);
                (DirectoryIndex::default(), Some(WARN_DIRECTORY_UNAVAILABLE))
            }
        };

        let mut draft = builder.assemble(&request.text, payload, &directory, reference_now);
        if let Some(warning) = directory_warning {
            draft.warnings.push(warning.to_string());
        }
        info!(
            "[{}] draft ready: {} participants, {} warnings",
            request_id,
            draft.participants.len(),
            draft.warnings.len()
        );
        draft
    }

    /// Commit a confirmed draft as a new event, checking availability first
    /// unless the caller forces the slot.
    pub async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmOutcome, EngineError> {
        let deadline = self.deadline();
        timeout(deadline, self.confirm_inner(request))
            .await
            .map_err(|_| EngineError::Service(ServiceError::Timeout(deadline)))?
    }

    async fn confirm_inner(&self, request: ConfirmRequest) -> Result<ConfirmOutcome, EngineError> {
        if let Some(pending) =
            request.participants.iter().find(|p| p.status == MatchStatus::Ambiguous)
        {
            return Err(EngineError::AmbiguousParticipant(pending.input_name.clone()));
        }

        let mut event = request.event.clone();

        // Fold resolved participants in, creating directory entries for the
        // unmatched ones that carry a proposal.
        for participant in &request.participants {
            match (&participant.resolved_id, &participant.proposed_contact) {
                (Some(id), _) => {
                    if !event.participant_ids.contains(id) {
                        event.participant_ids.push(id.clone());
                    }
                }
                (None, Some(proposal)) => {
                    let id = self.services.contacts.create_contact(proposal).await?;
                    info!("created contact {} for '{}'", id, proposal.name);
                    event.participant_ids.push(id);
                }
                (None, None) => {}
            }
        }

        if !request.skip_availability_check && !event.participant_ids.is_empty() {
            let resolver = AvailabilityResolver::new(
                self.services.availability.as_ref(),
                Duration::from_secs(self.config.availability.call_timeout_seconds),
            );
            let result = resolver
                .resolve(
                    &event.participant_ids,
                    event.start,
                    event.stop,
                    self.config.availability.max_attempts,
                )
                .await;

            // Anything other than "the requested slot itself is free" goes
            // back to the caller as a decision point.
            if !result.success || result.final_start != result.requested_start {
                return Ok(ConfirmOutcome::Conflict { suggestion: result });
            }
        }

        let gateway = CommitGateway::new(self.services.calendar.as_ref());
        let event_id = gateway.create(&event).await?;
        let summary = format!(
            "rendez-vous \"{}\" créé le {} de {} à {}",
            event.title,
            event.start.format("%d/%m/%Y"),
            event.start.format("%H:%M"),
            event.stop.format("%H:%M")
        );
        Ok(ConfirmOutcome::Committed { event_id, summary })
    }

    /// Move or edit an existing event located by id or by its original
    /// start and participant set.
    pub async fn update(&self, request: UpdateRequest) -> Result<String, EngineError> {
        let deadline = self.deadline();
        timeout(deadline, async {
            let event_id = locate_event(
                self.services.calendar.as_ref(),
                request.event_id.as_deref(),
                request.query.as_ref(),
            )
            .await?;
            CommitGateway::new(self.services.calendar.as_ref())
                .update(&event_id, &request.fields)
                .await
        })
        .await
        .map_err(|_| EngineError::Service(ServiceError::Timeout(deadline)))?
    }

    /// Cancel an existing event located the same way.
    pub async fn cancel(&self, request: CancelRequest) -> Result<String, EngineError> {
        let deadline = self.deadline();
        timeout(deadline, async {
            let event_id = locate_event(
                self.services.calendar.as_ref(),
                request.event_id.as_deref(),
                request.query.as_ref(),
            )
            .await?;
            CommitGateway::new(self.services.calendar.as_ref()).cancel(&event_id).await
        })
        .await
        .map_err(|_| EngineError::Service(ServiceError::Timeout(deadline)))?
    }
}
