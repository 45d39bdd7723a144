//! Final mutation gateway to the external calendar.
//!
//! Each operation issues exactly one call. The remote system's idempotency
//! is not guaranteed, so nothing here retries; a failed commit surfaces the
//! upstream status and body and leaves the retry decision to the caller.

use log::info;

use crate::error::EngineError;
use crate::services::{CalendarService, EventPatch, EventPayload};

pub struct CommitGateway<'a> {
    calendar: &'a dyn CalendarService,
}

impl<'a> CommitGateway<'a> {
    pub fn new(calendar: &'a dyn CalendarService) -> Self {
        Self { calendar }
    }

    pub async fn create(&self, event: &EventPayload) -> Result<String, EngineError> {
        let event_id =
            self.calendar.create_event(event).await.map_err(EngineError::from_commit)?;
        info!("created event {} ({} -> {})", event_id, event.start, event.stop);
        Ok(event_id)
    }

    pub async fn update(
        &self,
        event_id: &str,
        fields: &EventPatch,
    ) -> Result<String, EngineError> {
        let event_id = self
            .calendar
            .update_event(event_id, fields)
            .await
            .map_err(EngineError::from_commit)?;
        info!("updated event {}", event_id);
        Ok(event_id)
    }

    pub async fn cancel(&self, event_id: &str) -> Result<String, EngineError> {
        let event_id =
            self.calendar.delete_event(event_id).await.map_err(EngineError::from_commit)?;
        info!("cancelled event {}", event_id);
        Ok(event_id)
    }
}
