//! HTTP clients for the external collaborators.
//!
//! Shapes follow the platform's JSON contracts; every non-2xx answer is
//! folded into [`ServiceError::Status`] with the upstream body attached so
//! callers can surface it verbatim.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;

use crate::config::ServicesConfig;
use crate::contacts::{ContactRecord, ProposedContact};
use crate::error::ServiceError;
use crate::extract::ExtractorPayload;
use crate::intent::EventMatchQuery;

use super::{
    AvailabilityService, CalendarService, ContactService, DirectoryService, EventPatch,
    EventPayload, ExtractionService,
};

/// One client instance per engine; holds the shared connection pool and the
/// optional bearer credential.
pub struct HttpServices {
    client: Client,
    config: ServicesConfig,
    api_key: Option<SecretString>,
}

impl HttpServices {
    pub fn new(config: ServicesConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_deadline_seconds))
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        // Credential comes from the environment, never from the config file.
        let api_key = env::var("CARENDA_SERVICES_TOKEN").ok().map(SecretString::from);
        if api_key.is_none() {
            debug!("CARENDA_SERVICES_TOKEN not set; calling collaborators unauthenticated");
        }

        Ok(Self { client, config, api_key })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose_secret()),
            None => request,
        }
    }
}

async fn checked(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::Status { status: status.as_u16(), body });
    }
    Ok(response)
}

async fn decode<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, ServiceError> {
    response.json::<T>().await.map_err(|e| ServiceError::Decode(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct IdBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct BusyBody {
    // Providers disagree on the flag's name; accept either polarity.
    #[serde(default)]
    busy: Option<bool>,
    #[serde(default)]
    free: Option<bool>,
}

#[async_trait]
impl ExtractionService for HttpServices {
    async fn extract(&self, text: &str) -> Result<ExtractorPayload, ServiceError> {
        debug!("requesting extraction for {} chars of dictation", text.len());
        let response = self
            .authorize(self.client.post(&self.config.extraction_url))
            .json(&json!({ "text": text }))
            .send()
            .await?;
        let body = checked(response).await?.text().await.map_err(ServiceError::from)?;
        Ok(ExtractorPayload::from_response_body(&body))
    }
}

#[async_trait]
impl DirectoryService for HttpServices {
    async fn fetch_contacts(&self) -> Result<Vec<ContactRecord>, ServiceError> {
        let response =
            self.authorize(self.client.get(&self.config.directory_url)).send().await?;
        let contacts: Vec<ContactRecord> = decode(checked(response).await?).await?;
        debug!("directory snapshot holds {} contacts", contacts.len());
        Ok(contacts)
    }
}

#[async_trait]
impl AvailabilityService for HttpServices {
    async fn is_busy(
        &self,
        participant_ids: &[String],
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        let response = self
            .authorize(self.client.post(&self.config.availability_url))
            .json(&json!({
                "participant_ids": participant_ids,
                "start": start,
                "stop": stop,
            }))
            .send()
            .await?;
        let body: BusyBody = decode(checked(response).await?).await?;
        match (body.busy, body.free) {
            (Some(busy), _) => Ok(busy),
            (None, Some(free)) => Ok(!free),
            (None, None) => {
                Err(ServiceError::Decode("availability response carries neither flag".into()))
            }
        }
    }
}

#[async_trait]
impl CalendarService for HttpServices {
    async fn create_event(&self, event: &EventPayload) -> Result<String, ServiceError> {
        let url = format!("{}/create", self.config.calendar_url);
        let response = self.authorize(self.client.post(&url)).json(event).send().await?;
        let body: IdBody = decode(checked(response).await?).await?;
        Ok(body.id)
    }

    async fn update_event(
        &self,
        event_id: &str,
        fields: &EventPatch,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/update", self.config.calendar_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&json!({ "id": event_id, "fields": fields }))
            .send()
            .await?;
        let body: IdBody = decode(checked(response).await?).await?;
        Ok(body.id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<String, ServiceError> {
        let url = format!("{}/delete", self.config.calendar_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(&json!({ "id": event_id }))
            .send()
            .await?;
        let body: IdBody = decode(checked(response).await?).await?;
        Ok(body.id)
    }

    async fn find_events(&self, query: &EventMatchQuery) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/find", self.config.calendar_url);
        let response = self.authorize(self.client.post(&url)).json(query).send().await?;
        let matches: Vec<IdBody> = decode(checked(response).await?).await?;
        Ok(matches.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl ContactService for HttpServices {
    async fn create_contact(&self, contact: &ProposedContact) -> Result<String, ServiceError> {
        let response = self
            .authorize(self.client.post(&self.config.contacts_url))
            .json(contact)
            .send()
            .await?;
        let body: IdBody = decode(checked(response).await?).await?;
        Ok(body.id)
    }
}
