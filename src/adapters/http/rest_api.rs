//! `RestEntityApi` - the collaborator REST API over reqwest.
//!
//! Every request carries the session credential as a bearer token. The
//! credential is read per request so a refreshed session is picked up
//! without rebuilding the client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::domain::events::{AlertPayload, ClassificationPayload, MessagePayload};
use crate::domain::foundation::{PatientId, UserId};
use crate::domain::projection::{
    AlertSnapshot, MedicationRecord, MedicationSnapshot, ThreadSummary,
};
use crate::ports::{ApiError, CredentialSource, EntityApi, MessageDraft, UserSummary};

/// Connection settings for the REST collaborator.
#[derive(Debug, Clone)]
pub struct RestApiConfig {
    /// Dashboard origin, e.g. `https://dashboard.example.org/api`.
    pub base_url: String,

    /// Bound on each request, including the body.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MedicationsBody {
    #[serde(default)]
    medications: Vec<MedicationRecord>,
}

#[derive(Debug, Deserialize)]
struct AlertsBody {
    #[serde(default)]
    alerts: Vec<AlertPayload>,
    #[serde(default)]
    classifications: Vec<ClassificationPayload>,
}

pub struct RestEntityApi {
    config: RestApiConfig,
    client: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl RestEntityApi {
    pub fn new(
        config: RestApiConfig,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let credential = self.credentials.credential().ok_or(ApiError::Unauthorized)?;
        Ok(request.bearer_auth(credential.expose_secret()))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, ApiError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "REST request failed");
                if e.is_timeout() {
                    ApiError::Transport(format!("{} timed out", operation))
                } else {
                    ApiError::Transport(e.to_string())
                }
            })?;

        let response = check_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Decode(format!("{}: {}", operation, e)))
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body))
}

fn status_error(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        _ => ApiError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        },
    }
}

/// Pulls `message` or `error` out of a JSON error body; falls back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl EntityApi for RestEntityApi {
    async fn create_message(&self, draft: &MessageDraft) -> Result<MessagePayload, ApiError> {
        let request = self.client.post(self.url("/messages")).json(draft);
        self.send(request, "create_message").await
    }

    async fn fetch_conversation(
        &self,
        counterpart: &UserId,
    ) -> Result<Vec<MessagePayload>, ApiError> {
        let path = format!("/messages/conversation/{}", counterpart);
        self.send(self.client.get(self.url(&path)), "fetch_conversation")
            .await
    }

    async fn fetch_threads(&self) -> Result<Vec<ThreadSummary>, ApiError> {
        self.send(self.client.get(self.url("/messages/threads")), "fetch_threads")
            .await
    }

    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError> {
        let request = self
            .client
            .get(self.url("/users/search"))
            .query(&[("q", query)]);
        self.send(request, "search_users").await
    }

    async fn fetch_medications(&self, patient: &PatientId) -> Result<MedicationSnapshot, ApiError> {
        let path = format!("/patients/{}/medications", patient);
        let body: MedicationsBody = self
            .send(self.client.get(self.url(&path)), "fetch_medications")
            .await?;
        Ok(MedicationSnapshot {
            patient_id: patient.clone(),
            medications: body.medications,
        })
    }

    async fn fetch_alerts(&self, patient: &PatientId) -> Result<AlertSnapshot, ApiError> {
        let path = format!("/patients/{}/alerts", patient);
        let body: AlertsBody = self
            .send(self.client.get(self.url(&path)), "fetch_alerts")
            .await?;
        Ok(AlertSnapshot {
            patient_id: patient.clone(),
            alerts: body.alerts,
            classifications: body.classifications,
        })
    }
}
