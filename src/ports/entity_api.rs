//! EntityApi port - the collaborator REST API.
//!
//! Baseline snapshots are fetched here when a view opens, and the
//! authoritative write happens here. The write's response carries the
//! entity with its stable id, which is what lets the outbound pipeline and
//! the push echo converge on one entry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::events::MessagePayload;
use crate::domain::foundation::{PatientId, UserId};
use crate::domain::projection::{AlertSnapshot, MedicationSnapshot, ThreadSummary};

/// A message the user wants to send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub receiver_id: UserId,
    pub content: String,
}

impl MessageDraft {
    pub fn new(receiver_id: impl Into<UserId>, content: impl Into<String>) -> Self {
        Self {
            receiver_id: receiver_id.into(),
            content: content.into(),
        }
    }
}

/// A user returned by search, used to pin a new conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Errors from the REST collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// The server answered with a non-success status.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The credential was missing or refused.
    #[error("Unauthorized")]
    Unauthorized,

    /// The request never got an answer.
    #[error("Request failed: {0}")]
    Transport(String),

    /// The answer did not match the expected shape.
    #[error("Unexpected response body: {0}")]
    Decode(String),
}

/// Port for the dashboard's REST resources.
#[async_trait]
pub trait EntityApi: Send + Sync {
    /// Creates a message; returns it with its server-assigned id.
    async fn create_message(&self, draft: &MessageDraft) -> Result<MessagePayload, ApiError>;

    /// The conversation with one counterparty, oldest first.
    async fn fetch_conversation(&self, counterpart: &UserId) -> Result<Vec<MessagePayload>, ApiError>;

    /// The caller's conversation list.
    async fn fetch_threads(&self) -> Result<Vec<ThreadSummary>, ApiError>;

    /// Users matching a free-text query.
    async fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, ApiError>;

    /// A patient's medications.
    async fn fetch_medications(&self, patient: &PatientId) -> Result<MedicationSnapshot, ApiError>;

    /// A patient's alerts and AI classifications.
    async fn fetch_alerts(&self, patient: &PatientId) -> Result<AlertSnapshot, ApiError>;
}
