/// Audit trail for security-relevant account actions
///
/// Every event is emitted as one structured record on the `audit` tracing
/// target so it can be routed separately from request logs. Events never
/// carry passwords or tokens.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Register,
    Login,
    Refresh,
    Logout,
    ChangePassword,
    UpdateAccount,
    UpdateAvatar,
    UpdateCoverImage,
    Compensate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub action: AuditAction,
    pub outcome: AuditOutcome,
    /// Identity the action concerned, when known
    pub identity_id: Option<String>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(action: AuditAction, outcome: AuditOutcome, detail: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            action,
            outcome,
            identity_id: None,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn success(action: AuditAction, detail: impl Into<String>) -> Self {
        Self::new(action, AuditOutcome::Success, detail)
    }

    pub fn failure(action: AuditAction, detail: impl Into<String>) -> Self {
        Self::new(action, AuditOutcome::Failure, detail)
    }

    pub fn with_identity(mut self, identity_id: Uuid) -> Self {
        self.identity_id = Some(identity_id.to_string());
        self
    }

    pub fn record(&self) {
        let payload = serde_json::to_string(self).unwrap_or_default();
        match self.outcome {
            AuditOutcome::Success => {
                tracing::info!(target: "audit", event_id = %self.event_id, audit = %payload, "audit event")
            }
            AuditOutcome::Failure => {
                tracing::warn!(target: "audit", event_id = %self.event_id, audit = %payload, "audit event")
            }
        }
    }
}
