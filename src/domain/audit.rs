use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Transfer,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Success,
    Failed,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditAction::Transfer => f.write_str("TRANSFER"),
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::Success => f.write_str("SUCCESS"),
            AuditStatus::Failed => f.write_str("FAILED"),
        }
    }
}

/// Append-only record of an attempted action, correlated by `request_id`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AuditEntry {
    pub request_id: String,
    pub action: AuditAction,
    pub status: AuditStatus,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn transfer(request_id: &str, status: AuditStatus, message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.to_string(),
            action: AuditAction::Transfer,
            status,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }
}
