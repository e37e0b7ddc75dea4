//! Points requests and their lifecycle
//!
//! A request starts out pending and is resolved exactly once, by a tutor,
//! to either approved or rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PointsError, Result};
use crate::models::{Amount, Identity};

/// Sequential request identifier, starting at 1
pub type RequestId = u64;

/// Status of a points request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a tutor
    Pending,
    /// Approved and paid out
    Approved,
    /// Rejected without payment
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }
}

/// A student's claim for points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsRequest {
    pub id: RequestId,
    pub requester: Identity,
    pub amount: Amount,
    pub description: String,
    /// Lab this request claims, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_id: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Tutor who approved or rejected the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<Identity>,
}

impl PointsRequest {
    pub fn new(
        id: RequestId,
        requester: Identity,
        amount: Amount,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester,
            amount,
            description: description.into(),
            lab_id: None,
            status: RequestStatus::Pending,
            created_at,
            resolved_at: None,
            resolved_by: None,
        }
    }

    /// Attach the lab this request claims
    pub fn for_lab(mut self, lab_id: impl Into<String>) -> Self {
        self.lab_id = Some(lab_id.into());
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Fail unless the request can still be resolved
    pub fn ensure_pending(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(PointsError::RequestAlreadyProcessed {
                id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn approve(&mut self, approver: Identity, at: DateTime<Utc>) -> Result<()> {
        self.resolve(RequestStatus::Approved, approver, at)
    }

    pub fn reject(&mut self, approver: Identity, at: DateTime<Utc>) -> Result<()> {
        self.resolve(RequestStatus::Rejected, approver, at)
    }

    fn resolve(&mut self, status: RequestStatus, approver: Identity, at: DateTime<Utc>) -> Result<()> {
        self.ensure_pending()?;
        self.status = status;
        self.resolved_at = Some(at);
        self.resolved_by = Some(approver);
        Ok(())
    }
}
