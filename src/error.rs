//! Error types for ledger and request operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{RequestId, RequestStatus};
use crate::models::{Amount, Identity};
use crate::registry::Capability;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointsError {
    #[error("Not an approved participant: {0}")]
    NotApprovedParticipant(Identity),

    #[error("Identity {caller} lacks capability: {}", .required.as_str())]
    MissingCapability {
        caller: Identity,
        required: Capability,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Null identity is not a valid account")]
    ZeroAddress,

    #[error("Points request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Lab not found or has no active reward: {0}")]
    LabNotFound(String),

    #[error("Points request {id} already processed ({})", .status.as_str())]
    RequestAlreadyProcessed { id: RequestId, status: RequestStatus },

    #[error("Lab {lab_id} already completed by {student}")]
    LabAlreadyCompleted { student: Identity, lab_id: String },

    #[error("Account already frozen: {0}")]
    AlreadyFrozen(Identity),

    #[error("Account not frozen: {0}")]
    NotFrozen(Identity),

    #[error("Insufficient balance for {account}: available {available}, required {required}")]
    InsufficientBalance {
        account: Identity,
        available: Amount,
        required: Amount,
    },

    #[error(
        "Insufficient allowance from {owner} to {spender}: available {available}, required {required}"
    )]
    InsufficientAllowance {
        owner: Identity,
        spender: Identity,
        available: Amount,
        required: Amount,
    },

    #[error("Account is frozen: {0}")]
    FrozenAccount(Identity),

    #[error("Arithmetic overflow")]
    Overflow,
}

/// Coarse error taxonomy callers can branch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthorized,
    InvalidArgument,
    ZeroAddress,
    NotFound,
    AlreadyProcessed,
    AlreadyCompleted,
    AlreadyFrozen,
    NotFrozen,
    InsufficientBalance,
    InsufficientAllowance,
    FrozenAccount,
    Overflow,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::ZeroAddress => "zero_address",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyProcessed => "already_processed",
            ErrorKind::AlreadyCompleted => "already_completed",
            ErrorKind::AlreadyFrozen => "already_frozen",
            ErrorKind::NotFrozen => "not_frozen",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::InsufficientAllowance => "insufficient_allowance",
            ErrorKind::FrozenAccount => "frozen_account",
            ErrorKind::Overflow => "overflow",
        }
    }
}

impl PointsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PointsError::NotApprovedParticipant(_) | PointsError::MissingCapability { .. } => {
                ErrorKind::Unauthorized
            }
            PointsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PointsError::ZeroAddress => ErrorKind::ZeroAddress,
            PointsError::RequestNotFound(_) | PointsError::LabNotFound(_) => ErrorKind::NotFound,
            PointsError::RequestAlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            PointsError::LabAlreadyCompleted { .. } => ErrorKind::AlreadyCompleted,
            PointsError::AlreadyFrozen(_) => ErrorKind::AlreadyFrozen,
            PointsError::NotFrozen(_) => ErrorKind::NotFrozen,
            PointsError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PointsError::InsufficientAllowance { .. } => ErrorKind::InsufficientAllowance,
            PointsError::FrozenAccount(_) => ErrorKind::FrozenAccount,
            PointsError::Overflow => ErrorKind::Overflow,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PointsError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, PointsError>;
