//! Lab points - tutor-approved point requests backed by a balance ledger
//!
//! Students request points, directly or by claiming a lab's fixed reward.
//! Tutors approve requests by paying them out of their own balance, or reject
//! them. The ledger enforces non-negative balances, allowances and frozen
//! accounts.

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod labs;
pub mod ledger;
pub mod models;
pub mod registry;

pub use config::EngineConfig;
pub use engine::{PointsEngine, PointsEvent, PointsRequest, RequestId, RequestStatus};
pub use error::{ErrorKind, PointsError, Result};
pub use models::{Amount, Identity};
pub use registry::{Capability, CapabilityRegistry, MemoryRegistry};
