//! Engine configuration
//!
//! Every setting can come from a command-line flag or the environment.

use clap::Args;
use uuid::Uuid;

use crate::models::Identity;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;
pub const DEFAULT_MAX_BATCH: usize = 100;

#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    /// Capacity of the event broadcast channel
    #[arg(long, env = "LABPOINTS_EVENT_CAPACITY", default_value_t = DEFAULT_EVENT_CAPACITY)]
    pub event_capacity: usize,

    /// Ledger identity of the engine (the spender tutors grant allowance to)
    #[arg(long, env = "LABPOINTS_ENGINE_ID")]
    pub engine_id: Option<Uuid>,

    /// Maximum number of request ids accepted by one batch call
    #[arg(long, env = "LABPOINTS_MAX_BATCH", default_value_t = DEFAULT_MAX_BATCH)]
    pub max_batch: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            engine_id: None,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

impl EngineConfig {
    pub fn with_engine_id(mut self, id: Identity) -> Self {
        self.engine_id = Some(id.as_uuid());
        self
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch;
        self
    }

    /// Configured engine identity, or a fresh one
    pub fn engine_identity(&self) -> Identity {
        self.engine_id.map(Identity::from_uuid).unwrap_or_default()
    }
}
