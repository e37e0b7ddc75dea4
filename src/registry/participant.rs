//! Registered cohort member
//!
//! A student is registered first and can only earn points once approved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::{Capability, CapabilitySet};
use crate::models::Identity;

/// An identity known to the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredParticipant {
    pub id: Identity,
    pub name: String,
    /// Whether registration has been vetted
    pub approved: bool,
    /// Capabilities granted on top of participation
    pub capabilities: CapabilitySet,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl RegisteredParticipant {
    /// Register a new, not yet approved participant
    pub fn new(id: Identity, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            approved: false,
            capabilities: CapabilitySet::new(),
            registered_at: Utc::now(),
            approved_at: None,
        }
    }

    /// Mark the registration as vetted
    pub fn approve(&mut self) {
        if !self.approved {
            self.approved = true;
            self.approved_at = Some(Utc::now());
        }
    }

    pub fn revoke_approval(&mut self) {
        self.approved = false;
        self.approved_at = None;
    }

    pub fn has_capability(&self, cap: Capability) -> bool {
        self.capabilities.has(cap)
    }

    pub fn grant_capability(&mut self, cap: Capability) {
        self.capabilities.add(cap);
    }

    pub fn revoke_capability(&mut self, cap: Capability) {
        self.capabilities.remove(cap);
    }
}
