//! In-memory capability registry

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::capability::Capability;
use super::participant::RegisteredParticipant;
use super::CapabilityRegistry;
use crate::models::Identity;

/// Registry backed by a map of registered identities
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    participants: RwLock<HashMap<Identity, RegisteredParticipant>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an identity. Re-registering keeps the existing record.
    pub fn register(&self, id: Identity, name: impl Into<String>) -> RegisteredParticipant {
        let mut participants = self
            .participants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        participants
            .entry(id)
            .or_insert_with(|| RegisteredParticipant::new(id, name))
            .clone()
    }

    /// Vet a registered identity. Returns false for unknown identities.
    pub fn approve(&self, id: Identity) -> bool {
        self.update(id, RegisteredParticipant::approve)
    }

    pub fn revoke_approval(&self, id: Identity) -> bool {
        self.update(id, RegisteredParticipant::revoke_approval)
    }

    pub fn grant(&self, id: Identity, cap: Capability) -> bool {
        self.update(id, |p| p.grant_capability(cap))
    }

    pub fn revoke(&self, id: Identity, cap: Capability) -> bool {
        self.update(id, |p| p.revoke_capability(cap))
    }

    pub fn get(&self, id: Identity) -> Option<RegisteredParticipant> {
        let participants = self
            .participants
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        participants.get(&id).cloned()
    }

    pub fn list(&self) -> Vec<RegisteredParticipant> {
        let participants = self
            .participants
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<_> = participants.values().cloned().collect();
        all.sort_by_key(|p| p.registered_at);
        all
    }

    fn update(&self, id: Identity, f: impl FnOnce(&mut RegisteredParticipant)) -> bool {
        let mut participants = self
            .participants
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match participants.get_mut(&id) {
            Some(p) => {
                f(p);
                true
            }
            None => false,
        }
    }

    fn check(&self, id: Identity, f: impl FnOnce(&RegisteredParticipant) -> bool) -> bool {
        let participants = self
            .participants
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        participants.get(&id).map(f).unwrap_or(false)
    }
}

impl CapabilityRegistry for MemoryRegistry {
    fn has_approver_capability(&self, id: Identity) -> bool {
        self.check(id, |p| p.has_capability(Capability::Approve))
    }

    fn has_admin_capability(&self, id: Identity) -> bool {
        self.check(id, |p| p.has_capability(Capability::Admin))
    }

    fn is_approved_participant(&self, id: Identity) -> bool {
        self.check(id, |p| p.approved)
    }
}
