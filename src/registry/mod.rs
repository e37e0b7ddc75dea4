//! Capability registry collaborator
//!
//! The engine only asks the registry questions; who registers students and
//! who hands out the tutor capability is decided elsewhere.

pub mod capability;
pub mod memory;
pub mod participant;

pub use capability::{Capability, CapabilitySet};
pub use memory::MemoryRegistry;
pub use participant::RegisteredParticipant;

use crate::models::Identity;

/// Read-only view of identity vetting and capabilities
pub trait CapabilityRegistry: Send + Sync {
    /// Whether `id` may resolve requests, mint and freeze
    fn has_approver_capability(&self, id: Identity) -> bool;

    /// Whether `id` may configure the lab catalog
    fn has_admin_capability(&self, id: Identity) -> bool;

    /// Whether `id` is a registered and vetted participant
    fn is_approved_participant(&self, id: Identity) -> bool;
}
