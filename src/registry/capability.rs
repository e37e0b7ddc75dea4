//! Capabilities held by cohort members beyond plain participation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capabilities that can be granted to an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Resolve point requests, mint points, freeze accounts (tutors)
    Approve,
    /// Configure lab rewards
    Admin,
}

impl Capability {
    pub const ALL: [Capability; 2] = [Capability::Approve, Capability::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Approve => "approve",
            Capability::Admin => "admin",
        }
    }

    /// Whether holding `self` also grants `other`. Admin implies everything.
    pub fn implies(self, other: Capability) -> bool {
        self == other || self == Capability::Admin
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| format!("Invalid capability: {}", s))
    }
}

/// Granted capabilities, serialized as a sorted list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet(BTreeSet<Capability>);

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any granted capability implies `cap`
    pub fn has(&self, cap: Capability) -> bool {
        self.0.iter().any(|granted| granted.implies(cap))
    }

    /// Returns false if it was already granted
    pub fn add(&mut self, cap: Capability) -> bool {
        self.0.insert(cap)
    }

    /// Returns false if it was not granted
    pub fn remove(&mut self, cap: Capability) -> bool {
        self.0.remove(&cap)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
