//! Lab reward catalog and per-student completion flags

use std::collections::{BTreeMap, HashSet};

use crate::error::{PointsError, Result};
use crate::models::{Amount, Identity};

/// Fixed reward per lab.
///
/// A reward of 0 means the lab is disabled. Unknown labs also read as 0; the
/// catalog remembers which labs were ever configured only for enumeration.
#[derive(Debug, Clone, Default)]
pub struct LabCatalog {
    rewards: BTreeMap<String, Amount>,
}

impl LabCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the reward for `lab_id`. Setting 0 disables the lab.
    pub fn set_reward(&mut self, lab_id: &str, amount: Amount) -> Result<Option<Amount>> {
        if lab_id.trim().is_empty() {
            return Err(PointsError::invalid("lab id must not be empty"));
        }
        Ok(self.rewards.insert(lab_id.to_string(), amount))
    }

    pub fn get_reward(&self, lab_id: &str) -> Amount {
        self.rewards.get(lab_id).copied().unwrap_or(0)
    }

    pub fn is_configured(&self, lab_id: &str) -> bool {
        self.rewards.contains_key(lab_id)
    }

    /// All configured labs with their rewards, ordered by lab id
    pub fn labs(&self) -> Vec<(String, Amount)> {
        self.rewards
            .iter()
            .map(|(id, reward)| (id.clone(), *reward))
            .collect()
    }
}

/// Which (student, lab) pairs currently have a claim outstanding or approved
#[derive(Debug, Clone, Default)]
pub struct CompletionTracker {
    completed: HashSet<(Identity, String)>,
}

impl CompletionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_completed(&self, student: Identity, lab_id: &str) -> bool {
        self.completed.contains(&(student, lab_id.to_string()))
    }

    /// Set the flag. Returns false if it was already set.
    pub fn mark(&mut self, student: Identity, lab_id: &str) -> bool {
        self.completed.insert((student, lab_id.to_string()))
    }

    /// Clear the flag so the lab can be claimed again. Returns false if it was not set.
    pub fn clear(&mut self, student: Identity, lab_id: &str) -> bool {
        self.completed.remove(&(student, lab_id.to_string()))
    }

    /// Labs currently flagged for `student`, sorted
    pub fn labs_for(&self, student: Identity) -> Vec<String> {
        let mut labs: Vec<String> = self
            .completed
            .iter()
            .filter(|(id, _)| *id == student)
            .map(|(_, lab)| lab.clone())
            .collect();
        labs.sort();
        labs
    }
}
