//! Request arena
//!
//! Requests are keyed by their sequential id, so iterating the primary map
//! yields insertion order. The per-requester index is derived and only used
//! for enumeration.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::request::{PointsRequest, RequestId};
use crate::error::{PointsError, Result};
use crate::models::{Amount, Identity};

#[derive(Debug, Clone)]
pub struct RequestStore {
    requests: BTreeMap<RequestId, PointsRequest>,
    by_requester: HashMap<Identity, Vec<RequestId>>,
    next_id: RequestId,
}

impl Default for RequestStore {
    fn default() -> Self {
        Self {
            requests: BTreeMap::new(),
            by_requester: HashMap::new(),
            next_id: 1,
        }
    }
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and store a new pending request
    pub fn create(
        &mut self,
        requester: Identity,
        amount: Amount,
        description: &str,
        lab_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PointsRequest> {
        let id = self.next_id;
        let next = id.checked_add(1).ok_or(PointsError::Overflow)?;

        let mut request = PointsRequest::new(id, requester, amount, description, now);
        if let Some(lab_id) = lab_id {
            request = request.for_lab(lab_id);
        }

        self.next_id = next;
        self.requests.insert(id, request.clone());
        self.by_requester.entry(requester).or_default().push(id);
        Ok(request)
    }

    pub fn get(&self, id: RequestId) -> Option<&PointsRequest> {
        self.requests.get(&id)
    }

    /// Like `get`, failing with `RequestNotFound`
    pub fn require(&self, id: RequestId) -> Result<&PointsRequest> {
        self.requests.get(&id).ok_or(PointsError::RequestNotFound(id))
    }

    /// Write back a request previously read from this store
    pub fn replace(&mut self, request: PointsRequest) {
        if let Some(slot) = self.requests.get_mut(&request.id) {
            *slot = request;
        }
    }

    pub fn all(&self) -> Vec<PointsRequest> {
        self.requests.values().cloned().collect()
    }

    pub fn by_requester(&self, requester: Identity) -> Vec<PointsRequest> {
        self.by_requester
            .get(&requester)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.requests.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn pending(&self) -> Vec<PointsRequest> {
        self.requests
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
