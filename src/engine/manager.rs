//! Points engine: the request lifecycle on top of the ledger
//!
//! The engine handles:
//! - Point requests and lab claims from approved students
//! - Approval and rejection by tutors, paid from the tutor's own balance
//! - Ledger operations with capability checks
//! - Lab reward configuration
//! - Event broadcasting
//!
//! All state lives behind one lock, so each public operation, including its
//! ledger side effects and its events, is a single critical section.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use super::request::{PointsRequest, RequestId};
use super::store::RequestStore;
use crate::config::EngineConfig;
use crate::error::{PointsError, Result};
use crate::labs::{CompletionTracker, LabCatalog};
use crate::ledger::Ledger;
use crate::models::{Amount, Identity};
use crate::registry::{Capability, CapabilityRegistry};

/// Events emitted by the points engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PointsEvent {
    /// A student asked for points
    RequestCreated {
        request_id: RequestId,
        requester: Identity,
        amount: Amount,
        #[serde(skip_serializing_if = "Option::is_none")]
        lab_id: Option<String>,
        created_at: DateTime<Utc>,
    },
    /// A tutor approved a request and paid it out
    RequestApproved {
        request_id: RequestId,
        approver: Identity,
        requester: Identity,
        amount: Amount,
        resolved_at: DateTime<Utc>,
    },
    /// A tutor rejected a request
    RequestRejected {
        request_id: RequestId,
        approver: Identity,
        requester: Identity,
        resolved_at: DateTime<Utc>,
    },
    /// A rejected lab claim made the lab claimable again
    LabCompletionReset { student: Identity, lab_id: String },
    Minted {
        by: Identity,
        to: Identity,
        amount: Amount,
    },
    Burned { from: Identity, amount: Amount },
    Transferred {
        from: Identity,
        to: Identity,
        amount: Amount,
    },
    AllowanceSet {
        owner: Identity,
        spender: Identity,
        amount: Amount,
    },
    AccountFrozen { account: Identity, by: Identity },
    AccountUnfrozen { account: Identity, by: Identity },
    LabRewardSet {
        lab_id: String,
        amount: Amount,
        by: Identity,
    },
}

#[derive(Debug, Default)]
struct EngineState {
    ledger: Ledger,
    catalog: LabCatalog,
    completions: CompletionTracker,
    requests: RequestStore,
}

/// Request engine and ledger for one cohort
pub struct PointsEngine {
    identity: Identity,
    max_batch: usize,
    registry: Arc<dyn CapabilityRegistry>,
    state: RwLock<EngineState>,
    event_tx: broadcast::Sender<PointsEvent>,
}

impl PointsEngine {
    /// Create an engine with default configuration
    pub fn new(registry: Arc<dyn CapabilityRegistry>) -> Self {
        Self::with_config(registry, &EngineConfig::default())
    }

    pub fn with_config(registry: Arc<dyn CapabilityRegistry>, config: &EngineConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));
        let identity = config.engine_identity();
        tracing::debug!(engine = %identity, "points engine created");
        Self {
            identity,
            max_batch: config.max_batch,
            registry,
            state: RwLock::new(EngineState::default()),
            event_tx,
        }
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<PointsEvent> {
        self.event_tx.subscribe()
    }

    /// The engine's own ledger identity. Tutors fund approvals by granting
    /// this identity an allowance.
    pub fn engine_identity(&self) -> Identity {
        self.identity
    }

    // Requests
    //
    // Every mutator sends its events before releasing the write guard, so
    // subscribers observe events in commit order.

    /// Ask for `amount` points with a free-text justification
    pub async fn request_points(
        &self,
        caller: Identity,
        amount: Amount,
        description: &str,
    ) -> Result<RequestId> {
        self.ensure_participant(caller)?;
        if amount == 0 {
            return Err(PointsError::invalid("amount must be greater than zero"));
        }
        ensure_description(description)?;

        let mut state = self.state.write().await;
        let request = state
            .requests
            .create(caller, amount, description, None, Utc::now())?;

        tracing::info!(
            request_id = request.id,
            requester = %caller,
            amount,
            "points requested"
        );
        self.emit_created(&request);
        Ok(request.id)
    }

    /// Claim the fixed reward of a lab. A lab can be claimed once until a
    /// rejection makes it claimable again.
    pub async fn claim_lab(
        &self,
        caller: Identity,
        lab_id: &str,
        description: &str,
    ) -> Result<RequestId> {
        self.ensure_participant(caller)?;
        if lab_id.trim().is_empty() {
            return Err(PointsError::invalid("lab id must not be empty"));
        }
        ensure_description(description)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        if state.completions.is_completed(caller, lab_id) {
            return Err(PointsError::LabAlreadyCompleted {
                student: caller,
                lab_id: lab_id.to_string(),
            });
        }
        let reward = state.catalog.get_reward(lab_id);
        if reward == 0 {
            return Err(PointsError::LabNotFound(lab_id.to_string()));
        }

        let request = state
            .requests
            .create(caller, reward, description, Some(lab_id), Utc::now())?;
        state.completions.mark(caller, lab_id);

        tracing::info!(
            request_id = request.id,
            requester = %caller,
            lab_id,
            amount = request.amount,
            "lab claimed"
        );
        self.emit_created(&request);
        Ok(request.id)
    }

    /// Approve a pending request, paying it from the caller's own balance
    /// through the allowance the caller granted this engine
    pub async fn fulfill_points_request(
        &self,
        caller: Identity,
        id: RequestId,
    ) -> Result<PointsRequest> {
        self.ensure_approver(caller)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut request = state.requests.require(id)?.clone();
        request.approve(caller, Utc::now())?;
        self.check_funding(&state.ledger, caller, request.amount)?;

        state
            .ledger
            .transfer_from(self.identity, caller, request.requester, request.amount)
            .inspect_err(|e| {
                tracing::warn!(request_id = id, approver = %caller, error = %e, "payout failed");
            })?;
        state.requests.replace(request.clone());

        tracing::info!(
            request_id = id,
            approver = %caller,
            requester = %request.requester,
            amount = request.amount,
            "points request approved"
        );
        self.emit_approved(&request);
        Ok(request)
    }

    /// Reject a pending request. A rejected lab claim clears the student's
    /// completion flag for that lab.
    pub async fn reject_points_request(
        &self,
        caller: Identity,
        id: RequestId,
    ) -> Result<PointsRequest> {
        self.ensure_approver(caller)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let mut request = state.requests.require(id)?.clone();
        request.reject(caller, Utc::now())?;
        let reset = reset_lab(&mut state.completions, &request);
        state.requests.replace(request.clone());

        tracing::info!(
            request_id = id,
            approver = %caller,
            requester = %request.requester,
            "points request rejected"
        );
        self.emit_rejected(&request, reset);
        Ok(request)
    }

    /// Approve every listed request or none of them.
    ///
    /// All ids are validated, and the summed amount is checked against the
    /// caller's balance and allowance before any points move. Frozen
    /// accounts and recipient overflow are ruled out up front too, so once
    /// the checks pass no payout can fail.
    pub async fn batch_fulfill(
        &self,
        caller: Identity,
        ids: &[RequestId],
    ) -> Result<Vec<PointsRequest>> {
        self.ensure_approver(caller)?;
        self.check_batch(ids)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let mut staged = Vec::with_capacity(ids.len());
        let mut total: Amount = 0;
        for id in ids {
            let mut request = state.requests.require(*id)?.clone();
            request.approve(caller, now)?;
            total = total
                .checked_add(request.amount)
                .ok_or(PointsError::Overflow)?;
            staged.push(request);
        }
        self.check_funding(&state.ledger, caller, total)?;
        check_payouts(&state.ledger, caller, &staged).inspect_err(|e| {
            tracing::warn!(approver = %caller, error = %e, "batch payout rejected, nothing applied");
        })?;

        for request in &staged {
            state.ledger.transfer_from(
                self.identity,
                caller,
                request.requester,
                request.amount,
            )?;
            state.requests.replace(request.clone());
        }

        tracing::info!(approver = %caller, count = staged.len(), "batch approved");
        for request in &staged {
            self.emit_approved(request);
        }
        Ok(staged)
    }

    /// Reject every listed request or none of them
    pub async fn batch_reject(
        &self,
        caller: Identity,
        ids: &[RequestId],
    ) -> Result<Vec<PointsRequest>> {
        self.ensure_approver(caller)?;
        self.check_batch(ids)?;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let now = Utc::now();

        let mut staged = Vec::with_capacity(ids.len());
        for id in ids {
            let mut request = state.requests.require(*id)?.clone();
            request.reject(caller, now)?;
            staged.push(request);
        }

        tracing::info!(approver = %caller, count = staged.len(), "batch rejected");
        for request in &staged {
            let reset = reset_lab(&mut state.completions, request);
            state.requests.replace(request.clone());
            self.emit_rejected(request, reset);
        }
        Ok(staged)
    }

    pub async fn get_points_request(&self, id: RequestId) -> Option<PointsRequest> {
        let state = self.state.read().await;
        state.requests.get(id).cloned()
    }

    /// Every request in creation order
    pub async fn all_requests(&self) -> Vec<PointsRequest> {
        let state = self.state.read().await;
        state.requests.all()
    }

    /// Requests created by `requester`, in creation order
    pub async fn requests_by(&self, requester: Identity) -> Vec<PointsRequest> {
        let state = self.state.read().await;
        state.requests.by_requester(requester)
    }

    pub async fn pending_requests(&self) -> Vec<PointsRequest> {
        let state = self.state.read().await;
        state.requests.pending()
    }

    pub async fn request_count(&self) -> usize {
        let state = self.state.read().await;
        state.requests.len()
    }

    pub async fn has_completed_lab(&self, student: Identity, lab_id: &str) -> bool {
        let state = self.state.read().await;
        state.completions.is_completed(student, lab_id)
    }

    /// Labs with an outstanding or approved claim by `student`
    pub async fn completed_labs(&self, student: Identity) -> Vec<String> {
        let state = self.state.read().await;
        state.completions.labs_for(student)
    }

    // Lab catalog

    /// Set the reward for a lab (admin only). A reward of 0 disables the lab.
    pub async fn set_reward(&self, caller: Identity, lab_id: &str, amount: Amount) -> Result<()> {
        self.ensure_admin(caller)?;
        let mut state = self.state.write().await;
        let previous = state
            .catalog
            .set_reward(lab_id, amount)
            .inspect_err(|e| tracing::warn!(lab_id, by = %caller, error = %e, "set reward rejected"))?;

        tracing::info!(lab_id, amount, ?previous, by = %caller, "lab reward set");
        let _ = self.event_tx.send(PointsEvent::LabRewardSet {
            lab_id: lab_id.to_string(),
            amount,
            by: caller,
        });
        Ok(())
    }

    pub async fn get_reward(&self, lab_id: &str) -> Amount {
        let state = self.state.read().await;
        state.catalog.get_reward(lab_id)
    }

    /// Whether `lab_id` was ever given a reward, even one that is now 0.
    /// Only informational: claims depend on the reward alone.
    pub async fn is_lab_configured(&self, lab_id: &str) -> bool {
        let state = self.state.read().await;
        state.catalog.is_configured(lab_id)
    }

    /// Configured labs and their rewards, disabled ones included
    pub async fn labs(&self) -> Vec<(String, Amount)> {
        let state = self.state.read().await;
        state.catalog.labs()
    }

    // Ledger

    /// Create new points (tutors only)
    pub async fn mint(&self, caller: Identity, to: Identity, amount: Amount) -> Result<Amount> {
        self.ensure_approver(caller)?;
        let mut state = self.state.write().await;
        let balance = state
            .ledger
            .mint(to, amount)
            .inspect_err(|e| tracing::warn!(by = %caller, to = %to, amount, error = %e, "mint rejected"))?;

        tracing::info!(by = %caller, to = %to, amount, balance, "points minted");
        let _ = self.event_tx.send(PointsEvent::Minted {
            by: caller,
            to,
            amount,
        });
        Ok(balance)
    }

    /// Destroy points from the caller's own balance
    pub async fn burn(&self, caller: Identity, amount: Amount) -> Result<Amount> {
        let mut state = self.state.write().await;
        let balance = state
            .ledger
            .burn(caller, amount)
            .inspect_err(|e| tracing::warn!(from = %caller, amount, error = %e, "burn rejected"))?;

        tracing::info!(from = %caller, amount, balance, "points burned");
        let _ = self.event_tx.send(PointsEvent::Burned {
            from: caller,
            amount,
        });
        Ok(balance)
    }

    pub async fn transfer(&self, caller: Identity, to: Identity, amount: Amount) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .ledger
            .transfer(caller, to, amount)
            .inspect_err(|e| {
                tracing::warn!(from = %caller, to = %to, amount, error = %e, "transfer rejected");
            })?;

        tracing::debug!(from = %caller, to = %to, amount, "points transferred");
        let _ = self.event_tx.send(PointsEvent::Transferred {
            from: caller,
            to,
            amount,
        });
        Ok(())
    }

    /// Move points out of `owner`'s balance using the caller's allowance
    pub async fn transfer_from(
        &self,
        caller: Identity,
        owner: Identity,
        to: Identity,
        amount: Amount,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .ledger
            .transfer_from(caller, owner, to, amount)
            .inspect_err(|e| {
                tracing::warn!(
                    spender = %caller,
                    from = %owner,
                    to = %to,
                    amount,
                    error = %e,
                    "delegated transfer rejected"
                );
            })?;

        tracing::debug!(spender = %caller, from = %owner, to = %to, amount, "points transferred");
        let _ = self.event_tx.send(PointsEvent::Transferred {
            from: owner,
            to,
            amount,
        });
        Ok(())
    }

    /// Set the caller's allowance for `spender`, replacing any previous value
    pub async fn approve_allowance(
        &self,
        caller: Identity,
        spender: Identity,
        amount: Amount,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .ledger
            .approve_allowance(caller, spender, amount)
            .inspect_err(|e| {
                tracing::warn!(owner = %caller, spender = %spender, error = %e, "allowance rejected");
            })?;

        tracing::debug!(owner = %caller, spender = %spender, amount, "allowance set");
        let _ = self.event_tx.send(PointsEvent::AllowanceSet {
            owner: caller,
            spender,
            amount,
        });
        Ok(())
    }

    /// Bar an account from sending or receiving points (tutors only)
    pub async fn freeze(&self, caller: Identity, account: Identity) -> Result<()> {
        self.ensure_approver(caller)?;
        let mut state = self.state.write().await;
        state
            .ledger
            .freeze(account)
            .inspect_err(|e| tracing::warn!(account = %account, by = %caller, error = %e, "freeze rejected"))?;

        tracing::info!(account = %account, by = %caller, "account frozen");
        let _ = self.event_tx.send(PointsEvent::AccountFrozen {
            account,
            by: caller,
        });
        Ok(())
    }

    pub async fn unfreeze(&self, caller: Identity, account: Identity) -> Result<()> {
        self.ensure_approver(caller)?;
        let mut state = self.state.write().await;
        state
            .ledger
            .unfreeze(account)
            .inspect_err(|e| tracing::warn!(account = %account, by = %caller, error = %e, "unfreeze rejected"))?;

        tracing::info!(account = %account, by = %caller, "account unfrozen");
        let _ = self.event_tx.send(PointsEvent::AccountUnfrozen {
            account,
            by: caller,
        });
        Ok(())
    }

    pub async fn balance_of(&self, id: Identity) -> Amount {
        let state = self.state.read().await;
        state.ledger.balance_of(id)
    }

    pub async fn allowance(&self, owner: Identity, spender: Identity) -> Amount {
        let state = self.state.read().await;
        state.ledger.allowance(owner, spender)
    }

    pub async fn is_frozen(&self, id: Identity) -> bool {
        let state = self.state.read().await;
        state.ledger.is_frozen(id)
    }

    pub async fn total_supply(&self) -> Amount {
        let state = self.state.read().await;
        state.ledger.total_supply()
    }

    /// Non-zero balances, sorted by identity
    pub async fn accounts(&self) -> Vec<(Identity, Amount)> {
        let state = self.state.read().await;
        state.ledger.accounts()
    }

    // Checks

    fn ensure_participant(&self, caller: Identity) -> Result<()> {
        if !self.registry.is_approved_participant(caller) {
            tracing::warn!(caller = %caller, "caller is not an approved participant");
            return Err(PointsError::NotApprovedParticipant(caller));
        }
        Ok(())
    }

    fn ensure_approver(&self, caller: Identity) -> Result<()> {
        if !self.registry.has_approver_capability(caller) {
            tracing::warn!(caller = %caller, "caller lacks approver capability");
            return Err(PointsError::MissingCapability {
                caller,
                required: Capability::Approve,
            });
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: Identity) -> Result<()> {
        if !self.registry.has_admin_capability(caller) {
            tracing::warn!(caller = %caller, "caller lacks admin capability");
            return Err(PointsError::MissingCapability {
                caller,
                required: Capability::Admin,
            });
        }
        Ok(())
    }

    /// Pre-flight for payouts: the tutor's balance and the allowance granted
    /// to this engine must both cover `amount`
    fn check_funding(&self, ledger: &Ledger, approver: Identity, amount: Amount) -> Result<()> {
        let balance = ledger.balance_of(approver);
        if balance < amount {
            tracing::warn!(approver = %approver, balance, amount, "approver balance too low");
            return Err(PointsError::InsufficientBalance {
                account: approver,
                available: balance,
                required: amount,
            });
        }
        let allowance = ledger.allowance(approver, self.identity);
        if allowance < amount {
            tracing::warn!(approver = %approver, allowance, amount, "engine allowance too low");
            return Err(PointsError::InsufficientAllowance {
                owner: approver,
                spender: self.identity,
                available: allowance,
                required: amount,
            });
        }
        Ok(())
    }

    fn check_batch(&self, ids: &[RequestId]) -> Result<()> {
        if ids.is_empty() {
            return Err(PointsError::invalid("batch must contain at least one request id"));
        }
        if ids.len() > self.max_batch {
            return Err(PointsError::invalid(format!(
                "batch of {} exceeds the limit of {}",
                ids.len(),
                self.max_batch
            )));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(PointsError::invalid(format!(
                "request {} listed more than once",
                dup
            )));
        }
        Ok(())
    }

    // Events

    fn emit_created(&self, request: &PointsRequest) {
        let _ = self.event_tx.send(PointsEvent::RequestCreated {
            request_id: request.id,
            requester: request.requester,
            amount: request.amount,
            lab_id: request.lab_id.clone(),
            created_at: request.created_at,
        });
    }

    fn emit_approved(&self, request: &PointsRequest) {
        let _ = self.event_tx.send(PointsEvent::RequestApproved {
            request_id: request.id,
            approver: request.resolved_by.unwrap_or(Identity::NULL),
            requester: request.requester,
            amount: request.amount,
            resolved_at: request.resolved_at.unwrap_or(request.created_at),
        });
    }

    fn emit_rejected(&self, request: &PointsRequest, lab_reset: bool) {
        let _ = self.event_tx.send(PointsEvent::RequestRejected {
            request_id: request.id,
            approver: request.resolved_by.unwrap_or(Identity::NULL),
            requester: request.requester,
            resolved_at: request.resolved_at.unwrap_or(request.created_at),
        });
        if let (true, Some(lab_id)) = (lab_reset, &request.lab_id) {
            let _ = self.event_tx.send(PointsEvent::LabCompletionReset {
                student: request.requester,
                lab_id: lab_id.clone(),
            });
        }
    }
}

fn ensure_description(description: &str) -> Result<()> {
    if description.trim().is_empty() {
        return Err(PointsError::invalid("description must not be empty"));
    }
    Ok(())
}

/// Rule out every way a pre-funded batch payout could still fail: a frozen
/// or null endpoint, or a recipient balance overflowing once its payouts land
fn check_payouts(ledger: &Ledger, approver: Identity, requests: &[PointsRequest]) -> Result<()> {
    ledger.ensure_not_frozen(approver)?;

    let mut incoming: HashMap<Identity, Amount> = HashMap::new();
    for request in requests {
        if request.requester.is_null() {
            return Err(PointsError::ZeroAddress);
        }
        ledger.ensure_not_frozen(request.requester)?;
        if request.requester == approver {
            continue;
        }
        let sum = incoming.entry(request.requester).or_insert(0);
        *sum = sum.checked_add(request.amount).ok_or(PointsError::Overflow)?;
    }
    for (account, amount) in incoming {
        ledger
            .balance_of(account)
            .checked_add(amount)
            .ok_or(PointsError::Overflow)?;
    }
    Ok(())
}

/// Clear the completion flag of a rejected lab claim
fn reset_lab(completions: &mut CompletionTracker, request: &PointsRequest) -> bool {
    match &request.lab_id {
        Some(lab_id) => completions.clear(request.requester, lab_id),
        None => false,
    }
}
