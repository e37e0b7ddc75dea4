//! JSON command interface
//!
//! One tagged message per engine operation. Every call names its caller
//! explicitly; the session trusts whoever feeds it commands.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{PointsEngine, PointsRequest, RequestId};
use crate::error::{ErrorKind, PointsError, Result};
use crate::models::{Amount, Identity};
use crate::registry::{Capability, MemoryRegistry, RegisteredParticipant};

/// Commands accepted by a session.
///
/// Amounts are plain JSON integers up to `u64::MAX`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Register an identity with the registry
    RegisterParticipant { id: Identity, name: String },
    /// Vet a registered identity
    ApproveParticipant { id: Identity },
    /// Withdraw the vetting of a registered identity
    RevokeParticipant { id: Identity },
    ListParticipants,
    GrantCapability { id: Identity, capability: Capability },
    RevokeCapability { id: Identity, capability: Capability },

    /// Ask for points
    RequestPoints {
        caller: Identity,
        amount: u64,
        description: String,
    },
    /// Claim a lab's reward
    ClaimLab {
        caller: Identity,
        lab_id: String,
        description: String,
    },
    FulfillRequest { caller: Identity, request_id: RequestId },
    RejectRequest { caller: Identity, request_id: RequestId },
    BatchFulfill {
        caller: Identity,
        request_ids: Vec<RequestId>,
    },
    BatchReject {
        caller: Identity,
        request_ids: Vec<RequestId>,
    },
    GetRequest { request_id: RequestId },
    /// List requests, optionally for one requester and/or only pending ones
    ListRequests {
        #[serde(default)]
        requester: Option<Identity>,
        #[serde(default)]
        pending_only: bool,
    },

    SetReward {
        caller: Identity,
        lab_id: String,
        amount: u64,
    },
    GetReward { lab_id: String },
    ListLabs,

    Mint {
        caller: Identity,
        to: Identity,
        amount: u64,
    },
    Burn { caller: Identity, amount: u64 },
    Transfer {
        caller: Identity,
        to: Identity,
        amount: u64,
    },
    TransferFrom {
        caller: Identity,
        owner: Identity,
        to: Identity,
        amount: u64,
    },
    ApproveAllowance {
        caller: Identity,
        spender: Identity,
        amount: u64,
    },
    Freeze { caller: Identity, account: Identity },
    Unfreeze { caller: Identity, account: Identity },
    Balance { account: Identity },
    Allowance { owner: Identity, spender: Identity },
    /// Balance, frozen flag and lab completions of one account
    AccountStatus { account: Identity },
    TotalSupply,
    EngineInfo,
}

/// A configured lab and its reward
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabReward {
    pub lab_id: String,
    pub reward: Amount,
}

/// Responses produced by a session
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command applied, nothing to report
    Ok,
    Participant { participant: RegisteredParticipant },
    Participants { participants: Vec<RegisteredParticipant> },
    RequestCreated { request_id: RequestId },
    Request { request: PointsRequest },
    Requests { requests: Vec<PointsRequest> },
    /// `configured` tells a disabled lab (reward 0) apart from an unknown one
    Reward {
        lab_id: String,
        reward: Amount,
        configured: bool,
    },
    Labs { labs: Vec<LabReward> },
    Balance { account: Identity, balance: Amount },
    Allowance {
        owner: Identity,
        spender: Identity,
        amount: Amount,
    },
    Account {
        account: Identity,
        balance: Amount,
        frozen: bool,
        completed_labs: Vec<String>,
    },
    TotalSupply { total_supply: Amount },
    EngineInfo { engine_id: Identity },
    /// Command failed; nothing was applied
    Error { kind: ErrorKind, message: String },
}

impl Response {
    fn from_error(err: &PointsError) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }
}

/// An engine together with the registry it consults
#[derive(Clone)]
pub struct Session {
    engine: Arc<PointsEngine>,
    registry: Arc<MemoryRegistry>,
}

impl Session {
    pub fn new(engine: Arc<PointsEngine>, registry: Arc<MemoryRegistry>) -> Self {
        Self { engine, registry }
    }

    pub fn engine(&self) -> &Arc<PointsEngine> {
        &self.engine
    }

    /// Parse and execute one JSON command
    pub async fn handle_line(&self, line: &str) -> Response {
        match serde_json::from_str::<Command>(line) {
            Ok(command) => self.handle(command).await,
            Err(e) => Response::Error {
                kind: ErrorKind::InvalidArgument,
                message: format!("Invalid command: {}", e),
            },
        }
    }

    pub async fn handle(&self, command: Command) -> Response {
        tracing::debug!(?command, "dispatching command");
        match self.execute(command).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, kind = e.kind().as_str(), "command failed");
                Response::from_error(&e)
            }
        }
    }

    async fn execute(&self, command: Command) -> Result<Response> {
        let engine = &self.engine;
        let response = match command {
            Command::RegisterParticipant { id, name } => Response::Participant {
                participant: self.registry.register(id, name),
            },
            Command::ApproveParticipant { id } => {
                self.registry_update(id, self.registry.approve(id))?
            }
            Command::RevokeParticipant { id } => {
                self.registry_update(id, self.registry.revoke_approval(id))?
            }
            Command::ListParticipants => Response::Participants {
                participants: self.registry.list(),
            },
            Command::GrantCapability { id, capability } => {
                self.registry_update(id, self.registry.grant(id, capability))?
            }
            Command::RevokeCapability { id, capability } => {
                self.registry_update(id, self.registry.revoke(id, capability))?
            }

            Command::RequestPoints {
                caller,
                amount,
                description,
            } => Response::RequestCreated {
                request_id: engine
                    .request_points(caller, Amount::from(amount), &description)
                    .await?,
            },
            Command::ClaimLab {
                caller,
                lab_id,
                description,
            } => Response::RequestCreated {
                request_id: engine.claim_lab(caller, &lab_id, &description).await?,
            },
            Command::FulfillRequest { caller, request_id } => Response::Request {
                request: engine.fulfill_points_request(caller, request_id).await?,
            },
            Command::RejectRequest { caller, request_id } => Response::Request {
                request: engine.reject_points_request(caller, request_id).await?,
            },
            Command::BatchFulfill {
                caller,
                request_ids,
            } => Response::Requests {
                requests: engine.batch_fulfill(caller, &request_ids).await?,
            },
            Command::BatchReject {
                caller,
                request_ids,
            } => Response::Requests {
                requests: engine.batch_reject(caller, &request_ids).await?,
            },
            Command::GetRequest { request_id } => Response::Request {
                request: engine
                    .get_points_request(request_id)
                    .await
                    .ok_or(PointsError::RequestNotFound(request_id))?,
            },
            Command::ListRequests {
                requester,
                pending_only,
            } => {
                let requests = match requester {
                    Some(requester) => engine.requests_by(requester).await,
                    None => engine.all_requests().await,
                };
                Response::Requests {
                    requests: requests
                        .into_iter()
                        .filter(|r| !pending_only || r.is_pending())
                        .collect(),
                }
            }

            Command::SetReward {
                caller,
                lab_id,
                amount,
            } => {
                engine
                    .set_reward(caller, &lab_id, Amount::from(amount))
                    .await?;
                Response::Ok
            }
            Command::GetReward { lab_id } => {
                let reward = engine.get_reward(&lab_id).await;
                let configured = engine.is_lab_configured(&lab_id).await;
                Response::Reward {
                    lab_id,
                    reward,
                    configured,
                }
            }
            Command::ListLabs => Response::Labs {
                labs: engine
                    .labs()
                    .await
                    .into_iter()
                    .map(|(lab_id, reward)| LabReward { lab_id, reward })
                    .collect(),
            },

            Command::Mint { caller, to, amount } => {
                let balance = engine.mint(caller, to, Amount::from(amount)).await?;
                Response::Balance {
                    account: to,
                    balance,
                }
            }
            Command::Burn { caller, amount } => {
                let balance = engine.burn(caller, Amount::from(amount)).await?;
                Response::Balance {
                    account: caller,
                    balance,
                }
            }
            Command::Transfer { caller, to, amount } => {
                engine.transfer(caller, to, Amount::from(amount)).await?;
                Response::Ok
            }
            Command::TransferFrom {
                caller,
                owner,
                to,
                amount,
            } => {
                engine
                    .transfer_from(caller, owner, to, Amount::from(amount))
                    .await?;
                Response::Ok
            }
            Command::ApproveAllowance {
                caller,
                spender,
                amount,
            } => {
                engine
                    .approve_allowance(caller, spender, Amount::from(amount))
                    .await?;
                Response::Allowance {
                    owner: caller,
                    spender,
                    amount: Amount::from(amount),
                }
            }
            Command::Freeze { caller, account } => {
                engine.freeze(caller, account).await?;
                Response::Ok
            }
            Command::Unfreeze { caller, account } => {
                engine.unfreeze(caller, account).await?;
                Response::Ok
            }
            Command::Balance { account } => Response::Balance {
                account,
                balance: engine.balance_of(account).await,
            },
            Command::Allowance { owner, spender } => Response::Allowance {
                owner,
                spender,
                amount: engine.allowance(owner, spender).await,
            },
            Command::AccountStatus { account } => Response::Account {
                account,
                balance: engine.balance_of(account).await,
                frozen: engine.is_frozen(account).await,
                completed_labs: engine.completed_labs(account).await,
            },
            Command::TotalSupply => Response::TotalSupply {
                total_supply: engine.total_supply().await,
            },
            Command::EngineInfo => Response::EngineInfo {
                engine_id: engine.engine_identity(),
            },
        };
        Ok(response)
    }

    fn registry_update(&self, id: Identity, found: bool) -> Result<Response> {
        if !found {
            return Err(PointsError::invalid(format!("unknown participant: {}", id)));
        }
        let participant = self
            .registry
            .get(id)
            .ok_or_else(|| PointsError::invalid(format!("unknown participant: {}", id)))?;
        Ok(Response::Participant { participant })
    }
}
