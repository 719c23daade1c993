//! Multi-sig approval workflow logic
//!
//! Authorization and execution are separate steps: `approve` transitions a
//! request into `approved` and persists it, then drives the idempotent
//! `execute` step. A crash between the two leaves an `approved` request
//! that can be retried safely; terminal requests never re-invoke the
//! executor.

use crate::request::{MultiSigRequest, RequestStatus, RequestType};
use crate::store::{RequestStore, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

/// Configuration for the multi-sig workflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Number of distinct manager signatures required (2 for this system)
    pub required_signatures: u8,

    /// Hours before a pending request expires
    pub expiry_hours: i64,

    /// Registered manager identities allowed to initiate and approve
    pub managers: Vec<String>,
}

impl WorkflowConfig {
    pub fn two_of(managers: Vec<String>) -> Self {
        Self {
            required_signatures: 2,
            expiry_hours: 24,
            managers,
        }
    }

    fn is_manager(&self, id: &str) -> bool {
        self.managers.iter().any(|m| m == id)
    }
}

/// Errors from the multi-sig workflow
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0} is not a registered manager")]
    NotAuthorized(String),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Request {id} is {status} and cannot accept this operation", status = .status.as_str())]
    InvalidState { id: String, status: RequestStatus },

    #[error("Request {0} expired before quorum")]
    Expired(String),

    #[error("Manager {manager} already signed request {id}")]
    DuplicateSignature { id: String, manager: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No executor is wired for {0:?} requests")]
    NoExecutor(RequestType),

    #[error("Execution of request {id} failed: {reason}")]
    Execution { id: String, reason: String },
}

/// Errors an executor can report back to the workflow
#[derive(Debug, Error)]
pub enum ExecError {
    /// Singleton or uniqueness precondition violated
    #[error("{0}")]
    Conflict(String),

    /// Request type has no wired executor
    #[error("no executor for {0}")]
    NoExecutor(String),

    /// The external ledger (or another collaborator) rejected the operation
    #[error("{0}")]
    Failed(String),
}

/// Result of a successful execution
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Ledger transaction reference, when the operation touched the ledger
    pub reference: Option<String>,

    /// Free-form detail for audit display
    pub detail: serde_json::Value,
}

/// Collaborator that carries out an approved request.
///
/// `validate` runs at initiation (singleton pre-checks); `execute` runs at
/// most once per request, on the transition into `approved`.
#[async_trait]
pub trait ExecuteRequest: Send + Sync {
    async fn validate(&self, request: &MultiSigRequest) -> Result<(), ExecError>;

    async fn execute(&self, request: &MultiSigRequest) -> Result<ExecutionOutcome, ExecError>;
}

/// Counts of requests per status
#[derive(Debug, Clone)]
pub struct WorkflowStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub executed: usize,
}

/// Two-manager approval workflow for privileged treasury operations
pub struct MultiSigWorkflow {
    store: RequestStore,
    config: WorkflowConfig,
    executor: Arc<dyn ExecuteRequest>,
}

impl MultiSigWorkflow {
    pub fn new(store: RequestStore, config: WorkflowConfig, executor: Arc<dyn ExecuteRequest>) -> Self {
        Self {
            store,
            config,
            executor,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Load a request, surfacing a missing id as `NotFound` rather than a
    /// store-layer error.
    fn fetch(&self, request_id: &str) -> Result<MultiSigRequest, WorkflowError> {
        self.store.get(request_id).map_err(|e| match e {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Store(other),
        })
    }

    /// Open a new request in `pending` with the initiator's signature.
    pub async fn initiate(
        &self,
        request_type: RequestType,
        payload: serde_json::Value,
        initiator: &str,
    ) -> Result<MultiSigRequest, WorkflowError> {
        if !self.config.is_manager(initiator) {
            return Err(WorkflowError::NotAuthorized(initiator.to_string()));
        }

        let request = MultiSigRequest::new(
            request_type,
            payload,
            initiator,
            self.config.required_signatures,
            self.config.expiry_hours,
        );

        // Singleton preconditions (e.g. token already created) fail fast,
        // before anything is persisted.
        self.executor
            .validate(&request)
            .await
            .map_err(|e| match e {
                ExecError::Conflict(reason) => WorkflowError::Conflict(reason),
                other => WorkflowError::Execution {
                    id: request.id.clone(),
                    reason: other.to_string(),
                },
            })?;

        self.store.insert(&request)?;

        tracing::info!(
            request_id = %request.id,
            request_type = request_type.as_str(),
            initiator,
            expires_at = %request.expires_at,
            "multi-sig request initiated"
        );

        Ok(request)
    }

    /// Record an approval. On quorum the request transitions to `approved`
    /// and execution is driven synchronously; the returned request reflects
    /// the final state.
    pub async fn approve(
        &self,
        request_id: &str,
        approver: &str,
    ) -> Result<MultiSigRequest, WorkflowError> {
        if !self.config.is_manager(approver) {
            return Err(WorkflowError::NotAuthorized(approver.to_string()));
        }

        loop {
            let mut request = self.fetch(request_id)?;

            if request.status != RequestStatus::Pending {
                return Err(WorkflowError::InvalidState {
                    id: request.id,
                    status: request.status,
                });
            }

            let now = Utc::now();
            if request.is_expired_at(now) {
                // The transition is committed even though the call fails.
                request.status = RequestStatus::Rejected;
                request.rejection_reason = Some("expired before quorum".to_string());
                match self.store.update_checked(&mut request) {
                    Ok(()) => return Err(WorkflowError::Expired(request.id)),
                    Err(StoreError::VersionConflict(_)) => continue,
                    Err(e) => return Err(e.into()),
                }
            }

            if request.has_signed(approver) {
                return Err(WorkflowError::DuplicateSignature {
                    id: request.id,
                    manager: approver.to_string(),
                });
            }

            request.add_signature(approver, now);
            let quorum = request.has_quorum();
            if quorum {
                request.status = RequestStatus::Approved;
            }

            match self.store.update_checked(&mut request) {
                Ok(()) => {
                    tracing::info!(
                        request_id = %request.id,
                        approver,
                        signatures = request.signatures.len(),
                        quorum,
                        "approval recorded"
                    );

                    if quorum {
                        return self.execute(request_id).await;
                    }
                    return Ok(request);
                }
                // Lost the race: re-read and re-evaluate. The winner's
                // write flipped the status, so the retry observes it.
                Err(StoreError::VersionConflict(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Idempotent execution step, keyed by request id.
    ///
    /// - `executed`: returns the stored result without touching the ledger
    /// - `approved`: dispatches to the executor (safe retry after a crash
    ///   between quorum and ledger completion)
    /// - anything else: `InvalidState`
    pub async fn execute(&self, request_id: &str) -> Result<MultiSigRequest, WorkflowError> {
        let mut request = self.fetch(request_id)?;

        match request.status {
            RequestStatus::Executed => return Ok(request),
            RequestStatus::Approved => {}
            status => {
                return Err(WorkflowError::InvalidState {
                    id: request.id,
                    status,
                })
            }
        }

        // Claim the request before dispatching: the version bump makes
        // concurrent retries collide here instead of both reaching the
        // executor. A crash after the claim leaves the request approved
        // and still retryable.
        match self.store.update_checked(&mut request) {
            Ok(()) => {}
            Err(StoreError::VersionConflict(_)) => {
                let current = self.fetch(request_id)?;
                return match current.status {
                    RequestStatus::Executed => Ok(current),
                    RequestStatus::Approved => Err(WorkflowError::Conflict(format!(
                        "request {request_id} is already being executed"
                    ))),
                    status => Err(WorkflowError::InvalidState {
                        id: current.id,
                        status,
                    }),
                };
            }
            Err(e) => return Err(e.into()),
        }

        match self.executor.execute(&request).await {
            Ok(outcome) => {
                request.status = RequestStatus::Executed;
                request.executed_at = Some(Utc::now());
                request.execution_ref = outcome.reference;
                self.store.update_checked(&mut request)?;

                tracing::info!(
                    request_id = %request.id,
                    request_type = request.request_type.as_str(),
                    execution_ref = request.execution_ref.as_deref().unwrap_or("-"),
                    "request executed"
                );

                Ok(request)
            }
            Err(error) => {
                // Failure is terminal for this request: record it, then
                // re-raise. Never retried automatically.
                let reason = error.to_string();
                request.status = RequestStatus::Rejected;
                request.rejection_reason = Some(reason.clone());
                self.store.update_checked(&mut request)?;

                tracing::warn!(
                    request_id = %request.id,
                    request_type = request.request_type.as_str(),
                    %reason,
                    "request execution failed"
                );

                match error {
                    ExecError::NoExecutor(_) => {
                        Err(WorkflowError::NoExecutor(request.request_type))
                    }
                    _ => Err(WorkflowError::Execution {
                        id: request.id,
                        reason,
                    }),
                }
            }
        }
    }

    /// Explicitly reject a pending request.
    pub fn reject(
        &self,
        request_id: &str,
        manager: &str,
        reason: Option<&str>,
    ) -> Result<MultiSigRequest, WorkflowError> {
        if !self.config.is_manager(manager) {
            return Err(WorkflowError::NotAuthorized(manager.to_string()));
        }

        let mut request = self.fetch(request_id)?;
        if request.status != RequestStatus::Pending {
            return Err(WorkflowError::InvalidState {
                id: request.id,
                status: request.status,
            });
        }

        request.status = RequestStatus::Rejected;
        request.rejection_reason = Some(
            reason
                .map(|r| format!("rejected by {manager}: {r}"))
                .unwrap_or_else(|| format!("rejected by {manager}")),
        );
        self.store.update_checked(&mut request)?;

        Ok(request)
    }

    /// Pending, unexpired requests still awaiting the given manager's
    /// signature - the queue each manager acts on.
    pub fn list_pending(&self, excluding_manager: &str) -> Result<Vec<MultiSigRequest>, WorkflowError> {
        // Expiry is enforced lazily; sweep before listing.
        self.store.reject_expired(Utc::now())?;

        let pending = self.store.list_by_status(RequestStatus::Pending)?;
        Ok(pending
            .into_iter()
            .filter(|r| !r.has_signed(excluding_manager))
            .collect())
    }

    /// Full history, optionally filtered by status.
    ///
    /// Pagination is limit-only (newest first); there is no offset or
    /// cursor on the CLI surface.
    pub fn list_all(
        &self,
        status: Option<RequestStatus>,
        limit: usize,
    ) -> Result<Vec<MultiSigRequest>, WorkflowError> {
        match status {
            Some(status) => Ok(self.store.list_by_status(status)?),
            None => Ok(self.store.list_all(limit)?),
        }
    }

    /// Get a single request by id (expiry checked and committed lazily).
    pub fn get(&self, request_id: &str) -> Result<MultiSigRequest, WorkflowError> {
        let mut request = self.fetch(request_id)?;

        if request.status == RequestStatus::Pending && request.is_expired_at(Utc::now()) {
            request.status = RequestStatus::Rejected;
            request.rejection_reason = Some("expired before quorum".to_string());
            self.store.update_checked(&mut request)?;
        }

        Ok(request)
    }

    /// Counts per status
    pub fn stats(&self) -> Result<WorkflowStats, WorkflowError> {
        Ok(WorkflowStats {
            pending: self.store.count_by_status(RequestStatus::Pending)?,
            approved: self.store.count_by_status(RequestStatus::Approved)?,
            rejected: self.store.count_by_status(RequestStatus::Rejected)?,
            executed: self.store.count_by_status(RequestStatus::Executed)?,
        })
    }
}
