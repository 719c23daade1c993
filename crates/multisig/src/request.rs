//! Multi-sig request data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Kind of privileged operation a request authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// Create the fund token (singleton; rejected if one already exists)
    TokenCreation,
    /// Mint additional supply to the treasury
    TokenMint,
    /// Burn supply from the treasury
    TokenBurn,
    /// Reserved; no executor is wired in this scope
    InterestDistribution,
    /// Change the interest engine's annual rate (no ledger call)
    RateChange,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::TokenCreation => "token_creation",
            RequestType::TokenMint => "token_mint",
            RequestType::TokenBurn => "token_burn",
            RequestType::InterestDistribution => "interest_distribution",
            RequestType::RateChange => "rate_change",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "token_creation" => Some(RequestType::TokenCreation),
            "token_mint" => Some(RequestType::TokenMint),
            "token_burn" => Some(RequestType::TokenBurn),
            "interest_distribution" => Some(RequestType::InterestDistribution),
            "rate_change" => Some(RequestType::RateChange),
            _ => None,
        }
    }
}

/// Status of a multi-sig request
///
/// Transitions are monotonic: `executed` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting the second signature
    Pending,
    /// Quorum reached, execution not yet completed
    Approved,
    /// Expired, explicitly rejected, or execution failed
    Rejected,
    /// Ledger operation succeeded
    Executed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Executed => "executed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            "executed" => Some(RequestStatus::Executed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Rejected | RequestStatus::Executed)
    }
}

/// A manager's recorded approval on a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedSignature {
    pub manager_id: String,
    pub signed_at: DateTime<Utc>,
}

/// A privileged-operation request moving through the approval state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSigRequest {
    /// Unique identifier ("MSR-XXXXXXXX")
    pub id: String,

    pub request_type: RequestType,

    /// Type-specific payload (token parameters, new rate value, ...)
    pub payload: serde_json::Value,

    /// SHA256 of the canonical payload JSON, for audit verification
    pub payload_hash: String,

    /// Signatures required to reach quorum (2 for this system)
    pub required_signatures: u8,

    /// Ordered signatures; at most one per manager
    pub signatures: Vec<RecordedSignature>,

    pub status: RequestStatus,

    /// Manager who opened the request (also its first signer)
    pub created_by: String,

    pub created_at: DateTime<Utc>,

    /// Absolute deadline: created_at + 24h
    pub expires_at: DateTime<Utc>,

    /// Populated only on successful execution
    pub executed_at: Option<DateTime<Utc>>,
    pub execution_ref: Option<String>,

    pub rejection_reason: Option<String>,

    /// Optimistic-concurrency version, bumped on every persisted write
    pub version: u64,
}

impl MultiSigRequest {
    /// Create a new pending request carrying the initiator's signature.
    pub fn new(
        request_type: RequestType,
        payload: serde_json::Value,
        created_by: &str,
        required_signatures: u8,
        expiry_hours: i64,
    ) -> Self {
        let id = format!(
            "MSR-{}",
            uuid::Uuid::new_v4().to_string()[..8].to_uppercase()
        );
        let payload_hash = hash_payload(&payload);
        let now = Utc::now();

        Self {
            id,
            request_type,
            payload,
            payload_hash,
            required_signatures,
            signatures: vec![RecordedSignature {
                manager_id: created_by.to_string(),
                signed_at: now,
            }],
            status: RequestStatus::Pending,
            created_by: created_by.to_string(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(expiry_hours),
            executed_at: None,
            execution_ref: None,
            rejection_reason: None,
            version: 0,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn has_quorum(&self) -> bool {
        self.signatures.len() >= self.required_signatures as usize
    }

    pub fn has_signed(&self, manager_id: &str) -> bool {
        self.signatures.iter().any(|s| s.manager_id == manager_id)
    }

    /// Append a signature; returns false if this manager already signed.
    pub fn add_signature(&mut self, manager_id: &str, signed_at: DateTime<Utc>) -> bool {
        if self.has_signed(manager_id) {
            return false;
        }
        self.signatures.push(RecordedSignature {
            manager_id: manager_id.to_string(),
            signed_at,
        });
        true
    }

    pub fn signers(&self) -> Vec<&str> {
        self.signatures.iter().map(|s| s.manager_id.as_str()).collect()
    }
}

/// SHA256 hash of the canonical payload JSON
pub(crate) fn hash_payload(payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> MultiSigRequest {
        MultiSigRequest::new(
            RequestType::TokenMint,
            json!({"amount": "1000"}),
            "manager1",
            2,
            24,
        )
    }

    #[test]
    fn test_new_request_carries_initiator_signature() {
        let req = request();

        assert!(req.id.starts_with("MSR-"));
        assert_eq!(req.status, RequestStatus::Pending);
        assert_eq!(req.signatures.len(), 1);
        assert_eq!(req.signatures[0].manager_id, "manager1");
        assert!(req.has_signed("manager1"));
        assert!(!req.has_quorum());
        assert!(!req.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_second_distinct_signature_reaches_quorum() {
        let mut req = request();

        assert!(req.add_signature("manager2", Utc::now()));
        assert!(req.has_quorum());
        assert_eq!(req.signers(), vec!["manager1", "manager2"]);
    }

    #[test]
    fn test_duplicate_signature_not_recorded() {
        let mut req = request();

        assert!(!req.add_signature("manager1", Utc::now()));
        assert_eq!(req.signatures.len(), 1);
    }

    #[test]
    fn test_expiry_window() {
        let mut req = request();
        req.expires_at = Utc::now() - chrono::Duration::minutes(1);

        assert!(req.is_expired_at(Utc::now()));
    }

    #[test]
    fn test_payload_hash_deterministic() {
        let a = hash_payload(&json!({"amount": "1000"}));
        let b = hash_payload(&json!({"amount": "1000"}));
        let c = hash_payload(&json!({"amount": "2000"}));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_status_string_mapping() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Executed,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::parse("unknown"), None);
        assert!(RequestStatus::Executed.is_terminal());
        assert!(!RequestStatus::Approved.is_terminal());
    }

    #[test]
    fn test_request_type_string_mapping() {
        for kind in [
            RequestType::TokenCreation,
            RequestType::TokenMint,
            RequestType::TokenBurn,
            RequestType::InterestDistribution,
            RequestType::RateChange,
        ] {
            assert_eq!(RequestType::parse(kind.as_str()), Some(kind));
        }
    }
}
