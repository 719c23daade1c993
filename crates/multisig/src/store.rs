//! SQLite storage for multi-sig requests
//!
//! Writes go through `update_checked`, an optimistic read-modify-write
//! keyed on the request's version column. Two concurrent approvals on the
//! same request cannot both observe "second signature": the loser's update
//! matches zero rows and surfaces a version conflict.

use crate::request::{MultiSigRequest, RequestStatus, RequestType};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

/// Errors from the request store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Request {0} was modified concurrently")]
    VersionConflict(String),

    #[error("Corrupt row for request {id}: {field}")]
    CorruptRow { id: String, field: &'static str },
}

/// SQLite storage for multi-sig requests
pub struct RequestStore {
    conn: Mutex<Connection>,
}

impl RequestStore {
    /// Open (or create) a store at the given database path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "CREATE TABLE IF NOT EXISTS multisig_requests (
                id TEXT PRIMARY KEY,
                request_type TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                payload_hash TEXT NOT NULL,
                required_signatures INTEGER NOT NULL,
                signatures_json TEXT NOT NULL,
                status TEXT NOT NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                executed_at TEXT,
                execution_ref TEXT,
                rejection_reason TEXT,
                version INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_multisig_requests_status
             ON multisig_requests(status)",
            [],
        )?;

        Ok(())
    }

    /// Insert a freshly created request. Fails if the id already exists.
    pub fn insert(&self, request: &MultiSigRequest) -> Result<(), StoreError> {
        let signatures_json = serde_json::to_string(&request.signatures)?;
        let payload_json = request.payload.to_string();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO multisig_requests
             (id, request_type, payload_json, payload_hash, required_signatures,
              signatures_json, status, created_by, created_at, expires_at,
              executed_at, execution_ref, rejection_reason, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                request.id,
                request.request_type.as_str(),
                payload_json,
                request.payload_hash,
                request.required_signatures,
                signatures_json,
                request.status.as_str(),
                request.created_by,
                request.created_at.to_rfc3339(),
                request.expires_at.to_rfc3339(),
                request.executed_at.map(|t| t.to_rfc3339()),
                request.execution_ref,
                request.rejection_reason,
                request.version,
            ],
        )?;

        Ok(())
    }

    /// Get a request by ID
    pub fn get(&self, id: &str) -> Result<MultiSigRequest, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, request_type, payload_json, payload_hash, required_signatures,
                    signatures_json, status, created_by, created_at, expires_at,
                    executed_at, execution_ref, rejection_reason, version
             FROM multisig_requests WHERE id = ?1",
        )?;

        let row = stmt
            .query_row(params![id], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    request_type: row.get(1)?,
                    payload_json: row.get(2)?,
                    payload_hash: row.get(3)?,
                    required_signatures: row.get(4)?,
                    signatures_json: row.get(5)?,
                    status: row.get(6)?,
                    created_by: row.get(7)?,
                    created_at: row.get(8)?,
                    expires_at: row.get(9)?,
                    executed_at: row.get(10)?,
                    execution_ref: row.get(11)?,
                    rejection_reason: row.get(12)?,
                    version: row.get(13)?,
                })
            })
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(id.to_string()),
                other => StoreError::Database(other),
            })?;

        row.into_request()
    }

    /// Persist changes to a request, checking the optimistic version.
    ///
    /// On success the in-memory version is bumped to match the row.
    pub fn update_checked(&self, request: &mut MultiSigRequest) -> Result<(), StoreError> {
        let signatures_json = serde_json::to_string(&request.signatures)?;

        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE multisig_requests
             SET signatures_json = ?1,
                 status = ?2,
                 executed_at = ?3,
                 execution_ref = ?4,
                 rejection_reason = ?5,
                 version = version + 1
             WHERE id = ?6 AND version = ?7",
            params![
                signatures_json,
                request.status.as_str(),
                request.executed_at.map(|t| t.to_rfc3339()),
                request.execution_ref,
                request.rejection_reason,
                request.id,
                request.version,
            ],
        )?;

        if rows == 0 {
            // Distinguish a missing row from a lost race
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM multisig_requests WHERE id = ?1",
                params![request.id],
                |row| row.get::<_, i64>(0).map(|n| n > 0),
            )?;
            return if exists {
                Err(StoreError::VersionConflict(request.id.clone()))
            } else {
                Err(StoreError::NotFound(request.id.clone()))
            };
        }

        request.version += 1;
        Ok(())
    }

    /// List requests with a given status, newest first
    pub fn list_by_status(&self, status: RequestStatus) -> Result<Vec<MultiSigRequest>, StoreError> {
        self.list_where("WHERE status = ?1", params![status.as_str()], usize::MAX)
    }

    /// List all requests, newest first, up to `limit`
    pub fn list_all(&self, limit: usize) -> Result<Vec<MultiSigRequest>, StoreError> {
        self.list_where("", params![], limit)
    }

    fn list_where(
        &self,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
        limit: usize,
    ) -> Result<Vec<MultiSigRequest>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, request_type, payload_json, payload_hash, required_signatures,
                    signatures_json, status, created_by, created_at, expires_at,
                    executed_at, execution_ref, rejection_reason, version
             FROM multisig_requests {clause} ORDER BY created_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;

        let rows = stmt.query_map(args, |row| {
            Ok(RawRow {
                id: row.get(0)?,
                request_type: row.get(1)?,
                payload_json: row.get(2)?,
                payload_hash: row.get(3)?,
                required_signatures: row.get(4)?,
                signatures_json: row.get(5)?,
                status: row.get(6)?,
                created_by: row.get(7)?,
                created_at: row.get(8)?,
                expires_at: row.get(9)?,
                executed_at: row.get(10)?,
                execution_ref: row.get(11)?,
                rejection_reason: row.get(12)?,
                version: row.get(13)?,
            })
        })?;

        let mut requests = Vec::new();
        for row in rows.take(limit) {
            requests.push(row?.into_request()?);
        }
        Ok(requests)
    }

    /// Count requests by status
    pub fn count_by_status(&self, status: RequestStatus) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM multisig_requests WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Bulk-reject pending requests whose deadline has passed.
    ///
    /// Returns the number of requests transitioned.
    pub fn reject_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE multisig_requests
             SET status = 'rejected',
                 rejection_reason = 'expired before quorum',
                 version = version + 1
             WHERE status = 'pending' AND expires_at < ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(rows)
    }
}

/// Intermediate row representation before domain-type parsing
struct RawRow {
    id: String,
    request_type: String,
    payload_json: String,
    payload_hash: String,
    required_signatures: u8,
    signatures_json: String,
    status: String,
    created_by: String,
    created_at: String,
    expires_at: String,
    executed_at: Option<String>,
    execution_ref: Option<String>,
    rejection_reason: Option<String>,
    version: u64,
}

impl RawRow {
    fn into_request(self) -> Result<MultiSigRequest, StoreError> {
        let corrupt = |field: &'static str| StoreError::CorruptRow {
            id: self.id.clone(),
            field,
        };

        let request_type =
            RequestType::parse(&self.request_type).ok_or_else(|| corrupt("request_type"))?;
        let status = RequestStatus::parse(&self.status).ok_or_else(|| corrupt("status"))?;
        let payload = serde_json::from_str(&self.payload_json)?;
        let signatures = serde_json::from_str(&self.signatures_json)?;

        let parse_ts = |s: &str, field: &'static str| {
            chrono::DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&chrono::Utc))
                .map_err(|_| corrupt(field))
        };

        let created_at = parse_ts(&self.created_at, "created_at")?;
        let expires_at = parse_ts(&self.expires_at, "expires_at")?;
        let executed_at = match &self.executed_at {
            Some(s) => Some(parse_ts(s, "executed_at")?),
            None => None,
        };

        Ok(MultiSigRequest {
            id: self.id,
            request_type,
            payload,
            payload_hash: self.payload_hash,
            required_signatures: self.required_signatures,
            signatures,
            status,
            created_by: self.created_by,
            created_at,
            expires_at,
            executed_at,
            execution_ref: self.execution_ref,
            rejection_reason: self.rejection_reason,
            version: self.version,
        })
    }
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
    fn test_insert_and_get() {
        let store = RequestStore::in_memory().unwrap();
        let req = request();
        let id = req.id.clone();

        store.insert(&req).unwrap();
        let loaded = store.get(&id).unwrap();

        assert_eq!(loaded.id, id);
        assert_eq!(loaded.request_type, RequestType::TokenMint);
        assert_eq!(loaded.status, RequestStatus::Pending);
        assert_eq!(loaded.signatures.len(), 1);
        assert_eq!(loaded.version, 0);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let store = RequestStore::in_memory().unwrap();
        let req = request();

        store.insert(&req).unwrap();
        assert!(matches!(store.insert(&req), Err(StoreError::Database(_))));
    }

    #[test]
    fn test_update_checked_bumps_version() {
        let store = RequestStore::in_memory().unwrap();
        let mut req = request();
        store.insert(&req).unwrap();

        req.status = RequestStatus::Approved;
        store.update_checked(&mut req).unwrap();
        assert_eq!(req.version, 1);

        let loaded = store.get(&req.id).unwrap();
        assert_eq!(loaded.status, RequestStatus::Approved);
        assert_eq!(loaded.version, 1);
    }

    #[test]
    fn test_update_checked_detects_lost_race() {
        let store = RequestStore::in_memory().unwrap();
        let req = request();
        store.insert(&req).unwrap();

        // Two readers load the same version
        let mut first = store.get(&req.id).unwrap();
        let mut second = store.get(&req.id).unwrap();

        first.status = RequestStatus::Approved;
        store.update_checked(&mut first).unwrap();

        second.status = RequestStatus::Rejected;
        let result = store.update_checked(&mut second);
        assert!(matches!(result, Err(StoreError::VersionConflict(_))));

        // The first write is the one that stuck
        assert_eq!(store.get(&req.id).unwrap().status, RequestStatus::Approved);
    }

    #[test]
    fn test_update_missing_request() {
        let store = RequestStore::in_memory().unwrap();
        let mut req = request();

        let result = store.update_checked(&mut req);
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_list_and_count_by_status() {
        let store = RequestStore::in_memory().unwrap();

        for _ in 0..3 {
            store.insert(&request()).unwrap();
        }
        let mut executed = request();
        executed.status = RequestStatus::Executed;
        store.insert(&executed).unwrap();

        assert_eq!(store.list_by_status(RequestStatus::Pending).unwrap().len(), 3);
        assert_eq!(store.count_by_status(RequestStatus::Executed).unwrap(), 1);
        assert_eq!(store.list_all(10).unwrap().len(), 4);
        assert_eq!(store.list_all(2).unwrap().len(), 2);
    }

    #[test]
    fn test_reject_expired() {
        let store = RequestStore::in_memory().unwrap();

        let mut stale = request();
        stale.expires_at = chrono::Utc::now() - chrono::Duration::hours(1);
        store.insert(&stale).unwrap();
        store.insert(&request()).unwrap();

        let transitioned = store.reject_expired(chrono::Utc::now()).unwrap();
        assert_eq!(transitioned, 1);

        let loaded = store.get(&stale.id).unwrap();
        assert_eq!(loaded.status, RequestStatus::Rejected);
        assert_eq!(
            loaded.rejection_reason.as_deref(),
            Some("expired before quorum")
        );
    }
}
