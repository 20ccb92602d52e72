//! Call history records
//!
//! Append-only terminal record of a call, written best-effort when a session
//! reaches a terminal state. The store upserts by call id so re-delivered
//! terminal callbacks cannot duplicate a record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::call_session::{CallSession, CallState};

/// Terminal record of one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHistoryRecord {
    pub call_id: String,
    pub status: CallState,
    pub from: String,
    pub to: String,
    /// Customer-facing number, by direction
    pub number: String,
    pub duration_secs: u64,
    /// Agent/user the call is attributed to
    pub user_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CallHistoryRecord {
    /// Build a record from a session that reached a terminal state
    pub fn from_session(session: &CallSession, duration_secs: u64) -> Self {
        Self {
            call_id: session.call_id.clone(),
            status: session.state,
            from: session.from.clone(),
            to: session.to.clone(),
            number: session.customer_number().to_string(),
            duration_secs,
            user_id: session.owner_user_id.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Call Log store interface
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CallHistoryRepository: Send + Sync {
    /// Insert or replace the record for a call id
    async fn upsert(&self, record: CallHistoryRecord) -> Result<(), String>;

    /// Most recent records, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<CallHistoryRecord>, String>;
}

/// In-memory Call Log store
pub struct InMemoryCallHistoryRepository {
    records: RwLock<HashMap<String, CallHistoryRecord>>,
}

impl InMemoryCallHistoryRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCallHistoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CallHistoryRepository for InMemoryCallHistoryRepository {
    async fn upsert(&self, record: CallHistoryRecord) -> Result<(), String> {
        let mut records = self.records.write().await;
        records.insert(record.call_id.clone(), record);
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<CallHistoryRecord>, String> {
        let records = self.records.read().await;
        let mut all: Vec<CallHistoryRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call_session::{CallDirection, OriginMode};

    fn terminal_session() -> CallSession {
        let mut session = CallSession::new(
            "CA500".to_string(),
            CallDirection::Outbound,
            OriginMode::Server,
            "+15551000".to_string(),
            "+15550002".to_string(),
            CallState::InProgress,
            "conf_15550002_CA500".to_string(),
        )
        .with_owner(Some("user-7".to_string()));
        session.apply_transition(CallState::Completed);
        session
    }

    #[test]
    fn test_record_from_session() {
        let record = CallHistoryRecord::from_session(&terminal_session(), 42);

        assert_eq!(record.call_id, "CA500");
        assert_eq!(record.status, CallState::Completed);
        assert_eq!(record.number, "+15550002");
        assert_eq!(record.duration_secs, 42);
        assert_eq!(record.user_id.as_deref(), Some("user-7"));
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_call_id() {
        let repo = InMemoryCallHistoryRepository::new();

        let mut record = CallHistoryRecord::from_session(&terminal_session(), 10);
        repo.upsert(record.clone()).await.unwrap();
        record.duration_secs = 42;
        repo.upsert(record).await.unwrap();

        let recent = repo.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].duration_secs, 42);
    }
}
