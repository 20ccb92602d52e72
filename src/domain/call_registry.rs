//! Active call registry
//!
//! Single source of truth for in-flight calls. Each session lives behind its
//! own async mutex so that concurrent handlers for the same call id (a status
//! callback racing an accept request, say) serialize, while handlers for
//! different call ids never contend.

use crate::domain::call_session::CallSession;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one registered session
pub type SessionHandle = Arc<Mutex<CallSession>>;

/// Registry of in-flight calls keyed by provider call id
pub struct ActiveCallRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl ActiveCallRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session, replacing any previous entry for the same call id
    pub async fn insert(&self, session: CallSession) -> SessionHandle {
        let handle = Arc::new(Mutex::new(session.clone()));
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.call_id, handle.clone());
        handle
    }

    /// Look up a session handle. Absent ids return `None`; late provider
    /// callbacks for already-cleaned-up calls are legitimate.
    pub async fn get(&self, call_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(call_id).cloned()
    }

    /// Remove a session, returning its handle if it was present
    pub async fn remove(&self, call_id: &str) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(call_id)
    }

    /// Locate the session whose agent leg carries the given id
    pub async fn find_by_agent_call_id(&self, agent_call_id: &str) -> Option<SessionHandle> {
        for handle in self.handles().await {
            let session = handle.lock().await;
            if session.agent_call_id.as_deref() == Some(agent_call_id) {
                drop(session);
                return Some(handle);
            }
        }
        None
    }

    /// Snapshot of all current sessions (for the operational API)
    pub async fn snapshot(&self) -> Vec<CallSession> {
        let handles = self.handles().await;
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            out.push(handle.lock().await.clone());
        }
        out
    }

    /// Clone out the current handles so entry locks are never awaited while
    /// the registry guard is held; a held entry must not stall registration
    /// of unrelated calls.
    async fn handles(&self) -> Vec<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ActiveCallRegistry {
    fn default() -> Self {
        Self::new()
    }
}
