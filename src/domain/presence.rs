//! Agent presence tracking
//!
//! One entry per connected agent client, keyed by the connection id assigned
//! at WebSocket connect time. An entry exists iff its channel is connected;
//! disconnect removes it unconditionally and never touches call sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Agent availability status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Ready to take calls
    Available,
    /// Connected but occupied
    Busy,
    /// Client reported itself offline; entry removed on disconnect
    Offline,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Available => "available",
            AgentStatus::Busy => "busy",
            AgentStatus::Offline => "offline",
        }
    }
}

/// One connected agent client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPresence {
    pub connection_id: Uuid,
    pub status: AgentStatus,
    pub connected_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Registry of connected agents
pub struct AgentPresenceRegistry {
    agents: RwLock<HashMap<Uuid, AgentPresence>>,
}

impl AgentPresenceRegistry {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection as available and return its presence entry
    pub async fn connect(&self, connection_id: Uuid) -> AgentPresence {
        let now = Utc::now();
        let presence = AgentPresence {
            connection_id,
            status: AgentStatus::Available,
            connected_at: now,
            last_seen_at: now,
        };
        let mut agents = self.agents.write().await;
        agents.insert(connection_id, presence.clone());
        presence
    }

    /// Remove a connection. Removal is unconditional; a bridged call keeps
    /// running even when its initiating agent drops.
    pub async fn disconnect(&self, connection_id: &Uuid) -> bool {
        let mut agents = self.agents.write().await;
        agents.remove(connection_id).is_some()
    }

    /// Overwrite an agent's status
    pub async fn update_status(&self, connection_id: &Uuid, status: AgentStatus) -> bool {
        let mut agents = self.agents.write().await;
        match agents.get_mut(connection_id) {
            Some(agent) => {
                agent.status = status;
                agent.last_seen_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub async fn get(&self, connection_id: &Uuid) -> Option<AgentPresence> {
        let agents = self.agents.read().await;
        agents.get(connection_id).cloned()
    }

    pub async fn snapshot(&self) -> Vec<AgentPresence> {
        let agents = self.agents.read().await;
        agents.values().cloned().collect()
    }

    /// Number of connected agents
    pub async fn connected_count(&self) -> usize {
        let agents = self.agents.read().await;
        agents.len()
    }

    /// Whether any agent is connected (inbound calls are announced-away
    /// otherwise)
    pub async fn any_connected(&self) -> bool {
        self.connected_count().await > 0
    }
}

impl Default for AgentPresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let registry = AgentPresenceRegistry::new();
        let id = Uuid::new_v4();

        let presence = registry.connect(id).await;
        assert_eq!(presence.status, AgentStatus::Available);
        assert_eq!(registry.connected_count().await, 1);
        assert!(registry.any_connected().await);

        assert!(registry.disconnect(&id).await);
        assert!(!registry.disconnect(&id).await);
        assert!(!registry.any_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_removes_only_that_connection() {
        let registry = AgentPresenceRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        registry.connect(first).await;
        registry.connect(second).await;

        registry.disconnect(&first).await;

        assert!(registry.get(&first).await.is_none());
        assert!(registry.get(&second).await.is_some());
    }

    #[tokio::test]
    async fn test_update_status() {
        let registry = AgentPresenceRegistry::new();
        let id = Uuid::new_v4();
        registry.connect(id).await;

        assert!(registry.update_status(&id, AgentStatus::Busy).await);
        assert_eq!(registry.get(&id).await.unwrap().status, AgentStatus::Busy);

        // Unknown connections are a no-op
        assert!(!registry.update_status(&Uuid::new_v4(), AgentStatus::Busy).await);
    }
}
