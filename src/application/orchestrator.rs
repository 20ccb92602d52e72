//! Call-session orchestrator
//!
//! Owns the active-call and presence registries, decides how call legs are
//! bridged, reconciles provider status callbacks and fans the results out to
//! agent clients. Provider failures are absorbed here: local state always
//! reaches a consistent terminal shape and the fanout always fires, even when
//! remote teardown fails.

use crate::application::events::{AgentEvent, EventBroadcaster};
use crate::domain::bridge::{self, LegRole};
use crate::domain::call_history::{CallHistoryRecord, CallHistoryRepository};
use crate::domain::call_registry::ActiveCallRegistry;
use crate::domain::call_session::{
    CallDirection, CallSession, CallState, OriginMode,
};
use crate::domain::presence::{AgentPresence, AgentPresenceRegistry, AgentStatus};
use crate::domain::shared::{DomainError, Result};
use crate::infrastructure::telephony::twiml::{ConferenceOptions, DialOptions, VoiceResponse};
use crate::infrastructure::telephony::{CallControlClient, CreateCallRequest};
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Externally reachable URLs and dial defaults
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Public base URL the provider posts webhooks to (no trailing slash)
    pub public_base_url: String,
    /// Hold audio for the customer leg while the bridge has not started
    pub hold_music_url: String,
    /// Caller id presented on outbound legs
    pub caller_id: String,
}

/// Inbound signaling event from the provider voice webhook
#[derive(Debug, Clone, Default)]
pub struct InboundVoiceEvent {
    pub call_sid: String,
    pub from: Option<String>,
    pub to: Option<String>,
    /// Client identity for device-originated legs (`client:...`)
    pub caller: Option<String>,
    /// Placeholder session id passed through from `initiate`
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

impl InboundVoiceEvent {
    /// A leg placed by an agent's device rather than a customer phone
    pub fn is_client_originated(&self) -> bool {
        let from_client = |v: &Option<String>| {
            v.as_deref().map(|s| s.starts_with("client:")).unwrap_or(false)
        };
        from_client(&self.caller) || from_client(&self.from)
    }
}

/// Asynchronous status callback from the provider
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub call_sid: String,
    pub status: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub duration_secs: Option<u64>,
    pub timestamp: Option<String>,
}

/// Conference lifecycle callback (logged, not state-driving)
#[derive(Debug, Clone)]
pub struct ConferenceStatusEvent {
    pub conference_sid: Option<String>,
    pub call_sid: Option<String>,
    pub event: Option<String>,
    pub sequence_number: Option<String>,
}

/// Result of `initiate`
#[derive(Debug, Clone)]
pub struct InitiatedCall {
    pub call_id: String,
    pub from: String,
    pub to: String,
}

/// The owning service for all in-flight call and presence state
pub struct CallOrchestrator {
    calls: ActiveCallRegistry,
    agents: AgentPresenceRegistry,
    broadcaster: Arc<EventBroadcaster>,
    provider: Arc<dyn CallControlClient>,
    history: Option<Arc<dyn CallHistoryRepository>>,
    config: OrchestratorConfig,
}

impl CallOrchestrator {
    pub fn new(
        provider: Arc<dyn CallControlClient>,
        broadcaster: Arc<EventBroadcaster>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            calls: ActiveCallRegistry::new(),
            agents: AgentPresenceRegistry::new(),
            broadcaster,
            provider,
            history: None,
            config,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn CallHistoryRepository>) -> Self {
        self.history = Some(history);
        self
    }

    /// Snapshot of active calls for the operational API
    pub async fn active_calls(&self) -> Vec<CallSession> {
        self.calls.snapshot().await
    }

    pub async fn active_call_count(&self) -> usize {
        self.calls.len().await
    }

    pub async fn connected_agents(&self) -> Vec<AgentPresence> {
        self.agents.snapshot().await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_base_url, path)
    }

    fn status_callback_url(&self) -> String {
        self.url("/api/calls/status")
    }

    fn conference_callback_url(&self) -> String {
        self.url("/conference-status")
    }

    // ------------------------------------------------------------------
    // Inbound signaling
    // ------------------------------------------------------------------

    /// Handle the provider voice webhook. Always produces a markup response
    /// within the request/response cycle.
    pub async fn handle_voice_webhook(&self, event: InboundVoiceEvent) -> VoiceResponse {
        if event.is_client_originated() {
            return self.handle_client_leg(event).await;
        }
        self.handle_inbound_customer_call(event).await
    }

    /// Device-originated outbound leg: dial the customer directly
    async fn handle_client_leg(&self, event: InboundVoiceEvent) -> VoiceResponse {
        let customer_number = match event.to.as_deref().filter(|t| !t.starts_with("client:")) {
            Some(number) => number.to_string(),
            None => {
                warn!("Client-originated leg without a customer number");
                return VoiceResponse::new()
                    .say("Error: No phone number specified.")
                    .hangup();
            }
        };

        // Fold the placeholder registered by initiate() into the real session
        let mut owner = event.user_id.clone();
        let mut from = event.from.clone().unwrap_or_default();
        if let Some(session_id) = &event.session_id {
            if let Some(placeholder) = self.calls.remove(session_id).await {
                let placeholder = placeholder.lock().await;
                owner = owner.or_else(|| placeholder.owner_user_id.clone());
                if !placeholder.from.is_empty() {
                    from = placeholder.from.clone();
                }
                debug!(
                    "Re-keyed placeholder session {} to {}",
                    session_id, event.call_sid
                );
            }
        }

        let conference_name = bridge::conference_name(&customer_number, &event.call_sid);
        let session = CallSession::new(
            event.call_sid.clone(),
            CallDirection::Outbound,
            OriginMode::ClientDevice,
            from,
            customer_number.clone(),
            CallState::Initiated,
            conference_name,
        )
        .with_owner(owner);
        self.calls.insert(session).await;
        counter!("dialdesk_calls_initiated_total").increment(1);

        info!(
            "Outbound client leg {} dialing {}",
            event.call_sid, customer_number
        );

        let options = DialOptions {
            caller_id: Some(self.config.caller_id.clone()),
            record: Some("record-from-answer".to_string()),
            recording_status_callback: Some(self.url("/api/recording/status")),
        };
        VoiceResponse::new().dial_number(options, &customer_number)
    }

    /// Inbound customer call: announce-away when no agents are connected,
    /// otherwise park the customer in a conference and notify agents.
    async fn handle_inbound_customer_call(&self, event: InboundVoiceEvent) -> VoiceResponse {
        let from = event.from.clone().unwrap_or_default();
        let to = event.to.clone().unwrap_or_default();

        if !self.agents.any_connected().await {
            info!("Inbound call {} with no agents connected", event.call_sid);
            return VoiceResponse::new()
                .say("Sorry, all agents are currently busy. Please try again later.")
                .hangup();
        }

        let conference_name = bridge::conference_name(&from, &event.call_sid);
        let session = CallSession::new(
            event.call_sid.clone(),
            CallDirection::Inbound,
            OriginMode::Server,
            from.clone(),
            to.clone(),
            CallState::Ringing,
            conference_name.clone(),
        );
        self.calls.insert(session).await;
        counter!("dialdesk_calls_initiated_total").increment(1);

        info!(
            "Inbound call {} from {}, bridging via {}",
            event.call_sid, from, conference_name
        );

        self.broadcaster.publish(AgentEvent::IncomingCall {
            call_sid: event.call_sid,
            from,
            to,
            conference_name: conference_name.clone(),
            status: CallState::Ringing.as_str().to_string(),
        });

        let options = ConferenceOptions::new(conference_name, bridge::join_policy(LegRole::Customer))
            .with_wait_url(self.config.hold_music_url.clone())
            .with_status_callback(self.conference_callback_url());
        VoiceResponse::new()
            .say_voice("alice", "Please wait while we connect you to an agent.")
            .dial_conference(options)
    }

    /// Markup for a leg joining an existing conference by role
    pub fn conference_join_markup(&self, conference_name: &str, role: LegRole) -> VoiceResponse {
        let mut options =
            ConferenceOptions::new(conference_name.to_string(), bridge::join_policy(role))
                .with_status_callback(self.conference_callback_url());
        let response = match role {
            LegRole::Customer => {
                options = options.with_wait_url(self.config.hold_music_url.clone());
                VoiceResponse::new()
            }
            LegRole::Agent => VoiceResponse::new().say("Connecting you to the caller."),
        };
        response.dial_conference(options)
    }

    // ------------------------------------------------------------------
    // Control API
    // ------------------------------------------------------------------

    /// Start an outbound call to a customer. The origin mode decides who
    /// places the first leg.
    pub async fn initiate(
        &self,
        from: &str,
        to: &str,
        user_id: Option<String>,
        origin: OriginMode,
    ) -> Result<InitiatedCall> {
        if to.trim().is_empty() {
            return Err(DomainError::Validation("Missing 'to' number".to_string()));
        }
        let to = normalize_number(to);
        let from = if from.trim().is_empty() {
            self.config.caller_id.clone()
        } else {
            normalize_number(from)
        };

        match origin {
            OriginMode::Server => {
                // The conference key is fixed before the provider assigns a
                // call id, so fold a locally generated reference instead.
                let session_ref = Uuid::new_v4().simple().to_string();
                let conference_name = bridge::conference_name(&to, &session_ref);

                let created = self
                    .provider
                    .create_call(CreateCallRequest {
                        to: to.clone(),
                        from: from.clone(),
                        twiml_url: format!(
                            "{}?conferenceName={}",
                            self.url("/api/twiml/customer"),
                            conference_name
                        ),
                        status_callback: Some(self.status_callback_url()),
                    })
                    .await?;

                let session = CallSession::new(
                    created.call_id.clone(),
                    CallDirection::Outbound,
                    OriginMode::Server,
                    from.clone(),
                    to.clone(),
                    CallState::Initiating,
                    conference_name,
                )
                .with_owner(user_id);
                self.calls.insert(session).await;
                counter!("dialdesk_calls_initiated_total").increment(1);

                info!("Initiated server-originated call {} to {}", created.call_id, to);
                Ok(InitiatedCall {
                    call_id: created.call_id,
                    from,
                    to,
                })
            }
            OriginMode::ClientDevice => {
                // The device places the leg; register a placeholder the voice
                // webhook re-keys once the provider reports the real call id.
                let call_id = format!("local-{}", Uuid::new_v4().simple());
                let conference_name = bridge::conference_name(&to, &call_id);
                let session = CallSession::new(
                    call_id.clone(),
                    CallDirection::Outbound,
                    OriginMode::ClientDevice,
                    from.clone(),
                    to.clone(),
                    CallState::Initiating,
                    conference_name,
                )
                .with_owner(user_id);
                self.calls.insert(session).await;

                info!("Registered client-device call {} to {}", call_id, to);
                Ok(InitiatedCall { call_id, from, to })
            }
        }
    }

    /// Accept a ringing call: create the agent leg into the call's
    /// conference. Idempotent; concurrent accepts yield one agent leg and the
    /// loser receives the winner's id.
    pub async fn accept(&self, call_id: &str, agent_identity: Option<&str>) -> Result<String> {
        let handle = self
            .calls
            .get(call_id)
            .await
            .ok_or_else(|| DomainError::NotFound(format!("Call {} not found", call_id)))?;

        // The entry lock is held across the provider request; that is what
        // serializes concurrent accepts for this call id.
        let mut session = handle.lock().await;
        if let Some(existing) = &session.agent_call_id {
            debug!("Accept for {} already assigned to {}", call_id, existing);
            return Ok(existing.clone());
        }

        let identity = agent_identity.unwrap_or("agent");
        let created = self
            .provider
            .create_call(CreateCallRequest {
                to: format!("client:{}", identity),
                from: self.config.caller_id.clone(),
                twiml_url: format!(
                    "{}?conferenceName={}",
                    self.url("/join-conference"),
                    session.conference_name
                ),
                status_callback: Some(self.status_callback_url()),
            })
            .await?;

        session.agent_call_id = Some(created.call_id.clone());
        session.last_event_at = Utc::now();
        info!(
            "Call {} accepted, agent leg {} joining {}",
            call_id, created.call_id, session.conference_name
        );
        Ok(created.call_id)
    }

    /// Reject a ringing call: best-effort hangup of the leg. The session does
    /// not need to be locally known.
    pub async fn reject(&self, call_id: &str) {
        info!("Rejecting call {}", call_id);
        if let Err(e) = self.provider.complete_call(call_id).await {
            warn!("Could not reject call {} remotely: {}", call_id, e);
        }
    }

    /// End a call: local cleanup is unconditional, remote teardown is
    /// best-effort, and the terminal fanout always fires.
    pub async fn end(&self, call_id: &str) {
        let removed = self.calls.remove(call_id).await;

        let (conference_name, agent_call_id) = match &removed {
            Some(handle) => {
                let session = handle.lock().await;
                (Some(session.conference_name.clone()), session.agent_call_id.clone())
            }
            None => {
                info!("End requested for unknown call {}", call_id);
                (None, None)
            }
        };

        // Clear any remaining conference participants before dropping legs
        if let Some(name) = conference_name {
            self.clear_conference(&name).await;
        }
        if let Err(e) = self.provider.complete_call(call_id).await {
            warn!("Could not end call {} remotely: {}", call_id, e);
        }
        if let Some(agent_leg) = agent_call_id {
            if let Err(e) = self.provider.complete_call(&agent_leg).await {
                warn!("Could not end agent leg {} remotely: {}", agent_leg, e);
            }
        }

        counter!("dialdesk_calls_ended_total").increment(1);
        self.broadcaster.publish(AgentEvent::CallEnded {
            call_sid: call_id.to_string(),
            status: CallState::Completed.as_str().to_string(),
            timestamp: Utc::now().to_rfc3339(),
        });
        info!("Call {} ended locally", call_id);
    }

    async fn clear_conference(&self, conference_name: &str) {
        let conference_id = match self.provider.find_conference(conference_name).await {
            Ok(Some(id)) => id,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not look up conference {}: {}", conference_name, e);
                return;
            }
        };
        let participants = match self.provider.list_participants(&conference_id).await {
            Ok(participants) => participants,
            Err(e) => {
                warn!("Could not list participants of {}: {}", conference_name, e);
                return;
            }
        };
        for participant in participants {
            if let Err(e) = self
                .provider
                .remove_participant(&conference_id, &participant)
                .await
            {
                warn!(
                    "Could not remove participant {} from {}: {}",
                    participant, conference_name, e
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Status reconciliation
    // ------------------------------------------------------------------

    /// Apply a provider status callback. The callback may carry either leg's
    /// id; agent-leg events resolve to the owning session. Unknown calls and
    /// illegal transitions are acknowledged no-ops. Side effects are strictly
    /// ordered: registry mutation, best-effort persistence, fanout, removal.
    pub async fn apply_status(&self, event: StatusEvent) {
        let next = match CallState::from_provider_status(&event.status) {
            Some(state) => state,
            None => {
                debug!(
                    "Ignoring unrecognized status '{}' for {}",
                    event.status, event.call_sid
                );
                return;
            }
        };

        let handle = match self.calls.get(&event.call_sid).await {
            Some(handle) => handle,
            // Status callbacks are subscribed on the agent leg too
            None => match self.calls.find_by_agent_call_id(&event.call_sid).await {
                Some(handle) => handle,
                None => {
                    info!(
                        "Status '{}' for unknown call {}, ignoring",
                        event.status, event.call_sid
                    );
                    return;
                }
            },
        };

        let mut session = handle.lock().await;
        if !session.apply_transition(next) {
            debug!(
                "Ignoring illegal transition {} -> {} for {}",
                session.state.as_str(),
                next.as_str(),
                event.call_sid
            );
            return;
        }

        let snapshot = session.clone();
        let timestamp = event
            .timestamp
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        if next.is_terminal() {
            // Best-effort history write; never blocks fanout or cleanup
            if let Some(history) = &self.history {
                let record =
                    CallHistoryRecord::from_session(&snapshot, event.duration_secs.unwrap_or(0));
                if let Err(e) = history.upsert(record).await {
                    warn!("Could not persist history for {}: {}", event.call_sid, e);
                }
            }

            self.broadcaster.publish(AgentEvent::CallStatusUpdated {
                call_sid: snapshot.call_id.clone(),
                status: next.as_str().to_string(),
                from: snapshot.from.clone(),
                to: snapshot.to.clone(),
                duration: event.duration_secs,
                timestamp: timestamp.clone(),
            });
            self.broadcaster.publish(AgentEvent::CallEnded {
                call_sid: snapshot.call_id.clone(),
                status: next.as_str().to_string(),
                timestamp,
            });

            drop(session);
            // Remove under the primary key; `event.call_sid` may name the
            // agent leg
            self.calls.remove(&snapshot.call_id).await;
            counter!("dialdesk_calls_ended_total").increment(1);
            info!(
                "Call {} reached terminal state {}",
                snapshot.call_id,
                next.as_str()
            );
        } else {
            self.broadcaster.publish(AgentEvent::CallStatusUpdated {
                call_sid: snapshot.call_id.clone(),
                status: next.as_str().to_string(),
                from: snapshot.from.clone(),
                to: snapshot.to.clone(),
                duration: event.duration_secs,
                timestamp,
            });
            debug!("Call {} moved to {}", event.call_sid, next.as_str());
        }
    }

    /// Conference lifecycle callbacks are acknowledged and logged only
    pub async fn conference_status(&self, event: ConferenceStatusEvent) {
        info!(
            "Conference event {:?} for conference {:?} (call {:?}, seq {:?})",
            event.event, event.conference_sid, event.call_sid, event.sequence_number
        );
    }

    // ------------------------------------------------------------------
    // Agent presence
    // ------------------------------------------------------------------

    /// Register a newly connected agent channel
    pub async fn agent_connected(&self, connection_id: Uuid) -> AgentPresence {
        let presence = self.agents.connect(connection_id).await;
        info!("Agent {} connected", connection_id);
        self.broadcaster.publish(AgentEvent::AgentConnected {
            agent_id: connection_id,
        });
        presence
    }

    /// Remove a disconnected agent channel. Call sessions referencing this
    /// agent are untouched.
    pub async fn agent_disconnected(&self, connection_id: Uuid) {
        if self.agents.disconnect(&connection_id).await {
            info!("Agent {} disconnected", connection_id);
            self.broadcaster.publish(AgentEvent::AgentDisconnected {
                agent_id: connection_id,
            });
        }
    }

    /// Overwrite an agent's status and notify every other connection
    pub async fn agent_status_updated(&self, connection_id: Uuid, status: AgentStatus) {
        if self.agents.update_status(&connection_id, status).await {
            self.broadcaster.publish_excluding(
                connection_id,
                AgentEvent::AgentStatusUpdated {
                    agent_id: connection_id,
                    status: status.as_str().to_string(),
                },
            );
        }
    }
}

/// Prepend `+` when the number arrives without one
fn normalize_number(number: &str) -> String {
    let trimmed = number.trim();
    if trimmed.starts_with('+') {
        trimmed.to_string()
    } else {
        format!("+{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::telephony::client::{CreatedCall, MockCallControlClient};

    fn config() -> OrchestratorConfig {
        OrchestratorConfig {
            public_base_url: "https://dialdesk.example.com".to_string(),
            hold_music_url: "https://dialdesk.example.com/hold".to_string(),
            caller_id: "+15551000".to_string(),
        }
    }

    fn orchestrator(provider: MockCallControlClient) -> CallOrchestrator {
        CallOrchestrator::new(
            Arc::new(provider),
            Arc::new(EventBroadcaster::new(64)),
            config(),
        )
    }

    #[test]
    fn test_normalize_number() {
        assert_eq!(normalize_number("15550002"), "+15550002");
        assert_eq!(normalize_number("+15550002"), "+15550002");
        assert_eq!(normalize_number(" 15550002 "), "+15550002");
    }

    #[test]
    fn test_client_origin_detection() {
        let mut event = InboundVoiceEvent::default();
        assert!(!event.is_client_originated());

        event.caller = Some("client:agent-1".to_string());
        assert!(event.is_client_originated());

        event.caller = None;
        event.from = Some("client:agent-1".to_string());
        assert!(event.is_client_originated());
    }

    #[tokio::test]
    async fn test_initiate_rejects_missing_to() {
        let orchestrator = orchestrator(MockCallControlClient::new());
        let result = orchestrator
            .initiate("+15551000", "  ", None, OriginMode::Server)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_initiate_client_device_registers_placeholder() {
        let orchestrator = orchestrator(MockCallControlClient::new());
        let initiated = orchestrator
            .initiate("", "15550002", Some("user-1".to_string()), OriginMode::ClientDevice)
            .await
            .unwrap();

        assert!(initiated.call_id.starts_with("local-"));
        assert_eq!(initiated.to, "+15550002");
        assert_eq!(orchestrator.active_call_count().await, 1);
    }

    #[tokio::test]
    async fn test_accept_unknown_call_is_not_found() {
        let orchestrator = orchestrator(MockCallControlClient::new());
        let result = orchestrator.accept("CA-missing", None).await;
        assert!(matches!(result, Err(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_accept_is_idempotent() {
        let mut provider = MockCallControlClient::new();
        provider
            .expect_create_call()
            .times(1)
            .returning(|_| {
                Ok(CreatedCall {
                    call_id: "CA-agent-1".to_string(),
                })
            });
        let orchestrator = orchestrator(provider);

        orchestrator.agents.connect(Uuid::new_v4()).await;
        orchestrator
            .handle_voice_webhook(InboundVoiceEvent {
                call_sid: "CA100".to_string(),
                from: Some("+15550001".to_string()),
                to: Some("+15559999".to_string()),
                ..Default::default()
            })
            .await;

        let first = orchestrator.accept("CA100", None).await.unwrap();
        let second = orchestrator.accept("CA100", None).await.unwrap();
        assert_eq!(first, "CA-agent-1");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_status_for_unknown_call_is_ignored() {
        let orchestrator = orchestrator(MockCallControlClient::new());
        orchestrator
            .apply_status(StatusEvent {
                call_sid: "CA-unknown".to_string(),
                status: "completed".to_string(),
                from: None,
                to: None,
                duration_secs: None,
                timestamp: None,
            })
            .await;
        assert_eq!(orchestrator.active_call_count().await, 0);
    }

    #[tokio::test]
    async fn test_no_agents_announcement() {
        let orchestrator = orchestrator(MockCallControlClient::new());
        let markup = orchestrator
            .handle_voice_webhook(InboundVoiceEvent {
                call_sid: "CA100".to_string(),
                from: Some("+15550001".to_string()),
                to: Some("+15559999".to_string()),
                ..Default::default()
            })
            .await
            .to_xml();

        assert!(markup.contains("all agents are currently busy"));
        assert!(markup.contains("<Hangup/>"));
        assert_eq!(orchestrator.active_call_count().await, 0);
    }
}
