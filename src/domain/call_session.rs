//! Call session lifecycle model
//!
//! A `CallSession` is the authoritative record for one in-flight call. Its
//! state only ever moves forward along the legal transition graph; duplicate
//! or out-of-order provider callbacks are ignored rather than rejected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// Outbound call requested, provider leg not yet confirmed
    Initiating,
    /// Provider accepted the outbound leg
    Initiated,
    /// Far end is ringing (initial state for inbound calls)
    Ringing,
    /// Both parties connected
    InProgress,
    /// Call ended normally
    Completed,
    /// Call failed
    Failed,
    /// Far end was busy
    Busy,
    /// Call was never answered
    NoAnswer,
    /// Call was canceled before connecting
    Canceled,
}

impl CallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallState::Initiating => "initiating",
            CallState::Initiated => "initiated",
            CallState::Ringing => "ringing",
            CallState::InProgress => "in_progress",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
            CallState::Busy => "busy",
            CallState::NoAnswer => "no_answer",
            CallState::Canceled => "canceled",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallState::Completed
                | CallState::Failed
                | CallState::Busy
                | CallState::NoAnswer
                | CallState::Canceled
        )
    }

    /// Position along the forward progression of live states
    fn rank(&self) -> u8 {
        match self {
            CallState::Initiating => 0,
            CallState::Initiated => 1,
            CallState::Ringing => 2,
            CallState::InProgress => 3,
            // All terminal states share the final rank
            _ => 4,
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// Forward-only. Skipping intermediate states is allowed because the
    /// provider does not report every state and callbacks can arrive out of
    /// order. Once terminal, nothing is accepted.
    pub fn can_transition_to(&self, next: CallState) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() > self.rank()
    }

    /// Map a provider status string onto a call state.
    ///
    /// Unrecognized statuses map to `None` and are ignored upstream.
    pub fn from_provider_status(status: &str) -> Option<Self> {
        match status {
            "queued" | "initiated" => Some(CallState::Initiated),
            "ringing" => Some(CallState::Ringing),
            "in-progress" | "answered" => Some(CallState::InProgress),
            "completed" => Some(CallState::Completed),
            "busy" => Some(CallState::Busy),
            "no-answer" => Some(CallState::NoAnswer),
            "failed" => Some(CallState::Failed),
            "canceled" => Some(CallState::Canceled),
            _ => None,
        }
    }
}

/// Call direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

impl CallDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallDirection::Inbound => "inbound",
            CallDirection::Outbound => "outbound",
        }
    }
}

/// Who places the first leg of an outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginMode {
    /// The server places the customer leg via the provider control API
    Server,
    /// The agent's device places the first leg; the server sees it at the
    /// voice webhook
    ClientDevice,
}

/// One in-flight call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    /// Provider-issued call identifier (or locally generated placeholder)
    pub call_id: String,
    pub direction: CallDirection,
    pub origin: OriginMode,
    pub from: String,
    pub to: String,
    pub state: CallState,
    /// Conference bridge both legs join
    pub conference_name: String,
    /// Identifier of the agent leg once an agent accepts
    pub agent_call_id: Option<String>,
    /// Agent/user the call is attributed to in history
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_event_at: DateTime<Utc>,
}

impl CallSession {
    pub fn new(
        call_id: String,
        direction: CallDirection,
        origin: OriginMode,
        from: String,
        to: String,
        state: CallState,
        conference_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            call_id,
            direction,
            origin,
            from,
            to,
            state,
            conference_name,
            agent_call_id: None,
            owner_user_id: None,
            created_at: now,
            last_event_at: now,
        }
    }

    pub fn with_owner(mut self, user_id: Option<String>) -> Self {
        self.owner_user_id = user_id;
        self
    }

    /// The customer-facing phone number for this call
    pub fn customer_number(&self) -> &str {
        match self.direction {
            CallDirection::Inbound => &self.from,
            CallDirection::Outbound => &self.to,
        }
    }

    /// Try to advance the state. Returns `true` when the transition was
    /// applied, `false` when it was ignored as a duplicate or regression.
    pub fn apply_transition(&mut self, next: CallState) -> bool {
        if !self.state.can_transition_to(next) {
            return false;
        }
        self.state = next;
        self.last_event_at = Utc::now();
        true
    }
}
