//! API DTOs
//!
//! JSON request/response types for the agent control API plus the
//! form-encoded webhook payloads posted by the telephony provider (which
//! uses PascalCase field names on the wire).

use crate::domain::call_session::{CallSession, OriginMode};
use serde::{Deserialize, Serialize};

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Outbound call initiation request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    pub user_id: Option<String>,
    /// Defaults to the client-device flow when omitted
    pub origin: Option<OriginMode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateResponse {
    pub call_id: String,
    pub from: String,
    pub to: String,
}

/// Accept request; `callSid` is accepted as a legacy alias
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    #[serde(rename = "callId", alias = "callSid")]
    pub call_id: String,
    #[serde(rename = "agentIdentity")]
    pub agent_identity: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptResponse {
    pub agent_call_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CallIdRequest {
    #[serde(rename = "callId", alias = "callSid")]
    pub call_id: String,
}

/// Active calls list response
#[derive(Debug, Serialize)]
pub struct ActiveCallsResponse {
    pub calls: Vec<CallSession>,
    pub total: usize,
}

/// Provider voice webhook payload. Device-originated legs carry custom
/// parameters (`sessionId`, `userId`) as top-level form fields.
#[derive(Debug, Deserialize, Default)]
pub struct VoiceWebhookForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "Caller")]
    pub caller: Option<String>,
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Provider call-status callback payload
#[derive(Debug, Deserialize, Default)]
pub struct StatusCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "CallStatus")]
    pub call_status: Option<String>,
    #[serde(rename = "CallDuration")]
    pub call_duration: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: Option<String>,
}

/// Provider conference-status callback payload
#[derive(Debug, Deserialize, Default)]
pub struct ConferenceStatusForm {
    #[serde(rename = "ConferenceSid")]
    pub conference_sid: Option<String>,
    #[serde(rename = "CallSid")]
    pub call_sid: Option<String>,
    #[serde(rename = "StatusCallbackEvent")]
    pub event: Option<String>,
    #[serde(rename = "SequenceNumber")]
    pub sequence_number: Option<String>,
}

/// Conference name carried in either the query string or the form body of
/// TwiML endpoints
#[derive(Debug, Deserialize, Default)]
pub struct ConferenceParams {
    #[serde(rename = "conferenceName")]
    pub conference_name: Option<String>,
}
