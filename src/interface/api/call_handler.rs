//! Call control API and provider webhook handlers
//!
//! Agent-facing endpoints return JSON `ApiResponse` bodies; provider-facing
//! webhooks always acknowledge (TwiML or 200) so the provider never retries
//! into a failure loop.

use super::dto::{
    AcceptRequest, AcceptResponse, ActiveCallsResponse, ApiResponse, CallIdRequest,
    ConferenceParams, ConferenceStatusForm, InitiateRequest, InitiateResponse,
    StatusCallbackForm, VoiceWebhookForm,
};
use super::AppState;
use crate::application::orchestrator::{ConferenceStatusEvent, InboundVoiceEvent, StatusEvent};
use crate::domain::bridge::LegRole;
use crate::domain::call_session::OriginMode;
use crate::domain::shared::DomainError;
use crate::infrastructure::telephony::VoiceResponse;
use axum::{
    extract::{Form, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error, info};

fn twiml(markup: VoiceResponse) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        markup.to_xml(),
    )
        .into_response()
}

/// Health check
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "service": "dialdesk" }))
}

/// POST /api/calls/initiate
pub async fn initiate_call(
    State(state): State<AppState>,
    Json(request): Json<InitiateRequest>,
) -> (StatusCode, Json<ApiResponse<InitiateResponse>>) {
    info!("API: Initiating call to {}", request.to);

    let origin = request.origin.unwrap_or(OriginMode::ClientDevice);
    match state
        .orchestrator
        .initiate(&request.from, &request.to, request.user_id, origin)
        .await
    {
        Ok(initiated) => (
            StatusCode::OK,
            Json(ApiResponse::success(InitiateResponse {
                call_id: initiated.call_id,
                from: initiated.from,
                to: initiated.to,
            })),
        ),
        Err(DomainError::Validation(message)) => {
            (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message)))
        }
        Err(e) => {
            error!("API: Failed to initiate call: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// POST /api/calls/accept
pub async fn accept_call(
    State(state): State<AppState>,
    Json(request): Json<AcceptRequest>,
) -> (StatusCode, Json<ApiResponse<AcceptResponse>>) {
    info!("API: Accepting call {}", request.call_id);

    match state
        .orchestrator
        .accept(&request.call_id, request.agent_identity.as_deref())
        .await
    {
        Ok(agent_call_id) => (
            StatusCode::OK,
            Json(ApiResponse::success(AcceptResponse { agent_call_id })),
        ),
        Err(DomainError::NotFound(message)) => {
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(message)))
        }
        Err(e) => {
            error!("API: Failed to accept call {}: {}", request.call_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// POST /api/calls/reject
pub async fn reject_call(
    State(state): State<AppState>,
    Json(request): Json<CallIdRequest>,
) -> Json<ApiResponse<String>> {
    state.orchestrator.reject(&request.call_id).await;
    Json(ApiResponse::success("Call rejected".to_string()))
}

/// POST /api/calls/end
pub async fn end_call(
    State(state): State<AppState>,
    Json(request): Json<CallIdRequest>,
) -> Json<ApiResponse<String>> {
    state.orchestrator.end(&request.call_id).await;
    Json(ApiResponse::success("Call ended".to_string()))
}

/// GET /api/calls
pub async fn get_active_calls(
    State(state): State<AppState>,
) -> Json<ApiResponse<ActiveCallsResponse>> {
    let calls = state.orchestrator.active_calls().await;
    let total = calls.len();
    Json(ApiResponse::success(ActiveCallsResponse { calls, total }))
}

/// POST /voice — provider voice webhook for inbound calls and
/// device-originated legs
pub async fn voice_webhook(
    State(state): State<AppState>,
    Form(form): Form<VoiceWebhookForm>,
) -> Response {
    debug!("Voice webhook: {:?}", form);

    let call_sid = match form.call_sid {
        Some(sid) => sid,
        None => {
            error!("Voice webhook without CallSid");
            return twiml(
                VoiceResponse::new()
                    .say("An error occurred. Please try your call again later.")
                    .hangup(),
            );
        }
    };

    let markup = state
        .orchestrator
        .handle_voice_webhook(InboundVoiceEvent {
            call_sid,
            from: form.from,
            to: form.to,
            caller: form.caller,
            session_id: form.session_id,
            user_id: form.user_id,
        })
        .await;
    twiml(markup)
}

/// POST /api/calls/status — provider status callback; always acknowledged
pub async fn status_webhook(
    State(state): State<AppState>,
    Form(form): Form<StatusCallbackForm>,
) -> StatusCode {
    let (call_sid, status) = match (form.call_sid, form.call_status) {
        (Some(sid), Some(status)) => (sid, status),
        _ => {
            debug!("Status callback missing CallSid or CallStatus");
            return StatusCode::OK;
        }
    };

    state
        .orchestrator
        .apply_status(StatusEvent {
            call_sid,
            status,
            from: form.from,
            to: form.to,
            duration_secs: form.call_duration.and_then(|d| d.parse().ok()),
            timestamp: form.timestamp,
        })
        .await;
    StatusCode::OK
}

/// POST /conference-status — logged and acknowledged
pub async fn conference_status_webhook(
    State(state): State<AppState>,
    Form(form): Form<ConferenceStatusForm>,
) -> StatusCode {
    state
        .orchestrator
        .conference_status(ConferenceStatusEvent {
            conference_sid: form.conference_sid,
            call_sid: form.call_sid,
            event: form.event,
            sequence_number: form.sequence_number,
        })
        .await;
    StatusCode::OK
}

/// POST /api/recording/status — acknowledged only
pub async fn recording_status_webhook(
    Form(form): Form<std::collections::HashMap<String, String>>,
) -> StatusCode {
    debug!("Recording status: {:?}", form);
    StatusCode::OK
}

fn conference_join(
    state: &AppState,
    query: ConferenceParams,
    form: ConferenceParams,
    role: LegRole,
) -> Response {
    let name = query.conference_name.or(form.conference_name);
    match name {
        Some(name) => twiml(state.orchestrator.conference_join_markup(&name, role)),
        None => twiml(VoiceResponse::new().say("Conference not found.").hangup()),
    }
}

/// POST /api/twiml/customer — customer leg joins its conference on hold
pub async fn customer_twiml(
    State(state): State<AppState>,
    Query(query): Query<ConferenceParams>,
    Form(form): Form<ConferenceParams>,
) -> Response {
    conference_join(&state, query, form, LegRole::Customer)
}

/// POST /api/twiml/agent — agent leg starts the conference
pub async fn agent_twiml(
    State(state): State<AppState>,
    Query(query): Query<ConferenceParams>,
    Form(form): Form<ConferenceParams>,
) -> Response {
    conference_join(&state, query, form, LegRole::Agent)
}

/// POST /join-conference — agent leg created by accept()
pub async fn join_conference(
    State(state): State<AppState>,
    Query(query): Query<ConferenceParams>,
    Form(form): Form<ConferenceParams>,
) -> Response {
    conference_join(&state, query, form, LegRole::Agent)
}

/// POST /api/twiml/fallback — static apology response
pub async fn fallback_twiml() -> Response {
    twiml(
        VoiceResponse::new()
            .say("Sorry, we are unable to process your call at the moment. Please try again later.")
            .hangup(),
    )
}
