//! Telephony provider control API client
//!
//! Issues the call-control commands the orchestrator needs: create a leg,
//! complete a leg, look up a conference and evict its participants. The
//! trait is the seam the orchestrator is tested against; the HTTP
//! implementation talks to the provider's REST API with basic auth and
//! form-encoded bodies.

use crate::domain::shared::{DomainError, Result};
use serde::Deserialize;
use tracing::debug;

/// Parameters for creating a call leg
#[derive(Debug, Clone)]
pub struct CreateCallRequest {
    pub to: String,
    pub from: String,
    /// Where the provider fetches the signaling markup for the leg
    pub twiml_url: String,
    /// Where status events for the leg are posted
    pub status_callback: Option<String>,
}

/// Provider response to a created leg
#[derive(Debug, Clone)]
pub struct CreatedCall {
    pub call_id: String,
}

/// Call-control command surface of the telephony provider
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CallControlClient: Send + Sync {
    /// Place a new call leg
    async fn create_call(&self, request: CreateCallRequest) -> Result<CreatedCall>;

    /// Terminate a leg (idempotent on the provider side)
    async fn complete_call(&self, call_id: &str) -> Result<()>;

    /// Resolve an in-progress conference by its name
    async fn find_conference(&self, friendly_name: &str) -> Result<Option<String>>;

    /// Call ids of the legs currently in a conference
    async fn list_participants(&self, conference_id: &str) -> Result<Vec<String>>;

    /// Evict one leg from a conference
    async fn remove_participant(&self, conference_id: &str, call_id: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ConferenceResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ConferenceListResponse {
    conferences: Vec<ConferenceResource>,
}

#[derive(Debug, Deserialize)]
struct ParticipantResource {
    call_sid: String,
}

#[derive(Debug, Deserialize)]
struct ParticipantListResponse {
    participants: Vec<ParticipantResource>,
}

/// HTTP implementation of the provider control API
pub struct HttpCallControlClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
}

impl HttpCallControlClient {
    pub fn new(base_url: String, account_sid: String, auth_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
        }
    }

    fn account_url(&self, path: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}",
            self.base_url, self.account_sid, path
        )
    }

    fn check(status: reqwest::StatusCode, context: &str) -> Result<()> {
        if status.is_success() {
            Ok(())
        } else {
            Err(DomainError::Telephony(format!(
                "{} returned HTTP {}",
                context, status
            )))
        }
    }
}

#[async_trait::async_trait]
impl CallControlClient for HttpCallControlClient {
    async fn create_call(&self, request: CreateCallRequest) -> Result<CreatedCall> {
        let mut form = vec![
            ("To", request.to.clone()),
            ("From", request.from.clone()),
            ("Url", request.twiml_url.clone()),
        ];
        if let Some(callback) = &request.status_callback {
            form.push(("StatusCallback", callback.clone()));
            form.push(("StatusCallbackMethod", "POST".to_string()));
            // The API takes one repeated parameter per subscribed event
            for event in ["initiated", "ringing", "answered", "completed"] {
                form.push(("StatusCallbackEvent", event.to_string()));
            }
        }

        debug!("Creating call leg to {}", request.to);
        let response = self
            .http
            .post(self.account_url("Calls.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Self::check(response.status(), "create call")?;
        let call: CallResource = response
            .json()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Ok(CreatedCall { call_id: call.sid })
    }

    async fn complete_call(&self, call_id: &str) -> Result<()> {
        debug!("Completing call leg {}", call_id);
        let response = self
            .http
            .post(self.account_url(&format!("Calls/{}.json", call_id)))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("Status", "completed")])
            .send()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Self::check(response.status(), "complete call")
    }

    async fn find_conference(&self, friendly_name: &str) -> Result<Option<String>> {
        let response = self
            .http
            .get(self.account_url("Conferences.json"))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .query(&[("FriendlyName", friendly_name), ("Status", "in-progress")])
            .send()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Self::check(response.status(), "find conference")?;
        let list: ConferenceListResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Ok(list.conferences.into_iter().next().map(|c| c.sid))
    }

    async fn list_participants(&self, conference_id: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.account_url(&format!("Conferences/{}/Participants.json", conference_id)))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Self::check(response.status(), "list participants")?;
        let list: ParticipantListResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Ok(list.participants.into_iter().map(|p| p.call_sid).collect())
    }

    async fn remove_participant(&self, conference_id: &str, call_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(self.account_url(&format!(
                "Conferences/{}/Participants/{}.json",
                conference_id, call_id
            )))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map_err(|e| DomainError::Telephony(e.to_string()))?;

        Self::check(response.status(), "remove participant")
    }
}
