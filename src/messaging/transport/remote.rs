//! Transport talking to the storefront REST API.
//!
//! Every endpoint answers with an envelope `{ success, data, message? }`. An
//! HTTP 404 is reported as [`MessagingError::EndpointNotFound`] so a decorator
//! can route to the fallback store; every other failure is surfaced as-is.

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::messaging::core::config::RemoteConfig;
use crate::messaging::core::errors::{MessagingError, MessagingResult};
use crate::messaging::core::ids::{ConversationId, UserId};
use crate::messaging::core::models::{
    Conversation, ConversationMessages, ReplyPayload, ReplyResult, SendMessagePayload,
    SendMessageResult,
};
use crate::messaging::transport::{MessageTransport, TransportFuture, validate_content};

/// Response envelope used by every endpoint.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    #[serde(default)]
    message: Option<String>,
}

const fn default_success() -> bool {
    true
}

impl<T> ApiEnvelope<T> {
    fn into_data(self, operation: &str) -> MessagingResult<T> {
        if !self.success {
            return Err(MessagingError::Rejected(
                self.message
                    .unwrap_or_else(|| format!("{operation} was not successful")),
            ));
        }
        self.data.ok_or_else(|| {
            MessagingError::Rejected(format!("{operation} response carried no data"))
        })
    }
}

/// Pull a human readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

/// REST transport.
pub struct RemoteTransport {
    client: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl RemoteTransport {
    /// Create a transport from configuration.
    ///
    /// # Errors
    /// Returns an error if the base URL is missing or invalid, or the HTTP
    /// client cannot be built.
    pub fn new(config: &RemoteConfig) -> MessagingResult<Self> {
        let raw = config.base_url.as_deref().ok_or_else(|| {
            MessagingError::InvalidConfig("remote.base_url is not set".to_string())
        })?;
        let base_url = Url::parse(raw)?;
        if base_url.cannot_be_a_base() {
            return Err(MessagingError::InvalidConfig(format!(
                "remote.base_url {raw} cannot carry a path"
            )));
        }

        Ok(Self {
            client: Self::build_client(config)?,
            base_url,
            bearer_token: config.bearer_token.clone(),
        })
    }

    /// Build an HTTP client with default headers and timeouts.
    fn build_client(config: &RemoteConfig) -> MessagingResult<reqwest::Client> {
        let mut headers = HeaderMap::new();
        if let Ok(ua) = HeaderValue::from_str(&config.user_agent) {
            headers.insert(USER_AGENT, ua);
        }
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(MessagingError::from)
    }

    /// Base URL of the API.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint below the base URL. Segments are percent-encoded.
    ///
    /// # Errors
    /// Returns an error if the base URL cannot carry a path.
    pub fn endpoint(&self, segments: &[&str]) -> MessagingResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|()| {
                MessagingError::InvalidConfig("remote.base_url cannot carry a path".to_string())
            })?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    /// Check whether the messaging endpoints exist on the remote API.
    ///
    /// Any answer other than HTTP 404 counts as present (a 401 still proves the
    /// route is there).
    ///
    /// # Errors
    /// Returns an error if the API cannot be reached at all.
    pub async fn probe(&self) -> MessagingResult<bool> {
        let url = self.endpoint(&["messages", "conversations"])?;
        let response = self.authorize(self.client.get(url)).send().await?;
        let present = response.status() != StatusCode::NOT_FOUND;
        debug!(status = response.status().as_u16(), present, "Probed messaging endpoints");
        Ok(present)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> MessagingResult<T> {
        let response = self.authorize(request).send().await.map_err(|err| {
            warn!(operation, error = %err, "Remote request failed");
            MessagingError::from(err)
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(operation, url = %response.url(), "Remote endpoint not found");
            return Err(MessagingError::EndpointNotFound(operation.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
            warn!(operation, status = status.as_u16(), %message, "Remote API returned an error");
            return Err(MessagingError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> = response.json().await.map_err(|err| {
            warn!(operation, error = %err, "Remote response could not be decoded");
            MessagingError::from(err)
        })?;
        envelope.into_data(operation)
    }
}

impl MessageTransport for RemoteTransport {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn send_message(
        &self,
        payload: SendMessagePayload,
    ) -> TransportFuture<'_, MessagingResult<SendMessageResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            let url = self.endpoint(&["messages"])?;
            self.execute("send_message", self.client.post(url).json(&payload))
                .await
        })
    }

    fn get_user_conversations(
        &self,
        user_id: Option<UserId>,
    ) -> TransportFuture<'_, MessagingResult<Vec<Conversation>>> {
        Box::pin(async move {
            // The API derives the owner from the bearer token.
            let url = match user_id {
                Some(_) => self.endpoint(&["messages", "conversations"])?,
                None => self.endpoint(&["admin", "messages", "conversations"])?,
            };
            self.execute("get_user_conversations", self.client.get(url))
                .await
        })
    }

    fn get_conversation_messages(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        Box::pin(async move {
            let url = self.endpoint(&["messages", "conversations", conversation_id.as_str()])?;
            self.execute("get_conversation_messages", self.client.get(url))
                .await
        })
    }

    fn admin_get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> TransportFuture<'_, MessagingResult<ConversationMessages>> {
        Box::pin(async move {
            let url = self.endpoint(&[
                "admin",
                "messages",
                "conversations",
                conversation_id.as_str(),
            ])?;
            self.execute("admin_get_conversation", self.client.get(url))
                .await
        })
    }

    fn admin_send_reply(
        &self,
        conversation_id: ConversationId,
        payload: ReplyPayload,
    ) -> TransportFuture<'_, MessagingResult<ReplyResult>> {
        Box::pin(async move {
            validate_content(&payload.content)?;
            let url = self.endpoint(&[
                "admin",
                "messages",
                "conversations",
                conversation_id.as_str(),
                "reply",
            ])?;
            self.execute("admin_send_reply", self.client.post(url).json(&payload))
                .await
        })
    }
}
