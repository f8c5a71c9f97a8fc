use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::{DeliveryMode, MailClient, MessageReceipt, OutboundMessage, mime};
use crate::auth::{Service, TokenProvider};
use crate::error::{AppError, AppResult};

pub struct GmailClient {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

impl GmailClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    async fn submit(
        &self,
        path: &str,
        body: serde_json::Value,
        mode: DeliveryMode,
    ) -> AppResult<MessageReceipt> {
        let token = self.tokens.get_token(Service::Gmail).await?;
        let response = self
            .http
            .post(format!("{}/gmail/v1/users/me/{path}", self.base_url))
            .bearer_auth(&token.value)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::Delivery("Gmail request timed out".to_string())
                } else {
                    AppError::Delivery(format!("Gmail request failed: {e}"))
                }
            })?;

        let status = response.status();
        tracing::Span::current().record("http.response.status_code", status.as_u16());
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AppError::Authentication(format!("Gmail returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Delivery(format!("Gmail returned {status}: {body}")));
        }

        let created: CreatedResource = response
            .json()
            .await
            .map_err(|e| AppError::Delivery(format!("unexpected Gmail response: {e}")))?;
        Ok(MessageReceipt {
            id: created.id,
            mode,
        })
    }
}

#[async_trait::async_trait]
impl MailClient for GmailClient {
    #[tracing::instrument(
        name = "gmail create_draft",
        skip(self, message),
        fields(recipients = message.to.len(), http.response.status_code)
    )]
    async fn create_draft(&self, message: &OutboundMessage) -> AppResult<MessageReceipt> {
        let raw = mime::encode_raw(message, Utc::now());
        self.submit("drafts", json!({ "message": { "raw": raw } }), DeliveryMode::Draft)
            .await
    }

    #[tracing::instrument(
        name = "gmail send",
        skip(self, message),
        fields(recipients = message.to.len(), http.response.status_code)
    )]
    async fn send(&self, message: &OutboundMessage) -> AppResult<MessageReceipt> {
        let raw = mime::encode_raw(message, Utc::now());
        self.submit("messages/send", json!({ "raw": raw }), DeliveryMode::Send)
            .await
    }
}
