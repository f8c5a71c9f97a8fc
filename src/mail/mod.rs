pub mod gmail;
pub mod mime;

pub use gmail::GmailClient;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Whether client messages are left as drafts for review or sent directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Draft,
    Send,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Draft => "draft",
            DeliveryMode::Send => "send",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" | "drafts" => Ok(DeliveryMode::Draft),
            "send" => Ok(DeliveryMode::Send),
            other => Err(AppError::Config(format!(
                "DELIVERY_MODE must be 'draft' or 'send', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Identifier the mail provider assigned to a created draft or sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReceipt {
    pub id: String,
    pub mode: DeliveryMode,
}

#[async_trait::async_trait]
pub trait MailClient: Send + Sync {
    async fn create_draft(&self, message: &OutboundMessage) -> AppResult<MessageReceipt>;

    async fn send(&self, message: &OutboundMessage) -> AppResult<MessageReceipt>;

    async fn deliver(
        &self,
        message: &OutboundMessage,
        mode: DeliveryMode,
    ) -> AppResult<MessageReceipt> {
        match mode {
            DeliveryMode::Draft => self.create_draft(message).await,
            DeliveryMode::Send => self.send(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delivery_mode() {
        assert_eq!("draft".parse::<DeliveryMode>().unwrap(), DeliveryMode::Draft);
        assert_eq!(" SEND ".parse::<DeliveryMode>().unwrap(), DeliveryMode::Send);
        assert!("fax".parse::<DeliveryMode>().is_err());
        assert_eq!(DeliveryMode::Send.to_string(), "send");
    }
}
