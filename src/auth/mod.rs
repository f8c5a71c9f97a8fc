pub mod stored;

pub use stored::StoredTokenProvider;

use chrono::{DateTime, Utc};

use crate::error::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Service {
    SearchConsole,
    Analytics,
    Gmail,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::SearchConsole => "search_console",
            Service::Analytics => "analytics",
            Service::Gmail => "gmail",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// A token with no known expiry is treated as valid.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expires_at.is_none_or(|at| at > now + margin)
    }
}

/// Hands out bearer tokens per Google service, refreshing silently on expiry.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, service: Service) -> AppResult<AccessToken>;
}
