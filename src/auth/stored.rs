use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{AccessToken, Service, TokenProvider};
use crate::error::{AppError, AppResult};

const EXPIRY_MARGIN_SECS: i64 = 60;

/// Authorized-user credential as saved after the interactive consent flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCredential {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Token provider backed by one credential file per service. Tokens are cached
/// in memory and refreshed tokens are written back to their file.
pub struct StoredTokenProvider {
    http: reqwest::Client,
    default_token_uri: String,
    files: HashMap<Service, PathBuf>,
    cache: RwLock<HashMap<Service, AccessToken>>,
}

impl StoredTokenProvider {
    pub fn new(
        http: reqwest::Client,
        default_token_uri: impl Into<String>,
        files: HashMap<Service, PathBuf>,
    ) -> Self {
        Self {
            http,
            default_token_uri: default_token_uri.into(),
            files,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(http: reqwest::Client, config: &crate::config::Config) -> Self {
        let files = HashMap::from([
            (Service::SearchConsole, config.gsc_token_file.clone()),
            (Service::Analytics, config.ga4_token_file.clone()),
            (Service::Gmail, config.gmail_token_file.clone()),
        ]);
        Self::new(http, config.google_token_uri.clone(), files)
    }

    fn credential_path(&self, service: Service) -> AppResult<&Path> {
        self.files.get(&service).map(PathBuf::as_path).ok_or_else(|| {
            AppError::Authentication(format!("no credential file configured for {}", service.as_str()))
        })
    }

    async fn read_credential(path: &Path, service: Service) -> AppResult<StoredCredential> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Authentication(format!(
                "no stored credential for {} at {}: {e}; run the consent flow to create it",
                service.as_str(),
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            AppError::Authentication(format!(
                "unreadable credential for {} at {}: {e}",
                service.as_str(),
                path.display()
            ))
        })
    }

    #[tracing::instrument(name = "auth refresh", skip(self, credential), fields(auth.service = service.as_str()))]
    async fn refresh(
        &self,
        service: Service,
        credential: &StoredCredential,
    ) -> AppResult<(String, Option<DateTime<Utc>>)> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            credential.refresh_token.as_deref(),
            credential.client_id.as_deref(),
            credential.client_secret.as_deref(),
        ) else {
            return Err(AppError::Authentication(format!(
                "credential for {} is expired and cannot be refreshed; re-run the consent flow",
                service.as_str()
            )));
        };

        let token_uri = credential
            .token_uri
            .as_deref()
            .unwrap_or(&self.default_token_uri);

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];

        let response = self
            .http
            .post(token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| AppError::Authentication(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Authentication(format!(
                "token refresh for {} rejected with {status}: {body}",
                service.as_str()
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AppError::Authentication(format!("invalid token response: {e}")))?;

        let expires_at = refreshed
            .expires_in
            .map(|secs| Utc::now() + chrono::Duration::seconds(secs));

        tracing::info!(service = service.as_str(), "Access token refreshed");
        Ok((refreshed.access_token, expires_at))
    }

    async fn persist(path: &Path, credential: &StoredCredential) {
        let result = match serde_json::to_string_pretty(credential) {
            Ok(json) => tokio::fs::write(path, json).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(error) = result {
            tracing::warn!(path = %path.display(), %error, "Could not save refreshed credential");
        }
    }
}

#[async_trait::async_trait]
impl TokenProvider for StoredTokenProvider {
    async fn get_token(&self, service: Service) -> AppResult<AccessToken> {
        let margin = chrono::Duration::seconds(EXPIRY_MARGIN_SECS);

        {
            let cache = self.cache.read().await;
            if let Some(token) = cache.get(&service)
                && token.is_fresh(Utc::now(), margin)
            {
                return Ok(token.clone());
            }
        }

        let path = self.credential_path(service)?;
        let mut credential = Self::read_credential(path, service).await?;

        let stored = credential.token.clone().map(|value| AccessToken {
            value,
            expires_at: credential.expiry,
        });

        let token = match stored {
            Some(token) if token.is_fresh(Utc::now(), margin) => token,
            _ => {
                let (value, expires_at) = self.refresh(service, &credential).await?;
                credential.token = Some(value.clone());
                credential.expiry = expires_at;
                Self::persist(path, &credential).await;
                AccessToken { value, expires_at }
            }
        };

        self.cache.write().await.insert(service, token.clone());
        Ok(token)
    }
}
