use std::path::Path;

use crate::error::{AppError, AppResult};

/// Makes a local file reachable by URL so emailed reports can embed it.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    async fn upload(&self, path: &Path) -> AppResult<String>;
}

/// Uploads files with an HTTP `PUT` to `{upload_url}/{file name}`. The file is
/// then expected to be served from `{public_base_url}/{file name}`.
pub struct HttpPublisher {
    http: reqwest::Client,
    upload_url: String,
    public_base_url: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpPublisher {
    pub fn new(
        http: reqwest::Client,
        upload_url: impl Into<String>,
        public_base_url: impl Into<String>,
        credentials: Option<(String, Option<String>)>,
    ) -> Self {
        Self {
            http,
            upload_url: upload_url.into().trim_end_matches('/').to_string(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// `None` when no upload endpoint or image host is configured.
    pub fn from_config(http: reqwest::Client, config: &crate::config::Config) -> Option<Self> {
        let upload_url = config.upload_url.clone()?;
        let public_base_url = config.image_host_url.clone()?;
        let credentials = config
            .upload_username
            .clone()
            .map(|user| (user, config.upload_password.clone()));
        Some(Self::new(http, upload_url, public_base_url, credentials))
    }

    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.public_base_url, urlencoding::encode(file_name))
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("html") => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[async_trait::async_trait]
impl Publisher for HttpPublisher {
    #[tracing::instrument(name = "asset upload", skip(self), fields(http.response.status_code))]
    async fn upload(&self, path: &Path) -> AppResult<String> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Transfer(format!("not a file: {}", path.display())))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::Transfer(format!("cannot read {}: {e}", path.display())))?;

        let target = format!("{}/{}", self.upload_url, urlencoding::encode(file_name));
        let mut request = self
            .http
            .put(&target)
            .header(reqwest::header::CONTENT_TYPE, content_type(path))
            .body(bytes);
        if let Some((user, password)) = &self.credentials {
            request = request.basic_auth(user, password.as_deref());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Transfer(format!("upload of {file_name} timed out"))
            } else {
                AppError::Transfer(format!("upload of {file_name} failed: {e}"))
            }
        })?;
        let status = response.status();
        tracing::Span::current().record("http.response.status_code", status.as_u16());
        if !status.is_success() {
            return Err(AppError::Transfer(format!(
                "upload of {file_name} returned {status}"
            )));
        }

        let url = self.public_url(file_name);
        tracing::debug!(%url, "asset published");
        Ok(url)
    }
}
