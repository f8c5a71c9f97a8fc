use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Summarization timed out after {0:?}")]
    SummarizationTimeout(Duration),

    #[error("Summarization rate limited: {0}")]
    RateLimited(String),

    #[error("Summarization error: {0}")]
    Summarization(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Transfer error: {0}")]
    Transfer(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Stable label used as the `error.type` attribute on spans and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Authentication(_) => "authentication",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::Fetch(_) => "fetch",
            AppError::SummarizationTimeout(_) => "timeout",
            AppError::RateLimited(_) => "rate_limit",
            AppError::Summarization(_) => "summarization",
            AppError::Render(_) => "render",
            AppError::Transfer(_) => "transfer",
            AppError::Delivery(_) => "delivery",
            AppError::Io(_) => "io",
        }
    }

    /// Errors a module cannot work around for the remaining clients. A denied
    /// property is specific to one client and is not among them.
    pub fn is_fatal_for_module(&self) -> bool {
        matches!(self, AppError::Authentication(_) | AppError::Config(_))
    }

    /// Same variant with `context` appended to the message.
    pub(crate) fn with_context(self, context: &str) -> Self {
        match self {
            AppError::Config(msg) => AppError::Config(format!("{msg}; {context}")),
            AppError::Authentication(msg) => AppError::Authentication(format!("{msg}; {context}")),
            AppError::PermissionDenied(msg) => {
                AppError::PermissionDenied(format!("{msg}; {context}"))
            }
            AppError::Fetch(msg) => AppError::Fetch(format!("{msg}; {context}")),
            AppError::RateLimited(msg) => AppError::RateLimited(format!("{msg}; {context}")),
            AppError::Summarization(msg) => AppError::Summarization(format!("{msg}; {context}")),
            AppError::Render(msg) => AppError::Render(format!("{msg}; {context}")),
            AppError::Transfer(msg) => AppError::Transfer(format!("{msg}; {context}")),
            AppError::Delivery(msg) => AppError::Delivery(format!("{msg}; {context}")),
            other @ (AppError::SummarizationTimeout(_) | AppError::Io(_)) => other,
        }
    }
}

impl From<askama::Error> for AppError {
    fn from(err: askama::Error) -> Self {
        AppError::Render(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = AppError::Config("unknown step 'publish'".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: unknown step 'publish'"
        );
    }

    #[test]
    fn test_authentication_error() {
        let error = AppError::Authentication("no stored credential for gmail".to_string());
        assert_eq!(
            error.to_string(),
            "Authentication error: no stored credential for gmail"
        );
    }

    #[test]
    fn test_timeout_error() {
        let error = AppError::SummarizationTimeout(Duration::from_secs(30));
        assert_eq!(error.to_string(), "Summarization timed out after 30s");
    }

    #[test]
    fn test_transfer_error() {
        let error = AppError::Transfer("upload returned 503".to_string());
        assert_eq!(error.to_string(), "Transfer error: upload returned 503");
    }

    #[test]
    fn test_error_kinds() {
        let test_cases = vec![
            (AppError::Config("x".to_string()), "config"),
            (AppError::Authentication("x".to_string()), "authentication"),
            (AppError::PermissionDenied("x".to_string()), "permission_denied"),
            (AppError::Fetch("x".to_string()), "fetch"),
            (
                AppError::SummarizationTimeout(Duration::from_secs(1)),
                "timeout",
            ),
            (AppError::RateLimited("x".to_string()), "rate_limit"),
            (AppError::Summarization("x".to_string()), "summarization"),
            (AppError::Render("x".to_string()), "render"),
            (AppError::Transfer("x".to_string()), "transfer"),
            (AppError::Delivery("x".to_string()), "delivery"),
        ];

        for (error, expected) in test_cases {
            assert_eq!(error.kind(), expected);
        }
    }

    #[test]
    fn test_fatal_for_module() {
        assert!(AppError::Authentication("x".to_string()).is_fatal_for_module());
        assert!(!AppError::PermissionDenied("x".to_string()).is_fatal_for_module());
        assert!(!AppError::Fetch("x".to_string()).is_fatal_for_module());
        assert!(!AppError::Delivery("x".to_string()).is_fatal_for_module());
    }

    #[test]
    fn test_with_context_keeps_variant() {
        let error = AppError::Authentication("token revoked".to_string())
            .with_context("earlier: Acme: Fetch error: HTTP 500");
        assert_eq!(error.kind(), "authentication");
        assert_eq!(
            error.to_string(),
            "Authentication error: token revoked; earlier: Acme: Fetch error: HTTP 500"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: AppError = io.into();
        assert_eq!(error.kind(), "io");
        assert!(error.to_string().contains("missing"));
    }

    #[test]
    fn test_app_result_err() {
        fn returns_err() -> AppResult<i32> {
            Err(AppError::Delivery("smtp down".to_string()))
        }
        let result = returns_err();
        assert!(result.is_err());
    }
}
