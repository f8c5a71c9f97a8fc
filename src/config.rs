use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::mail::DeliveryMode;
use crate::models::{Client, RecipientMap};
use crate::processing::GrowthBasis;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub otel_service_name: String,
    pub otel_exporter_endpoint: Option<String>,

    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub graphs_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub client_config_file: PathBuf,
    pub recipients_file: PathBuf,
    pub pipeline_config_file: PathBuf,

    pub report_lookback_days: u32,
    pub comparison_lookback_days: u32,
    pub year_over_year: bool,
    pub top_n: usize,
    pub opportunity_limit: usize,
    pub growth_basis: GrowthBasis,

    pub analysis_min_chars: usize,
    pub analysis_max_chars: usize,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub llm_max_retries: u32,

    pub external_call_timeout: Duration,

    pub google_token_uri: String,
    pub gsc_api_base: String,
    pub ga4_api_base: String,
    pub gmail_api_base: String,
    pub gsc_token_file: PathBuf,
    pub ga4_token_file: PathBuf,
    pub gmail_token_file: PathBuf,
    pub gsc_row_limit: u32,

    pub upload_url: Option<String>,
    pub upload_username: Option<String>,
    pub upload_password: Option<String>,
    pub image_host_url: Option<String>,

    pub delivery_mode: DeliveryMode,
    pub sender_email: String,
    pub status_recipient: Option<String>,

    pub clients: Vec<Client>,
    pub recipients: RecipientMap,
}

impl Config {
    /// Reads `.env`, the environment, and the client and recipient files.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.clients = Client::load_all(&config.client_config_file)?;
        config.recipients = RecipientMap::load(&config.recipients_file)?;
        Ok(config)
    }

    /// Scalar settings only; `clients` and `recipients` start empty.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        let path = |key: &str, default: &str| PathBuf::from(text(key, default));

        let data_dir = path("DATA_DIR", "data");

        let analysis_min_chars: usize = parse(&var, "ANALYSIS_MIN_CHARS", 400)?;
        let analysis_max_chars: usize = parse(&var, "ANALYSIS_MAX_CHARS", 480)?;
        if analysis_max_chars == 0 || analysis_min_chars > analysis_max_chars {
            return Err(AppError::Config(format!(
                "ANALYSIS_MIN_CHARS ({analysis_min_chars}) must not exceed a non-zero ANALYSIS_MAX_CHARS ({analysis_max_chars})"
            )));
        }

        let timeout_secs: u64 = parse(&var, "EXTERNAL_CALL_TIMEOUT_SECS", 60)?;
        if timeout_secs == 0 {
            return Err(AppError::Config(
                "EXTERNAL_CALL_TIMEOUT_SECS must be positive".to_string(),
            ));
        }

        Ok(Self {
            environment: text("APP_ENVIRONMENT", "development"),
            otel_service_name: text("OTEL_SERVICE_NAME", "seo-report-pipeline"),
            otel_exporter_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),

            reports_dir: path("REPORTS_DIR", "reports"),
            graphs_dir: path("GRAPHS_DIR", "graphs"),
            logs_dir: path("LOGS_DIR", "logs"),
            backup_dir: path("BACKUP_DIR", "backups"),
            client_config_file: path("CLIENT_CONFIG_FILE", "config/clients.yaml"),
            recipients_file: path("EMAIL_RECIPIENTS_FILE", "config/recipients.yaml"),
            pipeline_config_file: path("PIPELINE_CONFIG_FILE", "config/pipeline.yaml"),
            data_dir,

            report_lookback_days: parse(&var, "REPORT_LOOKBACK_DAYS", 30)?,
            comparison_lookback_days: parse(&var, "COMPARISON_LOOKBACK_DAYS", 30)?,
            year_over_year: parse_bool(&var, "YOY_COMPARISON", true)?,
            top_n: parse(&var, "TOP_N", 5)?,
            opportunity_limit: parse(&var, "OPPORTUNITY_LIMIT", 10)?,
            growth_basis: parse(&var, "TOP_PERFORMER_BASIS", GrowthBasis::Absolute)?,

            analysis_min_chars,
            analysis_max_chars,
            openai_api_key: var("OPENAI_API_KEY"),
            openai_base_url: var("OPENAI_BASE_URL"),
            llm_model: text("OPENAI_MODEL", "gpt-4o"),
            llm_temperature: parse(&var, "LLM_TEMPERATURE", 0.7)?,
            llm_max_tokens: parse(&var, "LLM_MAX_TOKENS", 300)?,
            llm_max_retries: parse(&var, "LLM_MAX_RETRIES", 3)?,

            external_call_timeout: Duration::from_secs(timeout_secs),

            google_token_uri: text("GOOGLE_TOKEN_URI", "https://oauth2.googleapis.com/token"),
            gsc_api_base: text("GSC_API_BASE", "https://www.googleapis.com"),
            ga4_api_base: text("GA4_API_BASE", "https://analyticsdata.googleapis.com"),
            gmail_api_base: text("GMAIL_API_BASE", "https://gmail.googleapis.com"),
            gsc_token_file: path("GSC_TOKEN_FILE", "credentials/gsc_token.json"),
            ga4_token_file: path("GA4_TOKEN_FILE", "credentials/ga4_token.json"),
            gmail_token_file: path("GMAIL_TOKEN_FILE", "credentials/gmail_token.json"),
            gsc_row_limit: parse(&var, "GSC_ROW_LIMIT", 25_000)?,

            upload_url: var("UPLOAD_URL"),
            upload_username: var("UPLOAD_USERNAME"),
            upload_password: var("UPLOAD_PASSWORD"),
            image_host_url: var("IMAGE_HOST_URL"),

            delivery_mode: parse(&var, "DELIVERY_MODE", DeliveryMode::Draft)?,
            sender_email: text("SENDER_EMAIL", "me"),
            status_recipient: var("STATUS_RECIPIENT"),

            clients: Vec::new(),
            recipients: RecipientMap::default(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn run_state_path(&self) -> PathBuf {
        self.data_dir.join("run_state.json")
    }
}

fn parse<T, V>(var: &V, key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} has invalid value '{raw}': {e}"))),
        None => Ok(default),
    }
}

fn parse_bool<V>(var: &V, key: &str, default: bool) -> AppResult<bool>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.trim().to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AppError::Config(format!("{key} must be a boolean, got '{v}'"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppResult<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.report_lookback_days, 30);
        assert_eq!(config.comparison_lookback_days, 30);
        assert!(config.year_over_year);
        assert_eq!(config.top_n, 5);
        assert_eq!(config.analysis_max_chars, 480);
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.delivery_mode, DeliveryMode::Draft);
        assert_eq!(config.growth_basis, GrowthBasis::Absolute);
        assert_eq!(config.external_call_timeout, Duration::from_secs(60));
        assert!(config.otel_exporter_endpoint.is_none());
        assert!(config.openai_api_key.is_none());
        assert!(!config.is_production());
        assert_eq!(config.run_state_path(), PathBuf::from("data/run_state.json"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("APP_ENVIRONMENT", "production"),
            ("TOP_N", "3"),
            ("YOY_COMPARISON", "false"),
            ("TOP_PERFORMER_BASIS", "percentage"),
            ("DELIVERY_MODE", "send"),
            ("OPENAI_API_KEY", "sk-test"),
            ("STATUS_RECIPIENT", "ops@agency.example"),
        ])
        .unwrap();
        assert!(config.is_production());
        assert_eq!(config.top_n, 3);
        assert!(!config.year_over_year);
        assert_eq!(config.growth_basis, GrowthBasis::Percentage);
        assert_eq!(config.delivery_mode, DeliveryMode::Send);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.status_recipient.as_deref(), Some("ops@agency.example"));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("OPENAI_API_KEY", "  "), ("TOP_N", "")]).unwrap();
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.top_n, 5);
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = config_from(&[("TOP_N", "five")]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("TOP_N"));
    }

    #[test]
    fn test_invalid_bool_is_config_error() {
        assert!(config_from(&[("YOY_COMPARISON", "maybe")]).is_err());
    }

    #[test]
    fn test_summary_bounds_validated() {
        let err = config_from(&[("ANALYSIS_MIN_CHARS", "500"), ("ANALYSIS_MAX_CHARS", "300")])
            .unwrap_err();
        assert!(err.to_string().contains("ANALYSIS_MIN_CHARS"));
    }
}
