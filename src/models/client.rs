use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    #[serde(default)]
    pub gsc_property_url: Option<String>,
    #[serde(default)]
    pub ga4_property_id: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClientFile {
    clients: Vec<Client>,
}

impl Client {
    /// File-name safe form of the client name: `Acme & Co.` becomes `Acme-Co`.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.name.len());
        for c in self.name.trim().chars() {
            if c.is_ascii_alphanumeric() {
                slug.push(c);
            } else if !slug.ends_with('-') && !slug.is_empty() {
                slug.push('-');
            }
        }
        slug.trim_end_matches('-').to_string()
    }

    pub fn load_all(path: &Path) -> AppResult<Vec<Client>> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("cannot read client list {}: {e}", path.display()))
        })?;
        Self::parse_all(&raw)
    }

    pub fn parse_all(raw: &str) -> AppResult<Vec<Client>> {
        let file: ClientFile = serde_yaml::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid client list: {e}")))?;

        let mut seen = HashSet::new();
        for client in &file.clients {
            if client.name.trim().is_empty() {
                return Err(AppError::Config("client with empty name".to_string()));
            }
            if !seen.insert(client.name.trim().to_lowercase()) {
                return Err(AppError::Config(format!(
                    "duplicate client name '{}'",
                    client.name
                )));
            }
        }

        Ok(file.clients)
    }
}

/// Client name to email addresses. Lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone, Default)]
pub struct RecipientMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl RecipientMap {
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Recipient file not found, no client will receive email");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> AppResult<Self> {
        let parsed: BTreeMap<String, Vec<String>> = serde_yaml::from_str(raw)
            .map_err(|e| AppError::Config(format!("invalid recipient map: {e}")))?;
        Ok(Self::from_entries(parsed))
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, emails) in entries {
            let slot = map.entry(normalize(&name)).or_default();
            for email in emails {
                let email = email.trim();
                if !email.is_empty() && !slot.iter().any(|e| e.eq_ignore_ascii_case(email)) {
                    slot.push(email.to_string());
                }
            }
        }
        Self { entries: map }
    }

    pub fn recipients_for(&self, client_name: &str) -> &[String] {
        self.entries
            .get(&normalize(client_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
