use std::env;
use std::fs;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

/// Runtime configuration for the conversation core. Values come from
/// defaults, then an optional TOML file, then `FRONTDESK_*` environment
/// overrides, in that order.
#[derive(Clone, Debug)]
pub struct ConversationConfig {
    pub business: BusinessConfig,
    pub store: StoreConfig,
    pub booking: BookingConfig,
    pub crm: CrmConfig,
}

#[derive(Clone, Debug)]
pub struct BusinessConfig {
    pub name: String,
    /// Opening line spoken on the first agent turn. `{business}` expands to
    /// the business name.
    pub greeting: String,
}

impl BusinessConfig {
    pub fn rendered_greeting(&self) -> String {
        self.greeting.replace("{business}", &self.name)
    }
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub retention_hours: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub min_party_size: u8,
    pub max_party_size: u8,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Default, Deserialize)]
struct RawConfigFile {
    #[serde(default)]
    business: RawBusiness,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    booking: RawBooking,
    #[serde(default)]
    crm: RawCrm,
}

#[derive(Debug, Default, Deserialize)]
struct RawBusiness {
    name: Option<String>,
    greeting: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStore {
    retention_hours: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBooking {
    min_party_size: Option<u8>,
    max_party_size: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCrm {
    enabled: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            business: BusinessConfig {
                name: "our restaurant".to_string(),
                greeting: "Thanks for calling {business}! How can I help you today?".to_string(),
            },
            store: StoreConfig { retention_hours: 24, sweep_interval_secs: 300 },
            booking: BookingConfig { min_party_size: 1, max_party_size: 20 },
            crm: CrmConfig { enabled: false, api_key: None, base_url: None },
        }
    }
}

impl ConversationConfig {
    /// Loads configuration, layering an optional file and the environment
    /// over the defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = config_path {
            config.apply_file(&path)?;
        }
        config.apply_env_overrides()?;
        config.validate()?;
        tracing::debug!(
            business = %config.business.name,
            crm_enabled = config.crm.enabled,
            "configuration loaded"
        );
        Ok(config)
    }

    fn apply_file(&mut self, path: &PathBuf) -> Result<(), ConfigError> {
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::ReadFile { path: path.clone(), source })?;
        let raw: RawConfigFile = toml::from_str(&contents)
            .map_err(|source| ConfigError::ParseFile { path: path.clone(), source })?;

        if let Some(name) = raw.business.name {
            self.business.name = name;
        }
        if let Some(greeting) = raw.business.greeting {
            self.business.greeting = greeting;
        }
        if let Some(retention_hours) = raw.store.retention_hours {
            self.store.retention_hours = retention_hours;
        }
        if let Some(sweep_interval_secs) = raw.store.sweep_interval_secs {
            self.store.sweep_interval_secs = sweep_interval_secs;
        }
        if let Some(min_party_size) = raw.booking.min_party_size {
            self.booking.min_party_size = min_party_size;
        }
        if let Some(max_party_size) = raw.booking.max_party_size {
            self.booking.max_party_size = max_party_size;
        }
        if let Some(enabled) = raw.crm.enabled {
            self.crm.enabled = enabled;
        }
        if let Some(api_key) = raw.crm.api_key {
            self.crm.api_key = Some(SecretString::from(api_key));
        }
        if let Some(base_url) = raw.crm.base_url {
            self.crm.base_url = Some(base_url);
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("FRONTDESK_BUSINESS_NAME") {
            self.business.name = value;
        }
        if let Some(value) = read_env("FRONTDESK_GREETING") {
            self.business.greeting = value;
        }
        if let Some(value) = read_env("FRONTDESK_RETENTION_HOURS") {
            self.store.retention_hours = parse_u64("FRONTDESK_RETENTION_HOURS", &value)?;
        }
        if let Some(value) = read_env("FRONTDESK_SWEEP_INTERVAL_SECS") {
            self.store.sweep_interval_secs = parse_u64("FRONTDESK_SWEEP_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("FRONTDESK_MAX_PARTY_SIZE") {
            self.booking.max_party_size = parse_u8("FRONTDESK_MAX_PARTY_SIZE", &value)?;
        }
        if let Some(value) = read_env("FRONTDESK_CRM_ENABLED") {
            self.crm.enabled = parse_bool("FRONTDESK_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("FRONTDESK_CRM_API_KEY") {
            self.crm.api_key = Some(SecretString::from(value));
        }
        if let Some(value) = read_env("FRONTDESK_CRM_BASE_URL") {
            self.crm.base_url = Some(value);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.business.name.trim().is_empty() {
            return Err(ConfigError::Validation("business name must not be empty".to_string()));
        }
        if self.store.retention_hours == 0 {
            return Err(ConfigError::Validation("retention window must be at least 1h".to_string()));
        }
        if self.store.sweep_interval_secs == 0 {
            return Err(ConfigError::Validation("sweep interval must be non-zero".to_string()));
        }
        if self.booking.min_party_size == 0
            || self.booking.max_party_size < self.booking.min_party_size
        {
            return Err(ConfigError::Validation(format!(
                "party size bounds are inconsistent: {}..{}",
                self.booking.min_party_size, self.booking.max_party_size
            )));
        }
        if self.crm.enabled && self.crm.api_key.is_none() {
            return Err(ConfigError::Validation(
                "crm is enabled but no api key is configured".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidEnvOverride {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{ConfigError, ConversationConfig};

    #[test]
    fn defaults_validate_and_render_greeting() {
        let config = ConversationConfig::default();
        assert_eq!(config.store.retention_hours, 24);
        assert!(config.business.rendered_greeting().contains("our restaurant"));
    }

    #[test]
    fn file_values_layer_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "[business]\nname = \"Cafe Lumen\"\n\n[store]\nretention_hours = 48\n\n\
             [booking]\nmax_party_size = 12\n"
        )
        .expect("write config");

        let config =
            ConversationConfig::load(Some(file.path().to_path_buf())).expect("load config");
        assert_eq!(config.business.name, "Cafe Lumen");
        assert_eq!(config.store.retention_hours, 48);
        assert_eq!(config.booking.max_party_size, 12);
        // Untouched sections keep their defaults.
        assert_eq!(config.store.sweep_interval_secs, 300);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "business = not-a-table").expect("write config");

        let error = ConversationConfig::load(Some(file.path().to_path_buf()))
            .expect_err("must fail to parse");
        assert!(matches!(error, ConfigError::ParseFile { .. }));
    }

    #[test]
    fn inconsistent_party_bounds_fail_validation() {
        let mut config = ConversationConfig::default();
        config.booking.min_party_size = 8;
        config.booking.max_party_size = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn crm_enabled_requires_an_api_key() {
        let mut config = ConversationConfig::default();
        config.crm.enabled = true;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
