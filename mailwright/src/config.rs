use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

pub use ::config::ConfigError;

use crate::crypto::{CryptoError, EncryptionKey};
use crate::jobs::Schedule;

/// Prefix for every process-level setting, e.g. `MAILWRIGHT_DATABASE_URL`.
pub const ENV_PREFIX: &str = "MAILWRIGHT";

pub trait EnvConfig: Sized {
    fn from_env() -> Result<Self, ConfigError>;
    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError>;
}

impl<D> EnvConfig for D
where
    D: DeserializeOwned,
{
    fn from_env() -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()
    }

    fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix(prefix))
            .build()?
            .try_deserialize()
    }
}

pub const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Process settings for the mail log and its collaborators.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQLite URL holding the log, the resent ledger and stored options.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Base64 encoded 32 byte key. Without it secrets are stored in plaintext.
    #[serde(default)]
    pub encryption_key: Option<String>,

    /// Optional TOML file of `SMTP_*` constants, checked after the environment.
    #[serde(default)]
    pub constants_file: Option<String>,

    /// Consult network-wide option overrides.
    #[serde(default)]
    pub multisite: bool,

    /// Log entries older than this many days are pruned. `0` keeps them forever.
    #[serde(default = "default_retention_days")]
    pub log_retention_days: u64,

    /// How often the prune job runs, in seconds.
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,

    /// Cron expression for the prune job. Takes precedence over the interval.
    #[serde(default)]
    pub prune_schedule: Option<Schedule>,

    /// Page size used when a caller asks for page size `0`.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// SMTP connection timeout in seconds.
    #[serde(default = "default_smtp_timeout")]
    pub smtp_timeout_secs: u64,

    /// Sender used when neither the options nor the message name one.
    #[serde(default = "default_mail_from")]
    pub mail_from: String,

    /// Site name and address quoted in test emails.
    #[serde(default = "default_site_name")]
    pub site_name: String,

    #[serde(default = "default_site_url")]
    pub site_url: String,
}

fn default_database_url() -> String {
    "sqlite://mailwright.db".to_string()
}

fn default_retention_days() -> u64 {
    0
}

fn default_prune_interval() -> u64 {
    60 * 60 * 24
}

fn default_page_size() -> u32 {
    10
}

fn default_smtp_timeout() -> u64 {
    10
}

fn default_mail_from() -> String {
    "noreply@localhost".to_string()
}

fn default_site_name() -> String {
    "mailwright".to_string()
}

fn default_site_url() -> String {
    "http://localhost".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: default_database_url(),
            encryption_key: None,
            constants_file: None,
            multisite: false,
            log_retention_days: default_retention_days(),
            prune_interval_secs: default_prune_interval(),
            prune_schedule: None,
            page_size: default_page_size(),
            smtp_timeout_secs: default_smtp_timeout(),
            mail_from: default_mail_from(),
            site_name: default_site_name(),
            site_url: default_site_url(),
        }
    }
}

impl Settings {
    /// Loads `.env` (if present) and then reads `MAILWRIGHT_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_with_prefix(ENV_PREFIX)
    }

    /// Parses the configured key. Blank or missing keys disable encryption.
    pub fn encryption_key(&self) -> Result<Option<EncryptionKey>, CryptoError> {
        match self.encryption_key.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(encoded) => EncryptionKey::try_from_base64(encoded).map(Some),
        }
    }

    pub fn retention(&self) -> Option<std::time::Duration> {
        (self.log_retention_days > 0).then(|| {
            std::time::Duration::from_secs(self.log_retention_days.saturating_mul(SECS_PER_DAY))
        })
    }
}

/// Fixed deployment values, the "defined constant" tier of option resolution.
///
/// Keys are normalised to upper case (`SMTP_HOST`).
#[derive(Debug, Clone, Default)]
pub struct Constants(HashMap<String, String>);

impl Constants {
    /// Reads a TOML file of flat `SMTP_NAME = value` pairs. A missing file yields no constants.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw: HashMap<String, config::Value> = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .build()?
            .try_deserialize()?;

        let mut values = HashMap::with_capacity(raw.len());
        for (name, value) in raw {
            values.insert(name.to_uppercase(), value.into_string()?);
        }
        tracing::debug!(path = %path.display(), count = values.len(), "loaded constants");
        Ok(Constants(values))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_uppercase()).map(String::as_str)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.0.contains_key(&name.to_uppercase())
    }
}

impl<K, V> FromIterator<(K, V)> for Constants
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Constants(
            iter.into_iter()
                .map(|(k, v)| (k.into().to_uppercase(), v.into()))
                .collect(),
        )
    }
}
