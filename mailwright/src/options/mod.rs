//! Setting resolution with provenance.
//!
//! A setting such as `host` is looked up in this order:
//!
//! | Tier | Where | [`Source`] |
//! |------|-------|------------|
//! | 1 | `SMTP_HOST` environment variable (non-empty) | `Env` |
//! | 2 | `SMTP_HOST` in the constants file | `Const` |
//! | 3 | network-wide option map (multisite only) | `Multisite` |
//! | 4 | local option map | `Config` |
//!
//! Only `Config` values are editable; anything else is authoritative and
//! should be shown read-only.
//!
//! Secrets in tiers 3 and 4 may be encrypted. Each encrypted entry `name` has
//! a companion `name_d` flag (`1` encrypted, `0` or absent plaintext) so that
//! plaintext rows written before a key was configured keep working.

mod store;

pub use store::{MemoryOptionStore, OptionStore, SqliteOptionStore};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Constants;
use crate::crypto::{CryptoError, EncryptionKey};

/// Option key holding the local settings map.
pub const LOCAL_KEY: &str = "smtp";
/// Option key holding the network-wide settings map.
pub const NETWORK_KEY: &str = "smtp_network";
/// Option key holding the encrypted canary used by [`Options::check_encryption_key`].
pub const CANARY_KEY: &str = "smtp_echk";

const CANARY: &str = "helloworld";

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("option storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("option encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    Env,
    Const,
    Multisite,
    Config,
}

impl Source {
    /// Only locally persisted values may be changed from a settings screen.
    pub fn is_editable(&self) -> bool {
        matches!(self, Source::Config)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env => write!(f, "ENV"),
            Self::Const => write!(f, "CONST"),
            Self::Multisite => write!(f, "MULTISITE"),
            Self::Config => write!(f, "CONFIG"),
        }
    }
}

/// A resolved setting and its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionValue {
    pub value: String,
    pub source: Source,
}

impl OptionValue {
    fn new(value: impl Into<String>, source: Source) -> Self {
        OptionValue {
            value: value.into(),
            source,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Loose boolean parsing: `1`, `true`, `on` and `yes` are true.
    pub fn as_bool(&self) -> bool {
        parse_bool(&self.value)
    }

    pub fn as_u16(&self) -> Option<u16> {
        self.value.trim().parse().ok()
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Result of [`Options::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSecret {
    pub value: String,
    /// Serialized as the companion `_d` flag.
    pub encrypted: bool,
}

/// Resolves settings across environment, constants and persisted options.
#[derive(Clone)]
pub struct Options {
    store: Arc<dyn OptionStore>,
    constants: Constants,
    key: Option<EncryptionKey>,
    multisite: bool,
}

impl Options {
    pub fn new(store: Arc<dyn OptionStore>) -> Self {
        Options {
            store,
            constants: Constants::default(),
            key: None,
            multisite: false,
        }
    }

    pub fn constants(mut self, constants: Constants) -> Self {
        self.constants = constants;
        self
    }

    /// Without a key, secrets are stored and read as plaintext.
    pub fn encryption_key(mut self, key: Option<EncryptionKey>) -> Self {
        self.key = key;
        self
    }

    pub fn multisite(mut self, multisite: bool) -> Self {
        self.multisite = multisite;
        self
    }

    pub fn can_encrypt(&self) -> bool {
        self.key.is_some()
    }

    /// Environment/constant name for an option: `host` -> `SMTP_HOST`.
    pub fn env_name(name: &str) -> String {
        format!("SMTP_{}", name.to_uppercase())
    }

    /// Resolves `name` by precedence.
    ///
    /// With `blank_on_empty` an unset option resolves to `""` instead of `None`.
    /// With `network_only` only the network-wide map is consulted.
    pub async fn get(
        &self,
        name: &str,
        blank_on_empty: bool,
        network_only: bool,
    ) -> Result<Option<OptionValue>, OptionsError> {
        let sysname = Self::env_name(name);

        if !network_only {
            if let Ok(value) = std::env::var(&sysname) {
                if !value.is_empty() {
                    return Ok(Some(OptionValue::new(value, Source::Env)));
                }
            }

            if let Some(value) = self.constants.get(&sysname) {
                return Ok(Some(OptionValue::new(value, Source::Const)));
            }
        }

        if self.multisite {
            let network = self.load_map(NETWORK_KEY).await?;
            if network.contains_key(name) {
                let value = self.maybe_decrypt(&network, name).await;
                return Ok(Some(OptionValue::new(value, Source::Multisite)));
            }
        }

        let fallback = if network_only {
            Source::Multisite
        } else {
            let local = self.load_map(LOCAL_KEY).await?;
            if local.contains_key(name) {
                let value = self.maybe_decrypt(&local, name).await;
                return Ok(Some(OptionValue::new(value, Source::Config)));
            }
            Source::Config
        };

        Ok(blank_on_empty.then(|| OptionValue::new("", fallback)))
    }

    /// The resolved value of `name`, or `""` when unset.
    pub async fn value(&self, name: &str) -> Result<String, OptionsError> {
        Ok(self
            .get(name, true, false)
            .await?
            .map(|v| v.value)
            .unwrap_or_default())
    }

    /// The resolved value of `name` read as a boolean flag.
    pub async fn flag(&self, name: &str) -> Result<bool, OptionsError> {
        Ok(parse_bool(&self.value(name).await?))
    }

    /// Encrypts `value` when a key is configured; otherwise passes it through.
    pub async fn encrypt(&self, name: &str, value: &str) -> Result<StoredSecret, OptionsError> {
        let Some(key) = self.key.clone() else {
            tracing::debug!(option = name, "no encryption key configured, storing plaintext");
            return Ok(StoredSecret {
                value: value.to_string(),
                encrypted: false,
            });
        };

        self.set_encryption_test().await?;

        match key.seal(value).await {
            Ok(ciphertext) => Ok(StoredSecret {
                value: ciphertext,
                encrypted: true,
            }),
            Err(e) => {
                tracing::warn!(option = name, error = %e, "encryption failed, storing plaintext");
                Ok(StoredSecret {
                    value: value.to_string(),
                    encrypted: false,
                })
            }
        }
    }

    /// Returns `options[name]`, decrypting it if its `_d` flag says so.
    pub async fn maybe_decrypt(&self, options: &Map<String, Value>, name: &str) -> String {
        let raw = options.get(name).map(scalar_to_string).unwrap_or_default();

        let encrypted = options
            .get(&format!("{name}_d"))
            .map(|flag| parse_bool(&scalar_to_string(flag)))
            .unwrap_or(false);

        if !encrypted {
            return raw;
        }

        let Some(key) = self.key.clone() else {
            tracing::warn!(option = name, "value is encrypted but no key is configured");
            return raw;
        };

        match key.open(&raw).await {
            Ok(plain) => plain,
            Err(e) => {
                tracing::warn!(option = name, error = %e, "unable to decrypt stored value");
                String::new()
            }
        }
    }

    /// Saves `name` into the local settings map.
    pub async fn set(&self, name: &str, value: &str, secret: bool) -> Result<bool, OptionsError> {
        self.write(LOCAL_KEY, name, value, secret).await
    }

    /// Saves `name` into the network-wide settings map.
    pub async fn set_network(
        &self,
        name: &str,
        value: &str,
        secret: bool,
    ) -> Result<bool, OptionsError> {
        self.write(NETWORK_KEY, name, value, secret).await
    }

    async fn write(
        &self,
        key: &str,
        name: &str,
        value: &str,
        secret: bool,
    ) -> Result<bool, OptionsError> {
        let mut map = self.load_map(key).await?;
        let flag = format!("{name}_d");

        if secret {
            let stored = self.encrypt(name, value).await?;
            map.insert(name.to_string(), Value::String(stored.value));
            map.insert(flag, Value::from(u8::from(stored.encrypted)));
        } else {
            map.insert(name.to_string(), Value::String(value.to_string()));
            map.remove(&flag);
        }

        self.store.set_option(key, Value::Object(map)).await
    }

    /// Stores an encrypted canary so a later key change can be detected.
    pub async fn set_encryption_test(&self) -> Result<bool, OptionsError> {
        let Some(key) = self.key.clone() else {
            return Ok(false);
        };
        let canary = key.seal(CANARY).await?;
        self.store.set_option(CANARY_KEY, Value::String(canary)).await
    }

    /// Reports whether the configured key still decrypts the stored canary.
    pub async fn check_encryption_key(&self) -> Result<bool, OptionsError> {
        let Some(key) = self.key.clone() else {
            return Ok(false);
        };
        let Some(Value::String(canary)) = self.store.get_option(CANARY_KEY).await? else {
            return Ok(false);
        };

        Ok(key.open(&canary)
            .await
            .map(|plain| plain == CANARY)
            .unwrap_or(false))
    }

    async fn load_map(&self, key: &str) -> Result<Map<String, Value>, OptionsError> {
        match self.store.get_option(key).await? {
            Some(Value::Object(map)) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> EncryptionKey {
        EncryptionKey::try_from(&[9u8; 32][..]).unwrap()
    }

    fn options() -> (Options, Arc<MemoryOptionStore>) {
        let store = Arc::new(MemoryOptionStore::new());
        (Options::new(store.clone()), store)
    }

    #[tokio::test]
    async fn unset_option_is_blank_or_none() {
        let (options, _) = options();

        let blank = options.get("unittest_missing", true, false).await.unwrap();
        assert_eq!(blank, Some(OptionValue::new("", Source::Config)));

        let none = options.get("unittest_missing", false, false).await.unwrap();
        assert_eq!(none, None);

        let network = options.get("unittest_missing", true, true).await.unwrap();
        assert_eq!(network, Some(OptionValue::new("", Source::Multisite)));
    }

    #[tokio::test]
    async fn precedence_env_const_network_local() {
        let (options, store) = options();
        store
            .set_option(LOCAL_KEY, json!({ "unittest_prec": "local" }))
            .await
            .unwrap();

        let local = options.get("unittest_prec", true, false).await.unwrap().unwrap();
        assert_eq!(local, OptionValue::new("local", Source::Config));
        assert!(local.source.is_editable());

        store
            .set_option(NETWORK_KEY, json!({ "unittest_prec": "network" }))
            .await
            .unwrap();
        let options = options.multisite(true);
        let network = options.get("unittest_prec", true, false).await.unwrap().unwrap();
        assert_eq!(network.source, Source::Multisite);

        let options =
            options.constants(Constants::from_iter([("SMTP_UNITTEST_PREC", "constant")]));
        let constant = options.get("unittest_prec", true, false).await.unwrap().unwrap();
        assert_eq!(constant, OptionValue::new("constant", Source::Const));
        assert!(!constant.source.is_editable());

        std::env::set_var("SMTP_UNITTEST_PREC", "env");
        let env = options.get("unittest_prec", true, false).await.unwrap().unwrap();
        assert_eq!(env, OptionValue::new("env", Source::Env));

        // network_only skips env and constants
        let network_only = options.get("unittest_prec", true, true).await.unwrap().unwrap();
        assert_eq!(network_only, OptionValue::new("network", Source::Multisite));
        std::env::remove_var("SMTP_UNITTEST_PREC");
    }

    #[tokio::test]
    async fn empty_env_var_is_ignored() {
        let (options, store) = options();
        store
            .set_option(LOCAL_KEY, json!({ "unittest_emptyenv": "stored" }))
            .await
            .unwrap();
        std::env::set_var("SMTP_UNITTEST_EMPTYENV", "");

        let value = options.get("unittest_emptyenv", true, false).await.unwrap().unwrap();
        assert_eq!(value.source, Source::Config);

        std::env::remove_var("SMTP_UNITTEST_EMPTYENV");
    }

    #[tokio::test]
    async fn encrypted_secret_roundtrips() {
        let (options, _) = options();
        let options = options.encryption_key(Some(key()));

        let stored = options.encrypt("pass", "ab123@*").await.unwrap();
        assert!(stored.encrypted);
        assert_ne!(stored.value, "ab123@*");

        let mut map = Map::new();
        map.insert("password".into(), json!(stored.value));
        map.insert("password_d".into(), json!(1));
        assert_eq!(options.maybe_decrypt(&map, "password").await, "ab123@*");
    }

    #[tokio::test]
    async fn missing_key_passes_plaintext_through() {
        let (options, _) = options();

        let stored = options.encrypt("pass", "pa$$ wörd").await.unwrap();
        assert_eq!(
            stored,
            StoredSecret {
                value: "pa$$ wörd".into(),
                encrypted: false
            }
        );

        let mut map = Map::new();
        map.insert("pass".into(), json!(stored.value));
        map.insert("pass_d".into(), json!(0));
        assert_eq!(options.maybe_decrypt(&map, "pass").await, "pa$$ wörd");
    }

    #[tokio::test]
    async fn legacy_plaintext_rows_still_resolve_with_a_key() {
        let (options, store) = options();
        let options = options.encryption_key(Some(key()));
        store
            .set_option(LOCAL_KEY, json!({ "unittest_legacy": "plain" }))
            .await
            .unwrap();

        assert_eq!(options.value("unittest_legacy").await.unwrap(), "plain");
    }

    #[tokio::test]
    async fn set_secret_stores_flag_and_resolves() {
        let (options, store) = options();
        let options = options.encryption_key(Some(key()));

        options.set("unittest_secret", "s3cret", true).await.unwrap();

        let raw = store.get_option(LOCAL_KEY).await.unwrap().unwrap();
        assert_eq!(raw["unittest_secret_d"], json!(1));
        assert_ne!(raw["unittest_secret"], json!("s3cret"));
        assert_eq!(options.value("unittest_secret").await.unwrap(), "s3cret");
    }

    #[tokio::test]
    async fn wrong_key_decrypts_to_blank() {
        let (options, _) = options();
        let writer = options.clone().encryption_key(Some(key()));
        writer.set("unittest_rotated", "s3cret", true).await.unwrap();

        let reader = options.encryption_key(Some(EncryptionKey::try_from(&[3u8; 32][..]).unwrap()));
        assert_eq!(reader.value("unittest_rotated").await.unwrap(), "");
    }

    #[tokio::test]
    async fn encryption_canary_detects_key_change() {
        let (options, _) = options();
        let original = options.clone().encryption_key(Some(key()));

        assert!(!original.check_encryption_key().await.unwrap());
        original.set_encryption_test().await.unwrap();
        assert!(original.check_encryption_key().await.unwrap());

        let rotated =
            options.encryption_key(Some(EncryptionKey::try_from(&[4u8; 32][..]).unwrap()));
        assert!(!rotated.check_encryption_key().await.unwrap());
    }

    #[tokio::test]
    async fn network_settings_apply_only_on_multisite() {
        let (options, store) = options();
        options.set("unittest_net", "local", false).await.unwrap();
        assert!(options.set_network("unittest_net", "network", false).await.unwrap());

        assert_eq!(
            store.get_option(NETWORK_KEY).await.unwrap(),
            Some(json!({ "unittest_net": "network" }))
        );
        assert_eq!(options.value("unittest_net").await.unwrap(), "local");

        let options = options.multisite(true);
        let resolved = options.get("unittest_net", true, false).await.unwrap().unwrap();
        assert_eq!(resolved, OptionValue::new("network", Source::Multisite));
    }

    #[tokio::test]
    async fn network_secret_is_encrypted() {
        let (options, store) = options();
        let options = options.encryption_key(Some(key())).multisite(true);

        options.set_network("unittest_netpass", "s3cret", true).await.unwrap();

        let Some(Value::Object(map)) = store.get_option(NETWORK_KEY).await.unwrap() else {
            panic!("network map missing");
        };
        assert_ne!(map["unittest_netpass"], json!("s3cret"));
        assert_eq!(map["unittest_netpass_d"], json!(1));
        assert_eq!(options.value("unittest_netpass").await.unwrap(), "s3cret");
    }

    #[test]
    fn loose_booleans() {
        for yes in ["1", "true", "TRUE", "on", "yes"] {
            assert!(OptionValue::new(yes, Source::Config).as_bool(), "{yes}");
        }
        for no in ["", "0", "false", "off", "nope"] {
            assert!(!OptionValue::new(no, Source::Config).as_bool(), "{no}");
        }
    }
}
