use std::path::PathBuf;

use tgfeed_core::{ChannelName, ChannelNameError};
use url::Url;

use crate::fetch::FetchSettings;
use crate::translate::{OfflineSettings, RemoteSettings, TranslationPlan, TranslatorChoice};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const MODEL_ENV: &str = "OPENAI_MODEL";
pub const ENDPOINT_ENV: &str = "OPENAI_BASE_URL";
pub const OFFLINE_COMMAND_ENV: &str = "TGFEED_OFFLINE_COMMAND";

pub const DEFAULT_BASE_URL: &str = "https://t.me";
pub const DEFAULT_LIMIT: usize = 25;
pub const DEFAULT_OUTPUT: &str = "feed.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid channel: {0}")]
    Channel(#[from] ChannelNameError),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("remote translator selected but {0} is not set")]
    MissingCredential(&'static str),
    #[error("failed to set up translation client: {0}")]
    Client(String),
}

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub source_lang: String,
    pub target_lang: String,
    pub remote: RemoteSettings,
    pub offline: OfflineSettings,
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            source_lang: "ru".to_string(),
            target_lang: "en".to_string(),
            remote: RemoteSettings::default(),
            offline: OfflineSettings::default(),
        }
    }
}

impl TranslatorSettings {
    /// Applies credential, model, endpoint and offline-program overrides from
    /// the environment. Called once at start-up; nothing else reads these vars.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = optional_env(API_KEY_ENV) {
            self.remote.api_key = Some(key);
        }
        if let Some(model) = optional_env(MODEL_ENV) {
            self.remote.model = model;
        }
        if let Some(endpoint) = optional_env(ENDPOINT_ENV) {
            self.remote.endpoint = endpoint;
        }
        if let Some(program) = optional_env(OFFLINE_COMMAND_ENV) {
            self.offline.program = program;
        }
        self
    }

    pub fn has_remote_credential(&self) -> bool {
        self.remote
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

/// Everything one run needs, fixed before the pipeline starts.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub channel: ChannelName,
    pub limit: usize,
    pub output: PathBuf,
    pub base_url: String,
    pub translator: TranslatorChoice,
    pub fetch: FetchSettings,
    pub translation: TranslatorSettings,
}

impl FeedConfig {
    pub fn new(channel: ChannelName) -> Self {
        Self {
            channel,
            limit: DEFAULT_LIMIT,
            output: PathBuf::from(DEFAULT_OUTPUT),
            base_url: DEFAULT_BASE_URL.to_string(),
            translator: TranslatorChoice::default(),
            fetch: FetchSettings::default(),
            translation: TranslatorSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(invalid("limit", "must be at least 1"));
        }
        match Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(invalid("base_url", "must be an absolute http(s) url")),
        }
        if self.output.as_os_str().is_empty() || self.output.file_name().is_none() {
            return Err(invalid("output", "must name a file"));
        }
        if self.translation.target_lang.trim().is_empty() {
            return Err(invalid("target_lang", "cannot be empty"));
        }
        if self.translation.source_lang.trim().is_empty() {
            return Err(invalid("source_lang", "cannot be empty"));
        }
        Ok(())
    }

    pub fn translation_plan(&self) -> Result<TranslationPlan, ConfigError> {
        TranslationPlan::resolve(self.translator, self.translation.has_remote_credential())
    }

    /// `https://t.me/<channel>`, recorded in the feed document.
    pub fn source_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.channel)
    }
}

fn invalid(name: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FeedConfig {
        FeedConfig::new(ChannelName::parse("sample_channel").unwrap())
    }

    #[test]
    fn defaults_are_valid() {
        let config = config();
        config.validate().unwrap();
        assert_eq!(config.limit, DEFAULT_LIMIT);
        assert_eq!(config.source_url(), "https://t.me/sample_channel");
    }

    #[test]
    fn zero_limit_and_bad_base_url_are_rejected() {
        let mut config = config();
        config.limit = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref name, .. }) if name == "limit"
        ));

        let mut config = self::config();
        config.base_url = "ftp://t.me".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn plan_depends_on_credential_only_in_auto_mode() {
        let mut config = config();
        assert_eq!(config.translation_plan().unwrap(), TranslationPlan::Offline);

        config.translation.remote.api_key = Some("sk-test".to_string());
        assert_eq!(
            config.translation_plan().unwrap(),
            TranslationPlan::RemoteThenOffline
        );

        config.translator = TranslatorChoice::None;
        assert_eq!(config.translation_plan().unwrap(), TranslationPlan::Disabled);

        config.translator = TranslatorChoice::Remote;
        config.translation.remote.api_key = Some("  ".to_string());
        assert!(matches!(
            config.translation_plan(),
            Err(ConfigError::MissingCredential(API_KEY_ENV))
        ));
    }
}
