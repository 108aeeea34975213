//! Translation backends and the per-post translation step.
mod fallback;
mod offline;
mod remote;

use serde::{Deserialize, Serialize};
use tgfeed_core::TranslationOutcome;

use crate::config::{ConfigError, TranslatorSettings, API_KEY_ENV};

pub use fallback::FallbackTranslator;
pub use offline::{OfflineSettings, OfflineTranslator};
pub use remote::{RemoteSettings, RemoteTranslator};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("translation timed out")]
    Timeout,
    #[error("translation service rate limited the request")]
    RateLimited,
    #[error("translation service returned http status {0}")]
    HttpStatus(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response from translation service: {0}")]
    InvalidResponse(String),
    #[error("translation backend unavailable: {0}")]
    Unavailable(String),
    #[error("translator command {program} failed: {message}")]
    Command { program: String, message: String },
    #[error("translation came back empty")]
    EmptyOutput,
}

/// Capability: turn `text` into `target_lang`.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError>;
}

/// Which backend the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorChoice {
    /// Remote when a credential is configured, otherwise offline.
    #[default]
    Auto,
    Remote,
    Offline,
    None,
}

impl std::str::FromStr for TranslatorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "remote" => Ok(Self::Remote),
            "offline" => Ok(Self::Offline),
            "none" => Ok(Self::None),
            other => Err(format!(
                "unknown translator {other:?} (expected auto, remote, offline or none)"
            )),
        }
    }
}

/// Backend selection resolved once at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationPlan {
    Disabled,
    Offline,
    Remote,
    /// Auto mode with a credential: remote first, offline for posts it fails on.
    RemoteThenOffline,
}

impl TranslationPlan {
    pub fn resolve(choice: TranslatorChoice, has_credential: bool) -> Result<Self, ConfigError> {
        match (choice, has_credential) {
            (TranslatorChoice::None, _) => Ok(Self::Disabled),
            (TranslatorChoice::Offline, _) => Ok(Self::Offline),
            (TranslatorChoice::Remote, true) => Ok(Self::Remote),
            (TranslatorChoice::Remote, false) => Err(ConfigError::MissingCredential(API_KEY_ENV)),
            (TranslatorChoice::Auto, true) => Ok(Self::RemoteThenOffline),
            (TranslatorChoice::Auto, false) => Ok(Self::Offline),
        }
    }
}

pub fn build_translator(
    plan: TranslationPlan,
    settings: &TranslatorSettings,
) -> Result<Option<Box<dyn Translator>>, ConfigError> {
    let offline = || OfflineTranslator::new(settings.offline.clone(), &settings.source_lang);
    let remote = || -> Result<RemoteTranslator, ConfigError> {
        let api_key = settings
            .remote
            .api_key
            .clone()
            .ok_or(ConfigError::MissingCredential(API_KEY_ENV))?;
        RemoteTranslator::new(settings.remote.clone(), api_key, &settings.source_lang)
            .map_err(|err| ConfigError::Client(err.to_string()))
    };

    let translator: Option<Box<dyn Translator>> = match plan {
        TranslationPlan::Disabled => None,
        TranslationPlan::Offline => Some(Box::new(offline())),
        TranslationPlan::Remote => Some(Box::new(remote()?)),
        TranslationPlan::RemoteThenOffline => Some(Box::new(FallbackTranslator::new(vec![
            Box::new(remote()?),
            Box::new(offline()),
        ]))),
    };
    Ok(translator)
}

/// Runs one translation and folds every failure into the outcome value.
///
/// Output identical to the source means the post is already in the target
/// language; it is reported as `Unchanged` rather than translated.
pub async fn translate_text(
    translator: &dyn Translator,
    text: &str,
    target_lang: &str,
) -> TranslationOutcome {
    match translator.translate(text, target_lang).await {
        Ok(output) => {
            let output = output.trim();
            if output.is_empty() {
                TranslationOutcome::Failed {
                    reason: TranslateError::EmptyOutput.to_string(),
                }
            } else if output == text.trim() {
                TranslationOutcome::Unchanged
            } else {
                TranslationOutcome::Translated(output.to_string())
            }
        }
        Err(err) => TranslationOutcome::Failed {
            reason: format!("{}: {err}", translator.name()),
        },
    }
}
