use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Telegram message id, unique within a channel and increasing over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    #[default]
    NotAttempted,
    Success,
    Failed,
    Skipped,
}

/// Result of the translation stage for a single post.
///
/// The post keeps its `raw_text` whatever the outcome, so a failure never
/// loses the original content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationOutcome {
    Translated(String),
    Failed { reason: String },
    Skipped,
    /// The translator returned the source text: it is already in the target language.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub timestamp: Option<DateTime<Utc>>,
    pub raw_text: String,
    pub translated_text: Option<String>,
    pub translation_status: TranslationStatus,
    /// Set with status `skipped` when a translator saw the text and left it as is.
    pub already_in_target: bool,
    pub images: Vec<String>,
    pub source_url: String,
}

impl Post {
    pub fn new(
        id: PostId,
        timestamp: Option<DateTime<Utc>>,
        raw_text: impl Into<String>,
        images: Vec<String>,
        source_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            raw_text: raw_text.into(),
            translated_text: None,
            translation_status: TranslationStatus::NotAttempted,
            already_in_target: false,
            images,
            source_url: source_url.into(),
        }
    }

    /// Records the translation outcome. Blank translations count as failures
    /// so that `Success` always carries text.
    pub fn apply(&mut self, outcome: TranslationOutcome) {
        self.already_in_target = false;
        match outcome {
            TranslationOutcome::Translated(text) if !text.trim().is_empty() => {
                self.translated_text = Some(text);
                self.translation_status = TranslationStatus::Success;
            }
            TranslationOutcome::Translated(_) | TranslationOutcome::Failed { .. } => {
                self.translated_text = None;
                self.translation_status = TranslationStatus::Failed;
            }
            TranslationOutcome::Skipped => {
                self.translated_text = None;
                self.translation_status = TranslationStatus::Skipped;
            }
            TranslationOutcome::Unchanged => {
                self.translated_text = None;
                self.translation_status = TranslationStatus::Skipped;
                self.already_in_target = true;
            }
        }
    }

    pub fn is_translated(&self) -> bool {
        self.translation_status == TranslationStatus::Success && self.translated_text.is_some()
    }

    /// Text shown by the website: the translation when present, else the original.
    pub fn display_text(&self) -> &str {
        match (&self.translated_text, self.translation_status) {
            (Some(text), TranslationStatus::Success) => text,
            _ => &self.raw_text,
        }
    }

    pub fn content_hash(&self) -> String {
        content_hash(&self.raw_text)
    }
}

/// Hex-encoded SHA-256 of the normalized source text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
