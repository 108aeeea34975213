use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::channel::ChannelName;
use crate::post::{content_hash, Post, PostId, TranslationStatus};

/// Bumped whenever the JSON layout changes incompatibly.
pub const FEED_FORMAT_VERSION: u32 = 1;

/// The JSON artifact read by the static website.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDocument {
    #[serde(default = "legacy_version")]
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub channel: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub posts: Vec<Post>,
}

fn legacy_version() -> u32 {
    0
}

impl FeedDocument {
    pub fn new(
        channel: &ChannelName,
        source: impl Into<String>,
        generated_at: DateTime<Utc>,
        posts: Vec<Post>,
    ) -> Self {
        Self {
            version: FEED_FORMAT_VERSION,
            generated_at: generated_at.trunc_subsecs(0),
            channel: channel.to_string(),
            source: source.into(),
            posts,
        }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Pretty-printed, non-ASCII kept verbatim, terminated by a newline.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }

    pub fn post(&self, id: PostId) -> Option<&Post> {
        self.posts.iter().find(|post| post.id == id)
    }
}

/// On-disk shape of a post. `text`/`translated` are what the website renders;
/// `original_text`, `status`, `already_in_target` and `hash` let the next run
/// reuse translations. A `hash` that does not match `original_text` voids the
/// stored translation.
#[derive(Debug, Serialize, Deserialize)]
struct PostRecord {
    id: RecordId,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    translated: bool,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    original_text: Option<String>,
    #[serde(default)]
    status: Option<TranslationStatus>,
    #[serde(default, skip_serializing_if = "is_false")]
    already_in_target: bool,
    #[serde(default)]
    hash: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Older feeds stored ids as strings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum RecordId {
    Number(u64),
    Text(String),
}

impl From<&Post> for PostRecord {
    fn from(post: &Post) -> Self {
        Self {
            id: RecordId::Number(post.id.0),
            timestamp: post.timestamp,
            text: post.display_text().to_string(),
            translated: post.is_translated(),
            images: post.images.clone(),
            url: post.source_url.clone(),
            original_text: Some(post.raw_text.clone()),
            status: Some(post.translation_status),
            already_in_target: post.already_in_target
                && post.translation_status == TranslationStatus::Skipped,
            hash: Some(content_hash(&post.raw_text)),
        }
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = String;

    fn try_from(record: PostRecord) -> Result<Self, Self::Error> {
        let id = match record.id {
            RecordId::Number(n) => n,
            RecordId::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| format!("post id {s:?} is not numeric"))?,
        };

        let translated = record.translated && !record.text.trim().is_empty();
        let (raw_text, translated_text) = if translated {
            // Without the original we cannot prove the source is unchanged;
            // an empty raw text never matches a fresh hash, forcing re-translation.
            (record.original_text.unwrap_or_default(), Some(record.text))
        } else {
            (record.original_text.unwrap_or(record.text), None)
        };
        let hash_matches = record
            .hash
            .as_deref()
            .is_none_or(|hash| hash == content_hash(&raw_text));

        let mut post = Post {
            id: PostId(id),
            timestamp: record.timestamp,
            raw_text,
            translated_text,
            translation_status: TranslationStatus::NotAttempted,
            already_in_target: false,
            images: record.images,
            source_url: record.url,
        };
        if !hash_matches {
            post.translated_text = None;
            return Ok(post);
        }
        if translated {
            post.translation_status = TranslationStatus::Success;
        } else {
            match record.status {
                Some(TranslationStatus::Success) | None => {}
                Some(TranslationStatus::Skipped) => {
                    post.translation_status = TranslationStatus::Skipped;
                    post.already_in_target = record.already_in_target;
                }
                Some(status) => post.translation_status = status,
            }
        }
        Ok(post)
    }
}

impl Serialize for Post {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PostRecord::from(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Post {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let record = PostRecord::deserialize(deserializer)?;
        Post::try_from(record).map_err(serde::de::Error::custom)
    }
}
