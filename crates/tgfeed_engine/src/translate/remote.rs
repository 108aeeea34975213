use std::fmt;
use std::time::Duration;

use feed_logging::feed_debug;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{TranslateError, Translator};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct RemoteSettings {
    /// Bearer credential; its presence selects the remote backend in auto mode.
    pub api_key: Option<String>,
    /// Base of an OpenAI-compatible API; `/chat/completions` is appended.
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

// Keep the credential out of logs.
impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Chat-completions client that translates and tidies one post per request.
pub struct RemoteTranslator {
    client: reqwest::Client,
    settings: RemoteSettings,
    api_key: String,
    source_lang: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteTranslator {
    pub fn new(
        settings: RemoteSettings,
        api_key: String,
        source_lang: &str,
    ) -> Result<Self, TranslateError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|err| TranslateError::Network(err.to_string()))?;
        Ok(Self {
            client,
            settings,
            api_key,
            source_lang: source_lang.to_string(),
        })
    }

    fn system_prompt(&self, target_lang: &str) -> String {
        format!(
            "You translate Telegram channel posts from language '{}' to language '{}'. \
             Return only the translated post. Preserve line breaks, paragraphs, emoji, \
             URLs, hashtags and @mentions. Do not add commentary.",
            self.source_lang, target_lang
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.settings.endpoint.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl Translator for RemoteTranslator {
    fn name(&self) -> &str {
        "remote"
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        let prompt = self.system_prompt(target_lang);
        let request = ChatRequest {
            model: &self.settings.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
        };

        feed_debug!(
            "Requesting translation of {} chars from {}",
            text.chars().count(),
            self.settings.model
        );
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranslateError::RateLimited);
        }
        if !status.is_success() {
            return Err(TranslateError::HttpStatus(status.as_u16()));
        }

        let body: ChatResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                TranslateError::Timeout
            } else {
                TranslateError::InvalidResponse(err.to_string())
            }
        })?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| TranslateError::InvalidResponse("no choices in response".into()))?;

        let content = content.trim();
        if content.is_empty() {
            return Err(TranslateError::EmptyOutput);
        }
        Ok(content.to_string())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TranslateError {
    if err.is_timeout() {
        TranslateError::Timeout
    } else {
        TranslateError::Network(err.to_string())
    }
}
