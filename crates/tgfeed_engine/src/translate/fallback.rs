use feed_logging::feed_warn;

use super::{TranslateError, Translator};

/// Tries each backend in order and returns the first non-empty translation.
pub struct FallbackTranslator {
    chain: Vec<Box<dyn Translator>>,
}

impl FallbackTranslator {
    pub fn new(chain: Vec<Box<dyn Translator>>) -> Self {
        Self { chain }
    }
}

#[async_trait::async_trait]
impl Translator for FallbackTranslator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        let mut last_error = None;
        for (index, backend) in self.chain.iter().enumerate() {
            let err = match backend.translate(text, target_lang).await {
                Ok(output) if !output.trim().is_empty() => return Ok(output),
                Ok(_) => TranslateError::EmptyOutput,
                Err(err) => err,
            };
            if index + 1 < self.chain.len() {
                feed_warn!("{} translator failed ({}); falling back", backend.name(), err);
            }
            last_error = Some(err);
        }
        Err(last_error
            .unwrap_or_else(|| TranslateError::Unavailable("no translation backends".to_string())))
    }
}
