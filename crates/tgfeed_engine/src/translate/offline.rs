use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use feed_logging::feed_trace;
use futures_util::future::try_join;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{TranslateError, Translator};

pub const DEFAULT_OFFLINE_PROGRAM: &str = "argos-translate";
/// Limit for stderr echoed into error messages.
const MAX_STDERR_LEN: usize = 500;

/// Local translation command. `{source}` and `{target}` in `args` are
/// substituted with language codes; the text is written to stdin and the
/// translation read from stdout.
#[derive(Debug, Clone)]
pub struct OfflineSettings {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for OfflineSettings {
    fn default() -> Self {
        Self {
            program: DEFAULT_OFFLINE_PROGRAM.to_string(),
            args: ["--from-lang", "{source}", "--to-lang", "{target}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct OfflineTranslator {
    settings: OfflineSettings,
    source_lang: String,
}

impl OfflineTranslator {
    pub fn new(settings: OfflineSettings, source_lang: &str) -> Self {
        Self {
            settings,
            source_lang: source_lang.to_string(),
        }
    }

    fn args(&self, target_lang: &str) -> Vec<String> {
        self.settings
            .args
            .iter()
            .map(|arg| {
                arg.replace("{source}", &self.source_lang)
                    .replace("{target}", target_lang)
            })
            .collect()
    }

    async fn translate_chunk(&self, chunk: &str, target_lang: &str) -> Result<String, TranslateError> {
        let program = &self.settings.program;
        let mut child = Command::new(program)
            .args(self.args(target_lang))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => {
                    TranslateError::Unavailable(format!("{program} is not installed"))
                }
                _ => TranslateError::Command {
                    program: program.clone(),
                    message: err.to_string(),
                },
            })?;

        // Feeding stdin and collecting output share one deadline; a child that
        // never reads its input must not stall the run.
        let stdin = child.stdin.take();
        let feed_input = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(chunk.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };
        let (_, output) = tokio::time::timeout(
            self.settings.timeout,
            try_join(feed_input, child.wait_with_output()),
        )
        .await
        .map_err(|_| TranslateError::Timeout)?
        .map_err(|err| TranslateError::Command {
            program: program.clone(),
            message: err.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let mut message = stderr.trim().to_string();
            if message.len() > MAX_STDERR_LEN {
                let mut end = MAX_STDERR_LEN;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            return Err(TranslateError::Command {
                program: program.clone(),
                message: format!("{}: {message}", output.status),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait::async_trait]
impl Translator for OfflineTranslator {
    fn name(&self) -> &str {
        "offline"
    }

    /// Paragraphs are translated one at a time to keep model inputs short.
    async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslateError> {
        let mut parts = Vec::new();
        for paragraph in split_paragraphs(text) {
            feed_trace!("Offline translating paragraph of {} bytes", paragraph.len());
            parts.push(self.translate_chunk(paragraph, target_lang).await?);
        }
        let joined = parts.join("\n\n");
        if joined.trim().is_empty() {
            return Err(TranslateError::EmptyOutput);
        }
        Ok(joined)
    }
}

fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.split("\n\n").map(str::trim).filter(|p| !p.is_empty())
}
