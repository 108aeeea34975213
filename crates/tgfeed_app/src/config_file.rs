//! Optional RON config file. Every field is optional; command-line flags win.
//!
//! ```ron
//! (
//!     channel: Some("chillhousetech"),
//!     limit: Some(25),
//!     out: Some("site/data/feed.json"),
//!     translator: Some(offline),
//!     offline_args: Some(["--from-lang", "{source}", "--to-lang", "{target}"]),
//! )
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use feed_logging::feed_info;
use serde::Deserialize;
use tgfeed_engine::TranslatorChoice;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub channel: Option<String>,
    pub limit: Option<usize>,
    pub out: Option<PathBuf>,
    pub translator: Option<TranslatorChoice>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub base_url: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub translation_timeout_secs: Option<u64>,
    pub offline_command: Option<String>,
    pub offline_args: Option<Vec<String>>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        feed_info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }
}
