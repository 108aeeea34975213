use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tgfeed_core::ChannelName;
use tgfeed_engine::{ConfigError, FeedConfig, TranslatorChoice, TranslatorSettings};

use crate::config_file::FileConfig;

/// Shorter page timeouts are raised to this.
const MIN_FETCH_TIMEOUT_SECS: u64 = 5;

/// Build a static JSON feed from a public Telegram channel's preview page.
#[derive(Parser, Debug, Default)]
#[command(name = "tgfeed", author, version, about, long_about = None)]
pub struct Cli {
    /// Telegram channel username, with or without a leading @.
    #[arg(long)]
    pub channel: Option<String>,

    /// How many of the newest posts to keep [default: 25].
    #[arg(long)]
    pub limit: Option<usize>,

    /// Output JSON path [default: feed.json].
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Translation backend: auto, remote, offline or none [default: auto].
    #[arg(long)]
    pub translator: Option<TranslatorChoice>,

    /// HTTP timeout in seconds for the page fetch [default: 20].
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// User-Agent header for the page fetch.
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Base URL of the Telegram web front end [default: https://t.me].
    #[arg(long)]
    pub base_url: Option<String>,

    /// Language code of the channel's posts [default: ru].
    #[arg(long)]
    pub source_lang: Option<String>,

    /// Language code to translate into [default: en].
    #[arg(long)]
    pub target_lang: Option<String>,

    /// RON config file; flags given on the command line take precedence.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Merges flags over the file config over built-in defaults.
    ///
    /// `translation` carries the environment-derived settings (credential,
    /// model, endpoint, offline program); file values override only what the
    /// environment left at its default.
    pub fn resolve(
        &self,
        file: FileConfig,
        translation: TranslatorSettings,
    ) -> Result<FeedConfig, ConfigError> {
        let raw_channel =
            self.channel
                .clone()
                .or(file.channel)
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "channel".to_string(),
                    message: "required (--channel or `channel` in the config file)".to_string(),
                })?;
        let mut config = FeedConfig::new(ChannelName::parse(&raw_channel)?);
        config.translation = translation;

        if let Some(limit) = self.limit.or(file.limit) {
            config.limit = limit;
        }
        if let Some(out) = self.out.clone().or(file.out) {
            config.output = out;
        }
        if let Some(choice) = self.translator.or(file.translator) {
            config.translator = choice;
        }
        if let Some(secs) = self.timeout.or(file.timeout_secs) {
            config.fetch.request_timeout = Duration::from_secs(secs.max(MIN_FETCH_TIMEOUT_SECS));
        }
        if let Some(user_agent) = self.user_agent.clone().or(file.user_agent) {
            config.fetch.user_agent = user_agent;
        }
        if let Some(base_url) = self.base_url.clone().or(file.base_url) {
            config.base_url = base_url;
        }
        if let Some(lang) = self.source_lang.clone().or(file.source_lang) {
            config.translation.source_lang = lang;
        }
        if let Some(lang) = self.target_lang.clone().or(file.target_lang) {
            config.translation.target_lang = lang;
        }

        let defaults = TranslatorSettings::default();
        let translation = &mut config.translation;
        if let Some(model) = file.model.filter(|_| translation.remote.model == defaults.remote.model) {
            translation.remote.model = model;
        }
        if let Some(endpoint) = file
            .endpoint
            .filter(|_| translation.remote.endpoint == defaults.remote.endpoint)
        {
            translation.remote.endpoint = endpoint;
        }
        if let Some(secs) = file.translation_timeout_secs {
            translation.remote.timeout = Duration::from_secs(secs);
            translation.offline.timeout = Duration::from_secs(secs);
        }
        if let Some(program) = file
            .offline_command
            .filter(|_| translation.offline.program == defaults.offline.program)
        {
            translation.offline.program = program;
        }
        if let Some(args) = file.offline_args {
            translation.offline.args = args;
        }

        config.validate()?;
        Ok(config)
    }
}
