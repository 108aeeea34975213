mod cli;
mod config_file;
mod logging;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use feed_logging::{feed_error, feed_info, level_for_verbosity};
use tgfeed_engine::{FeedPipeline, RunSummary, TranslatorSettings};

use crate::cli::Cli;
use crate::config_file::FileConfig;
use crate::logging::LogDestination;

/// Fetch, parse or write failed.
const EXIT_RUN_FAILED: u8 = 1;
/// Bad flags, config file or environment.
const EXIT_CONFIG: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    logging::initialize(
        LogDestination::from_log_file(cli.log_file.as_deref()),
        level_for_verbosity(cli.verbose),
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            feed_error!("Failed to start async runtime: {}", err);
            return ExitCode::from(EXIT_RUN_FAILED);
        }
    };
    let _guard = runtime.enter();

    let pipeline = match configure(&cli) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            feed_error!("Invalid configuration: {:#}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    match runtime.block_on(run(&pipeline)) {
        Ok(summary) => {
            feed_info!(
                "Done: {} posts, {} newly translated, {} reused, {} failed, {} stale",
                summary.posts,
                summary.translated,
                summary.reused,
                summary.failed,
                summary.stale
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            feed_error!("{:#}", err);
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

fn configure(cli: &Cli) -> Result<FeedPipeline> {
    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let translation = TranslatorSettings::default().with_env_overrides();
    let config = cli.resolve(file, translation)?;
    feed_info!(
        "Channel {} -> {:?} (limit {}, translator {:?})",
        config.channel,
        config.output,
        config.limit,
        config.translator
    );
    let pipeline = FeedPipeline::from_config(&config)?;
    Ok(pipeline)
}

async fn run(pipeline: &FeedPipeline) -> Result<RunSummary> {
    let summary = pipeline.run().await.with_context(|| {
        format!(
            "feed update for channel {} failed; {:?} was left untouched",
            pipeline.config().channel,
            pipeline.config().output
        )
    })?;
    Ok(summary)
}
