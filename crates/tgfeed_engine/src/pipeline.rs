use std::sync::Arc;

use chrono::{DateTime, Utc};
use feed_logging::{feed_debug, feed_info, feed_warn};
use tgfeed_core::{FeedDocument, FeedMerger, Post, TranslationOutcome, TranslationStatus};

use crate::config::{ConfigError, FeedConfig};
use crate::decode::decode_page;
use crate::fetch::{preview_page_url, Fetcher, ReqwestFetcher};
use crate::images::ImageExtractor;
use crate::normalize::TextNormalizer;
use crate::parse::{ParseError, PostParser};
use crate::persist::{load_feed_document, write_feed_document, PersistError};
use crate::translate::{build_translator, translate_text, Translator};
use crate::{FetchError, RunSummary};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("failed to write feed: {0}")]
    Write(#[from] PersistError),
}

/// Source of `generated_at`; replaced in tests for deterministic documents.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One end-to-end run: fetch, parse, normalize, translate, merge, write.
pub struct FeedPipeline {
    config: FeedConfig,
    fetcher: Box<dyn Fetcher>,
    translator: Option<Box<dyn Translator>>,
    parser: PostParser,
    normalizer: TextNormalizer,
    images: ImageExtractor,
    clock: Clock,
}

impl FeedPipeline {
    pub fn new(
        config: &FeedConfig,
        fetcher: Box<dyn Fetcher>,
        translator: Option<Box<dyn Translator>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let parser = PostParser::new(config.channel.clone(), &config.base_url, config.limit)
            .map_err(|err| ConfigError::InvalidValue {
                name: "base_url".to_string(),
                message: err.to_string(),
            })?;
        Ok(Self {
            config: config.clone(),
            fetcher,
            translator,
            parser,
            normalizer: TextNormalizer,
            images: ImageExtractor::new(&config.base_url),
            clock: Arc::new(Utc::now),
        })
    }

    /// Production wiring: reqwest transport and the translator the plan selects.
    pub fn from_config(config: &FeedConfig) -> Result<Self, ConfigError> {
        let plan = config.translation_plan()?;
        feed_info!("Translation plan: {:?}", plan);
        let translator = build_translator(plan, &config.translation)?;
        let fetcher = Box::new(ReqwestFetcher::new(config.fetch.clone()));
        Self::new(config, fetcher, translator)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Loads the previous feed, builds the new one and replaces the output file.
    /// Any error leaves the previous file untouched.
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let prior = load_feed_document(&self.config.output);
        let (document, mut summary) = self.build_document(prior.as_ref()).await?;
        let written = write_feed_document(&self.config.output, &document)?;
        feed_info!(
            "Wrote {} posts to {:?} ({} translated, {} reused, {} failed, {} skipped)",
            summary.posts,
            written,
            summary.translated,
            summary.reused,
            summary.failed,
            summary.skipped
        );
        summary.output_path = Some(written);
        Ok(summary)
    }

    /// Everything except the final write.
    pub async fn build_document(
        &self,
        prior: Option<&FeedDocument>,
    ) -> Result<(FeedDocument, RunSummary), PipelineError> {
        let url = preview_page_url(&self.config.base_url, &self.config.channel);
        feed_info!("Fetching {}", url);
        let fetched = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|source| PipelineError::Fetch {
                url: url.clone(),
                source,
            })?;

        let page = decode_page(&fetched.bytes, fetched.metadata.content_type.as_deref())
            .map_err(ParseError::from)?;
        feed_debug!("Decoded page as {}", page.encoding_label);
        let report = self.parser.parse(&page.html)?;
        feed_info!(
            "Parsed {} posts ({} malformed, {} beyond limit)",
            report.posts.len(),
            report.skipped,
            report.truncated
        );

        let prior = prior.filter(|doc| {
            let same = self.config.channel.matches(&doc.channel);
            if !same {
                feed_warn!(
                    "Previous feed belongs to channel {:?}; ignoring its translations",
                    doc.channel
                );
            }
            same
        });
        let mut merger = FeedMerger::new(prior, self.config.limit);
        if !merger.cache().is_empty() {
            feed_debug!("{} cached translations available", merger.cache().len());
        }

        let mut summary = RunSummary {
            records_dropped: report.skipped,
            ..RunSummary::default()
        };
        let mut posts = Vec::with_capacity(report.posts.len());
        for raw in report.posts {
            let text = self.normalizer.normalize(&raw.body_html);
            let images = self.images.extract(&raw.image_refs);
            let mut post = Post::new(raw.id, raw.timestamp, text, images, raw.permalink);
            let outcome = self.translate_post(&mut merger, &post).await;
            if let TranslationOutcome::Failed { reason } = &outcome {
                feed_warn!("Translation of post {} failed: {}", post.id, reason);
            }
            post.apply(outcome);
            posts.push(post);
        }

        let (posts, stats) = merger.finish(posts);
        for post in &posts {
            match post.translation_status {
                TranslationStatus::Success => summary.translated += 1,
                TranslationStatus::Failed => summary.failed += 1,
                TranslationStatus::Skipped => summary.skipped += 1,
                TranslationStatus::NotAttempted => {}
            }
        }
        summary.translated = summary.translated.saturating_sub(stats.reused);
        summary.reused = stats.reused + stats.unchanged;
        summary.stale = stats.stale;
        summary.posts = posts.len();

        let document = FeedDocument::new(
            &self.config.channel,
            self.config.source_url(),
            (self.clock)(),
            posts,
        );
        Ok((document, summary))
    }

    async fn translate_post(&self, merger: &mut FeedMerger, post: &Post) -> TranslationOutcome {
        let Some(translator) = self.translator.as_deref() else {
            return TranslationOutcome::Skipped;
        };
        if post.raw_text.is_empty() {
            return TranslationOutcome::Skipped;
        }
        if let Some(cached) = merger.reusable_translation(post) {
            feed_debug!("Reusing previous translation result for post {}", post.id);
            return cached;
        }
        translate_text(translator, &post.raw_text, &self.config.translation.target_lang).await
    }
}
