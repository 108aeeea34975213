//! tgfeed engine: fetching, scraping, translation and feed output.
mod config;
mod decode;
mod fetch;
mod images;
mod normalize;
mod parse;
mod persist;
mod pipeline;
mod translate;
mod types;

pub use config::{
    ConfigError, FeedConfig, TranslatorSettings, API_KEY_ENV, DEFAULT_BASE_URL, DEFAULT_LIMIT,
    DEFAULT_OUTPUT, ENDPOINT_ENV, MODEL_ENV, OFFLINE_COMMAND_ENV,
};
pub use decode::{decode_page, DecodeError, DecodedPage};
pub use fetch::{preview_page_url, FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
pub use images::ImageExtractor;
pub use normalize::TextNormalizer;
pub use parse::{ParseError, ParseReport, PostParser};
pub use persist::{
    ensure_output_dir, load_feed_document, write_feed_document, AtomicFileWriter, PersistError,
};
pub use pipeline::{Clock, FeedPipeline, PipelineError};
pub use translate::{
    build_translator, translate_text, FallbackTranslator, OfflineSettings, OfflineTranslator,
    RemoteSettings, RemoteTranslator, TranslateError, TranslationPlan, Translator,
    TranslatorChoice,
};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, RawPost, RunSummary};
