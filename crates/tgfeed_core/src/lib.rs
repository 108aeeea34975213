//! tgfeed core: pure post model, feed wire format and translation cache.
mod channel;
mod document;
mod merge;
mod post;

pub use channel::{ChannelName, ChannelNameError};
pub use document::{FeedDocument, FEED_FORMAT_VERSION};
pub use merge::{CacheLookup, FeedMerger, MergeStats, TranslationCache};
pub use post::{content_hash, Post, PostId, TranslationOutcome, TranslationStatus};
