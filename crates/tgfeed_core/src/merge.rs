use std::collections::{HashMap, HashSet};

use crate::document::FeedDocument;
use crate::post::{content_hash, Post, PostId, TranslationOutcome, TranslationStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CachedTranslation {
    source_hash: String,
    outcome: TranslationOutcome,
}

/// Translator verdicts from a previous run, keyed by post id and guarded by
/// the hash of the source text they were produced from.
///
/// Holds successful translations and posts the translator returned unchanged;
/// both are reused without calling the translator again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationCache {
    entries: HashMap<PostId, CachedTranslation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup<'a> {
    /// Same id, same source text: the outcome can be reused.
    Hit(&'a TranslationOutcome),
    /// Same id, but the post was edited since it was translated.
    Stale,
    Miss,
}

impl TranslationCache {
    pub fn from_posts<'a>(posts: impl IntoIterator<Item = &'a Post>) -> Self {
        let entries = posts
            .into_iter()
            .filter(|post| !post.raw_text.is_empty())
            .filter_map(|post| {
                let outcome = match (post.translation_status, &post.translated_text) {
                    (TranslationStatus::Success, Some(text)) if !text.trim().is_empty() => {
                        TranslationOutcome::Translated(text.clone())
                    }
                    (TranslationStatus::Skipped, _) if post.already_in_target => {
                        TranslationOutcome::Unchanged
                    }
                    _ => return None,
                };
                Some((
                    post.id,
                    CachedTranslation {
                        source_hash: content_hash(&post.raw_text),
                        outcome,
                    },
                ))
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, post: &Post) -> CacheLookup<'_> {
        match self.entries.get(&post.id) {
            Some(entry) if entry.source_hash == post.content_hash() => {
                CacheLookup::Hit(&entry.outcome)
            }
            Some(_) => CacheLookup::Stale,
            None => CacheLookup::Miss,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Prior translations carried over.
    pub reused: usize,
    /// Posts the translator already returned unchanged, not sent again.
    pub unchanged: usize,
    pub stale: usize,
    pub duplicates_dropped: usize,
    pub truncated: usize,
}

/// Combines this run's posts with the previously written feed.
///
/// The output always mirrors the current page: posts that only exist in the
/// prior document are never carried over, only their translations are.
#[derive(Debug, Clone)]
pub struct FeedMerger {
    cache: TranslationCache,
    limit: usize,
    stats: MergeStats,
}

impl FeedMerger {
    pub fn new(prior: Option<&FeedDocument>, limit: usize) -> Self {
        let cache = prior
            .map(|doc| TranslationCache::from_posts(&doc.posts))
            .unwrap_or_default();
        Self {
            cache,
            limit,
            stats: MergeStats::default(),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Returns the prior outcome for `post` when its source is unchanged.
    pub fn reusable_translation(&mut self, post: &Post) -> Option<TranslationOutcome> {
        match self.cache.lookup(post) {
            CacheLookup::Hit(outcome) => {
                match outcome {
                    TranslationOutcome::Unchanged => self.stats.unchanged += 1,
                    _ => self.stats.reused += 1,
                }
                Some(outcome.clone())
            }
            CacheLookup::Stale => {
                self.stats.stale += 1;
                None
            }
            CacheLookup::Miss => None,
        }
    }

    /// Drops repeated ids (first occurrence wins) and enforces the limit,
    /// keeping the input order.
    pub fn finish(mut self, posts: Vec<Post>) -> (Vec<Post>, MergeStats) {
        let mut seen = HashSet::new();
        let mut merged = Vec::with_capacity(posts.len().min(self.limit));
        for post in posts {
            if !seen.insert(post.id) {
                self.stats.duplicates_dropped += 1;
                continue;
            }
            if merged.len() >= self.limit {
                self.stats.truncated += 1;
                continue;
            }
            merged.push(post);
        }
        (merged, self.stats)
    }
}
