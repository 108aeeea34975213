use std::collections::HashSet;

use chrono::{DateTime, Utc};
use feed_logging::{feed_debug, feed_warn};
use scraper::{ElementRef, Html, Selector};
use tgfeed_core::{ChannelName, PostId};
use url::Url;

use crate::decode::DecodeError;
use crate::images::ImageExtractor;
use crate::normalize::TextNormalizer;
use crate::RawPost;

const MESSAGE: &str = ".tgme_widget_message";
const MESSAGE_TEXT: &str = ".tgme_widget_message_text";
const REPLY_CLASS: &str = "tgme_widget_message_reply";
const DATE_LINK: &str = "a.tgme_widget_message_date";
const TIME: &str = "time[datetime]";
const BACKGROUND_IMAGES: &str = ".tgme_widget_message_photo_wrap, .tgme_widget_message_video_thumb, .link_preview_image, .link_preview_right_image";
const BUBBLE_IMAGES: &str = ".tgme_widget_message_bubble img[src]";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no posts found on the preview page; the page layout may have changed")]
    NoPosts,
    #[error("preview page could not be decoded: {0}")]
    Undecodable(#[from] DecodeError),
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid base url {0:?}")]
    InvalidBaseUrl(String),
}

/// Posts extracted from one preview page, newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseReport {
    pub posts: Vec<RawPost>,
    /// Message elements dropped because they were malformed.
    pub skipped: usize,
    /// Valid posts beyond the limit.
    pub truncated: usize,
}

struct Selectors {
    message: Selector,
    text: Selector,
    date_link: Selector,
    time: Selector,
    background_images: Selector,
    bubble_images: Selector,
}

impl Selectors {
    fn compile() -> Result<Self, ParseError> {
        Ok(Self {
            message: selector(MESSAGE)?,
            text: selector(MESSAGE_TEXT)?,
            date_link: selector(DATE_LINK)?,
            time: selector(TIME)?,
            background_images: selector(BACKGROUND_IMAGES)?,
            bubble_images: selector(BUBBLE_IMAGES)?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|err| ParseError::Selector {
        selector: css.to_string(),
        message: err.to_string(),
    })
}

/// Best-effort scraper for `https://t.me/s/<channel>` pages.
///
/// Telegram renders messages oldest first; the parser walks them in reverse
/// so page order, not timestamps, decides the output order.
pub struct PostParser {
    channel: ChannelName,
    base_url: Url,
    limit: usize,
    selectors: Selectors,
    normalizer: TextNormalizer,
    images: ImageExtractor,
}

impl PostParser {
    pub fn new(channel: ChannelName, base_url: &str, limit: usize) -> Result<Self, ParseError> {
        let base_url =
            Url::parse(base_url).map_err(|_| ParseError::InvalidBaseUrl(base_url.to_string()))?;
        Ok(Self {
            images: ImageExtractor::new(base_url.as_str()),
            channel,
            base_url,
            limit,
            selectors: Selectors::compile()?,
            normalizer: TextNormalizer,
        })
    }

    pub fn parse(&self, html: &str) -> Result<ParseReport, ParseError> {
        let document = Html::parse_document(html);
        let messages: Vec<ElementRef> = document.select(&self.selectors.message).collect();

        let mut seen = HashSet::new();
        let mut posts = Vec::new();
        let mut skipped = 0;
        for (index, message) in messages.iter().enumerate().rev() {
            match self.parse_message(*message) {
                Ok(Some(raw)) => {
                    if seen.insert(raw.id) {
                        posts.push(raw);
                    } else {
                        feed_debug!("Ignoring repeated message {}", raw.id);
                    }
                }
                Ok(None) => {}
                Err(reason) => {
                    skipped += 1;
                    feed_warn!("Skipping message element #{}: {}", index, reason);
                }
            }
        }

        if posts.is_empty() {
            return Err(ParseError::NoPosts);
        }

        let truncated = posts.len().saturating_sub(self.limit);
        posts.truncate(self.limit);
        Ok(ParseReport {
            posts,
            skipped,
            truncated,
        })
    }

    /// `Ok(None)` for messages with nothing to show (stickers, service messages).
    /// Emptiness is judged after cleanup so that every post counted against
    /// the limit still has text or a usable image.
    fn parse_message(&self, message: ElementRef) -> Result<Option<RawPost>, &'static str> {
        let id = self.extract_id(message).ok_or("no message id")?;

        let body_html = message
            .select(&self.selectors.text)
            .find(|el| !is_inside_reply(*el, message))
            .map(|el| el.inner_html())
            .unwrap_or_default();
        let image_refs = self.extract_image_refs(message);

        let has_text = !self.normalizer.normalize(&body_html).is_empty();
        if !has_text && self.images.extract(&image_refs).is_empty() {
            feed_debug!("Message {} has no text or usable images; skipping", id);
            return Ok(None);
        }

        Ok(Some(RawPost {
            id,
            timestamp: self.extract_timestamp(message),
            body_html,
            image_refs,
            permalink: self.permalink(id),
        }))
    }

    fn extract_id(&self, message: ElementRef) -> Option<PostId> {
        if let Some(data_post) = message.value().attr("data-post") {
            if let Some((channel, id)) = data_post.trim().rsplit_once('/') {
                if self.channel.matches(channel) {
                    if let Ok(id) = id.parse::<u64>() {
                        return Some(PostId(id));
                    }
                }
            }
        }

        // Fallback: the date link is the message permalink.
        let href = message
            .select(&self.selectors.date_link)
            .next()?
            .value()
            .attr("href")?;
        let url = self.base_url.join(href.trim()).ok()?;
        let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
        let channel = segments.next()?;
        let id = segments.next()?;
        if !self.channel.matches(channel) {
            return None;
        }
        id.parse::<u64>().ok().map(PostId)
    }

    fn extract_timestamp(&self, message: ElementRef) -> Option<DateTime<Utc>> {
        let raw = message
            .select(&self.selectors.date_link)
            .find_map(|link| link.select(&self.selectors.time).next())
            .or_else(|| message.select(&self.selectors.time).next())?
            .value()
            .attr("datetime")?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn extract_image_refs(&self, message: ElementRef) -> Vec<String> {
        let styled = message
            .select(&self.selectors.background_images)
            .filter_map(|el| el.value().attr("style"))
            .filter_map(background_image_url);
        let inline = message
            .select(&self.selectors.bubble_images)
            .filter(|el| !el.value().classes().any(|c| c == "emoji"))
            .filter_map(|el| el.value().attr("src"))
            .map(|src| src.trim().to_string());
        styled.chain(inline).collect()
    }

    fn permalink(&self, id: PostId) -> String {
        let path = format!("{}/{}", self.channel, id);
        self.base_url
            .join(&path)
            .map(String::from)
            .unwrap_or_else(|_| format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), path))
    }
}

fn is_inside_reply(element: ElementRef, message: ElementRef) -> bool {
    element
        .ancestors()
        .take_while(|node| node.id() != message.id())
        .filter_map(ElementRef::wrap)
        .any(|el| el.value().classes().any(|c| c == REPLY_CLASS))
}

/// Pulls the URL out of `background-image:url('...')` in an inline style.
fn background_image_url(style: &str) -> Option<String> {
    let lower = style.to_ascii_lowercase();
    let start = lower.find("background-image")?;
    let open = lower[start..].find("url(")? + start + "url(".len();
    let close = lower[open..].find(')')? + open;
    let raw = style[open..close].trim().trim_matches(['\'', '"']).trim();
    (!raw.is_empty()).then(|| raw.to_string())
}
