use std::collections::HashSet;

use feed_logging::feed_trace;
use url::Url;

/// Resolves raw image references of one post into unique absolute URLs.
#[derive(Debug, Clone)]
pub struct ImageExtractor {
    base_url: Option<Url>,
}

impl ImageExtractor {
    /// `base_url` is the source domain used for relative and protocol-relative references.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: Url::parse(base_url).ok(),
        }
    }

    pub fn extract(&self, refs: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut images = Vec::with_capacity(refs.len());
        for reference in refs {
            match resolve_image_url(reference, self.base_url.as_ref()) {
                Some(url) => {
                    let url = String::from(url);
                    if seen.insert(url.clone()) {
                        images.push(url);
                    }
                }
                None => feed_trace!("Dropping image reference {:?}", reference),
            }
        }
        images
    }
}

fn resolve_image_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim().trim_matches(['\'', '"']).trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#')
        || lower.starts_with("data:")
        || lower.starts_with("javascript:")
        || lower.starts_with("blob:")
    {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(trimmed).ok()?,
        Err(_) => return None,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}
