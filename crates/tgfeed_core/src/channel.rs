use std::fmt;
use std::str::FromStr;

const MIN_CHANNEL_LEN: usize = 5;

/// Public Telegram channel username, without the leading `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ChannelNameError {
    #[error("channel name is empty")]
    Empty,
    #[error("channel name {0:?} is shorter than {MIN_CHANNEL_LEN} characters")]
    TooShort(String),
    #[error("channel name {name:?} contains invalid character {ch:?}")]
    InvalidChar { name: String, ch: char },
}

impl ChannelName {
    /// Accepts `name` or `@name`; the remainder must be `[A-Za-z0-9_]{5,}`.
    pub fn parse(raw: &str) -> Result<Self, ChannelNameError> {
        let name = raw.trim().trim_start_matches('@');
        if name.is_empty() {
            return Err(ChannelNameError::Empty);
        }
        if let Some(ch) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(ChannelNameError::InvalidChar {
                name: name.to_string(),
                ch,
            });
        }
        if name.len() < MIN_CHANNEL_LEN {
            return Err(ChannelNameError::TooShort(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Telegram usernames are case-insensitive.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.trim().trim_start_matches('@'))
    }
}

impl FromStr for ChannelName {
    type Err = ChannelNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChannelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::{ChannelName, ChannelNameError};

    #[test]
    fn strips_at_sign_and_whitespace() {
        let name = ChannelName::parse("  @durov_news ").unwrap();
        assert_eq!(name.as_str(), "durov_news");
    }

    #[test]
    fn rejects_short_and_invalid_names() {
        assert_eq!(
            ChannelName::parse("abc"),
            Err(ChannelNameError::TooShort("abc".to_string()))
        );
        assert_eq!(ChannelName::parse("@"), Err(ChannelNameError::Empty));
        assert!(matches!(
            ChannelName::parse("bad/name"),
            Err(ChannelNameError::InvalidChar { ch: '/', .. })
        ));
    }

    #[test]
    fn matching_ignores_case() {
        let name = ChannelName::parse("ChillHouseTech").unwrap();
        assert!(name.matches("chillhousetech"));
        assert!(name.matches("@CHILLHOUSETECH"));
        assert!(!name.matches("otherchannel"));
    }
}
