//! Typed IRCv3 message tags and the tag registry.
//!
//! The registry maps a tag name to a decoder producing a [`TypedTag`].
//! Unregistered names and decoder failures both fall back to the raw tag;
//! failures are additionally reported as [`ProtocolDefect::Tag`] so
//! consumers never lose the offending value silently.
//!
//! # Reference
//! - IRCv3 message tags: <https://ircv3.net/specs/extensions/message-tags>
//! - server-time: <https://ircv3.net/specs/extensions/server-time>
//! - typing client tag: <https://ircv3.net/specs/client-tags/typing>

use chrono::{DateTime, Utc};

use crate::error::{ProtocolDefect, TagDecodeError};
use crate::message::Tag;
use crate::registry::FactoryRegistry;

/// Typing-indicator state carried by the `+typing` client tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypingState {
    /// Actively composing a message.
    Active,
    /// Paused while composing.
    Paused,
    /// Abandoned the message.
    Done,
}

impl TypingState {
    /// Parse a typing state, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("active") {
            Some(Self::Active)
        } else if value.eq_ignore_ascii_case("paused") {
            Some(Self::Paused)
        } else if value.eq_ignore_ascii_case("done") {
            Some(Self::Done)
        } else {
            None
        }
    }
}

/// A tag after typed interpretation.
///
/// Equality is on the decoded value, not the raw text: two `time` tags
/// with different offsets denoting the same instant compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedTag {
    /// `time`: when the server processed the message.
    ServerTime(DateTime<Utc>),
    /// `label`: request/response correlation token.
    Label(String),
    /// `msgid`: unique message identifier.
    MsgId(String),
    /// `typing` / `+typing`: typing indicator state.
    Typing(TypingState),
    /// Anything unregistered or undecodable, kept verbatim.
    Raw(Tag),
}

/// Registry of tag decoders with raw-tag fallback.
#[derive(Debug)]
pub struct TagRegistry {
    factories: FactoryRegistry<TypedTag, TagDecodeError>,
}

impl TagRegistry {
    /// Create a registry with no decoders; every tag comes out raw.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: FactoryRegistry::new(),
        }
    }

    /// Create a registry with the built-in IRCv3 decoders.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("time", decode_server_time);
        registry.register("label", decode_label);
        registry.register("msgid", decode_msgid);
        registry.register("typing", decode_typing);
        registry.register("+typing", decode_typing);
        registry
    }

    /// Register a decoder under a tag name, replacing any previous one.
    pub fn register<F>(&self, name: impl Into<String>, decoder: F)
    where
        F: Fn(&str, Option<&str>) -> Result<TypedTag, TagDecodeError> + Send + Sync + 'static,
    {
        self.factories.register(name, decoder);
    }

    /// Remove the decoder for a tag name. Returns whether one was present.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.unregister(name)
    }

    /// Whether a decoder is registered for `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.is_registered(name)
    }

    /// Interpret one raw tag.
    ///
    /// Decoder failures push a defect and degrade to [`TypedTag::Raw`];
    /// this never fails.
    pub fn create(&self, tag: &Tag, defects: &mut Vec<ProtocolDefect>) -> TypedTag {
        match self.factories.create(&tag.name, tag.value.as_deref()) {
            None => TypedTag::Raw(tag.clone()),
            Some(Ok(typed)) => typed,
            Some(Err(cause)) => {
                tracing::debug!(tag = %tag.name, %cause, "tag decode failed, keeping raw");
                defects.push(ProtocolDefect::Tag {
                    name: tag.name.clone(),
                    raw: tag.value.clone(),
                    cause,
                });
                TypedTag::Raw(tag.clone())
            }
        }
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_value<'a>(name: &str, raw: Option<&'a str>) -> Result<&'a str, TagDecodeError> {
    raw.ok_or_else(|| TagDecodeError::MissingValue {
        name: name.to_string(),
    })
}

fn decode_server_time(name: &str, raw: Option<&str>) -> Result<TypedTag, TagDecodeError> {
    let value = require_value(name, raw)?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| TypedTag::ServerTime(dt.with_timezone(&Utc)))
        .map_err(|_| TagDecodeError::InvalidTimestamp {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn decode_label(name: &str, raw: Option<&str>) -> Result<TypedTag, TagDecodeError> {
    require_value(name, raw).map(|v| TypedTag::Label(v.to_string()))
}

fn decode_msgid(name: &str, raw: Option<&str>) -> Result<TypedTag, TagDecodeError> {
    require_value(name, raw).map(|v| TypedTag::MsgId(v.to_string()))
}

fn decode_typing(name: &str, raw: Option<&str>) -> Result<TypedTag, TagDecodeError> {
    let value = require_value(name, raw)?;
    TypingState::parse(value)
        .map(TypedTag::Typing)
        .ok_or_else(|| TagDecodeError::UnknownTypingState {
            value: value.to_string(),
        })
}
