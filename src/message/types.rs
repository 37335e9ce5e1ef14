//! Owned IRC message types.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

use super::nom_parser::ParsedMessage;
use super::tags::{escape_tag_value, parse_tag_section, Tag};

/// A command token: either an alphabetic word or a three-digit numeric.
///
/// Words are normalized to uppercase for dispatch; the byte-exact original
/// line is retained on [`RawMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandToken {
    /// Alphabetic command word, normalized uppercase (e.g. `PRIVMSG`).
    Word(String),
    /// Three-digit numeric reply code (e.g. `005`).
    Numeric(u16),
}

impl CommandToken {
    /// Classify a raw command token.
    ///
    /// Exactly three ASCII digits make a numeric; an alphabetic run makes
    /// a word; anything else is invalid.
    pub fn from_token(token: &str) -> Result<Self, MessageParseError> {
        if token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit()) {
            let code = token
                .parse()
                .map_err(|_| MessageParseError::InvalidCommand(token.to_string()))?;
            return Ok(Self::Numeric(code));
        }
        if !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Ok(Self::Word(token.to_ascii_uppercase()));
        }
        Err(MessageParseError::InvalidCommand(token.to_string()))
    }

    /// The numeric code, if this is a numeric command.
    #[must_use]
    pub fn numeric(&self) -> Option<u16> {
        match self {
            Self::Numeric(n) => Some(*n),
            Self::Word(_) => None,
        }
    }

    /// Whether this is the given command word (case-insensitive).
    #[must_use]
    pub fn is(&self, word: &str) -> bool {
        match self {
            Self::Word(w) => w.eq_ignore_ascii_case(word),
            Self::Numeric(_) => false,
        }
    }
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Word(w) => f.write_str(w),
            Self::Numeric(n) => write!(f, "{:03}", n),
        }
    }
}

/// One parsed IRC line.
///
/// Immutable once constructed; every event derived from a line shares the
/// same `RawMessage`. The last parameter may contain spaces (the trailing
/// parameter); all earlier parameters are single tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMessage {
    raw: String,
    /// Tags in transmission order, values unescaped.
    pub tags: Vec<Tag>,
    /// Source actor string (without the leading `:`), if present.
    pub prefix: Option<String>,
    /// The command token.
    pub command: CommandToken,
    /// Parameters in order, trailing last.
    pub params: Vec<String>,
}

impl RawMessage {
    /// Parse one line of text (line terminators are tolerated and stripped).
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let parsed = ParsedMessage::parse(trimmed)?;
        let command = CommandToken::from_token(parsed.command)?;

        Ok(Self {
            raw: trimmed.to_string(),
            tags: parsed.tags.map(parse_tag_section).unwrap_or_default(),
            prefix: parsed.prefix.map(str::to_string),
            command,
            params: parsed.params.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// The byte-exact line as received, without terminators.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.raw
    }

    /// Parameter at `index`, if present.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Look up a tag by name (case-sensitive, as transmitted).
    #[must_use]
    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.name == name)
    }
}

impl FromStr for RawMessage {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RawMessage {
    /// Re-serialize to wire form.
    ///
    /// The trailing `:` is emitted whenever the last parameter needs it
    /// (spaces, empty, or a leading `:`), so `parse -> to_string -> parse`
    /// is identity on the structured form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_str("@")?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_str(";")?;
                }
                f.write_str(&tag.name)?;
                if let Some(value) = &tag.value {
                    write!(f, "={}", escape_tag_value(value))?;
                }
            }
            f.write_str(" ")?;
        }
        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;
        if let Some((last, middles)) = self.params.split_last() {
            for p in middles {
                write!(f, " {}", p)?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }
        Ok(())
    }
}
