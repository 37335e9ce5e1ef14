//! Error types for the IRC protocol engine.
//!
//! Every failure in this crate is recoverable: a bad line, tag, ISUPPORT
//! token, or CAP payload is reported as a [`ProtocolDefect`] and the
//! offending unit is skipped or downgraded. Nothing here terminates a
//! connection.

use thiserror::Error;

/// Errors encountered when parsing a raw IRC line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Message was empty.
    #[error("empty message")]
    EmptyMessage,

    /// Command token was missing or not `ALPHA+` / three digits.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Parsing error with position and context information.
    #[error("parsing failed at position {position}: {context}")]
    ParseContext {
        /// Byte position where parsing failed.
        position: usize,
        /// Description of what was being parsed.
        context: String,
    },
}

/// Errors produced by typed message-tag decoders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TagDecodeError {
    /// Tag requires a value but none was transmitted.
    #[error("tag {name} requires a value")]
    MissingValue {
        /// The tag name.
        name: String,
    },

    /// `time` tag value was not a valid RFC 3339 instant.
    #[error("invalid timestamp in {name} tag: {value}")]
    InvalidTimestamp {
        /// The tag name.
        name: String,
        /// The raw value as transmitted.
        value: String,
    },

    /// `typing` tag value was not a recognized state.
    #[error("unknown typing state: {value}")]
    UnknownTypingState {
        /// The raw value as transmitted.
        value: String,
    },

    /// Decoder-specific failure from a registered factory.
    #[error("tag {name}: {reason}")]
    Custom {
        /// The tag name.
        name: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Errors produced by ISUPPORT parameter validators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IsupportDecodeError {
    /// Parameter requires a value but none was transmitted.
    #[error("ISUPPORT {name} requires a value")]
    MissingValue {
        /// The parameter name.
        name: String,
    },

    /// Value did not match the parameter's grammar.
    #[error("ISUPPORT {name} has malformed value: {value}")]
    BadShape {
        /// The parameter name.
        name: String,
        /// The raw value as transmitted.
        value: String,
    },

    /// A numeric field was not an integer.
    #[error("ISUPPORT {name} expects an integer, got: {value}")]
    InvalidInteger {
        /// The parameter name.
        name: String,
        /// The offending field text.
        value: String,
    },

    /// PREFIX mode and display runs differ in length.
    #[error("ISUPPORT PREFIX mode/display length mismatch: {value}")]
    PrefixLengthMismatch {
        /// The raw value as transmitted.
        value: String,
    },

    /// Validator-specific failure from a registered factory.
    #[error("ISUPPORT {name}: {reason}")]
    Custom {
        /// The parameter name.
        name: String,
        /// Human-readable cause.
        reason: String,
    },
}

/// Errors in the shape of a CAP line itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CapProtocolError {
    /// CAP line carried no subcommand.
    #[error("missing CAP subcommand")]
    MissingSubcommand,

    /// CAP subcommand requires a capability list but none was present.
    #[error("missing capability list for CAP {sub}")]
    MissingCapList {
        /// The subcommand that lacked its list.
        sub: String,
    },

    /// Subcommand is not one of LS/LIST/ACK/NAK/NEW/DEL.
    #[error("unknown CAP subcommand: {sub}")]
    UnknownSubcommand {
        /// The subcommand as transmitted.
        sub: String,
    },
}

/// A recoverable protocol defect, reported through the engine's action
/// stream instead of being thrown across the processing pipeline.
///
/// Each variant carries the offending raw text so consumers never lose
/// data silently.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProtocolDefect {
    /// A raw line failed to parse; the line was skipped.
    #[error("unparseable line: {line}")]
    Parse {
        /// The raw line as received.
        line: String,
        /// The underlying parse error.
        #[source]
        cause: MessageParseError,
    },

    /// A known tag failed to decode; it degraded to a raw tag.
    #[error("undecodable {name} tag")]
    Tag {
        /// The tag name.
        name: String,
        /// The raw value as transmitted, if any.
        raw: Option<String>,
        /// The underlying decode error.
        #[source]
        cause: TagDecodeError,
    },

    /// A known ISUPPORT token failed to decode; it degraded to a raw
    /// parameter.
    #[error("undecodable ISUPPORT token: {token}")]
    Isupport {
        /// The full token as transmitted (`NAME` or `NAME=VALUE`).
        token: String,
        /// The underlying decode error.
        #[source]
        cause: IsupportDecodeError,
    },

    /// A CAP line was malformed; its effect was dropped.
    #[error("malformed CAP line: {line}")]
    Cap {
        /// The raw line as received.
        line: String,
        /// The underlying protocol error.
        #[source]
        cause: CapProtocolError,
    },
}
