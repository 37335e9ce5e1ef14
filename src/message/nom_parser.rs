//! Nom-based IRC line parser.
//!
//! This module provides zero-copy splitting of an IRC line into its tag
//! section, prefix, command token, and parameter list using the nom parser
//! combinator library. Interpretation of the pieces (tag unescaping,
//! command classification) happens in [`super::types`].

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::{context, VerboseError},
    sequence::preceded,
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Parse the raw tag section (the part after `@` and before the first space).
///
/// Spaces inside tag values are escaped as `\s` on the wire, so the first
/// literal space always terminates the section.
fn tag_section(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        preceded(char('@'), take_until(" ")),
    )(input)
}

/// Parse the prefix (the part after `:` and before the first space).
fn prefix_section(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        preceded(char(':'), take_while1(|c| c != ' ')),
    )(input)
}

/// Parse the command token as a run of alphanumerics.
///
/// Shape validation (`ALPHA+` or exactly three digits) is applied by the
/// caller; this only carves out the token.
fn command_token(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing required command",
        take_while1(|c: char| c.is_alphanumeric()),
    )(input)
}

/// Split a complete IRC line into its components.
///
/// ```text
/// [@tags] [:prefix] <command> [params...] [:trailing]
/// ```
fn split_line(input: &str) -> ParseResult<&str, ParsedMessage<'_>> {
    let (input, tags) = context("parsing optional tags", opt(tag_section))(input)?;
    let (input, _) = space0(input)?;

    let (input, prefix) = context("parsing optional prefix", opt(prefix_section))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = command_token(input)?;

    // Parameter list: single-space separated tokens until a token leads
    // with ':', which opens the trailing parameter and consumes the rest
    // of the line with spaces intact.
    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;

    while let Some(b' ') = rest.as_bytes().first().copied() {
        rest = &rest[1..];

        if let Some(b':') = rest.as_bytes().first().copied() {
            params.push(&rest[1..]);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        let param = &rest[..end];
        if param.is_empty() {
            break;
        }
        params.push(param);
        rest = &rest[end..];
    }

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A split IRC line with borrowed string slices.
///
/// Holds references into the original input; no unescaping or command
/// classification has been performed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage<'a> {
    /// Raw tag section (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command token as transmitted.
    pub command: &'a str,
    /// Parameters, trailing last with its `:` stripped.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Split an IRC line, reporting position and context on failure.
    ///
    /// The input must already have its line terminators stripped.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        if input.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }
        match split_line(input) {
            Ok((_rest, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut position = input.len();
                let mut what = "parsing message";
                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let &nom::error::VerboseErrorKind::Context(ctx) = error_kind {
                        what = ctx;
                    }
                }
                Err(MessageParseError::ParseContext {
                    position,
                    context: what.to_string(),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::ParseContext {
                position: input.len(),
                context: "incomplete input".to_string(),
            }),
        }
    }
}
