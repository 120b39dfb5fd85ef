//! Nom-based IRC message tokenizer.
//!
//! This module splits a single, already de-terminated wire line into its
//! borrowed components using the nom parser combinator library. Building the
//! owned [`Message`](super::Message) happens in `parse.rs`.

use nom::{
    branch::alt,
    bytes::complete::take_till1,
    character::complete::{alpha1, char, digit1, space0},
    combinator::{opt, verify},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    sequence::preceded,
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

const COMMAND_CONTEXT: &str = "parsing required command";

/// Parse IRCv3 message tags (the part after `@` and before the first space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        preceded(char('@'), take_till1(|c| c == ' ')),
    )(input)
}

/// Parse the message source (the part after `:` and before the first space).
fn parse_source(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message source",
        preceded(char(':'), take_till1(|c| c == ' ')),
    )(input)
}

/// Parse the command: one or more letters, or exactly three digits.
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        COMMAND_CONTEXT,
        alt((alpha1, verify(digit1, |d: &str| d.len() == 3))),
    )(input)
}

/// Split everything after the command into parameters.
///
/// Runs of spaces separate parameters. A parameter starting with `:` is the
/// trailing parameter and swallows the rest of the line.
fn split_params(mut rest: &str) -> Vec<&str> {
    let mut params = Vec::new();
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            break;
        }
        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }
    params
}

/// Parse a complete IRC line into its components.
///
/// IRC message format:
/// ```text
/// [@tags] [:source] <command> [params...] [:trailing]
/// ```
pub fn parse_message(input: &str) -> ParseResult<&str, ParsedMessage<'_>> {
    let (input, tags) = context("parsing optional tags", opt(parse_tags))(input)?;
    let (input, _) = space0(input)?;

    let (input, source) = context("parsing optional source", opt(parse_source))(input)?;
    let (input, _) = space0(input)?;

    let (input, command) = parse_command(input)?;

    // `PRIVMSG2` or `0012` are not commands followed by parameters.
    if !input.is_empty() && !input.starts_with(' ') {
        return Err(nom::Err::Error(VerboseError::add_context(
            input,
            COMMAND_CONTEXT,
            VerboseError::from_error_kind(input, ErrorKind::Space),
        )));
    }

    let params = split_params(input);

    Ok((
        "",
        ParsedMessage {
            tags,
            source,
            command,
            params,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
///
/// This is the intermediate representation produced by the nom parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw source string (without the leading `:`), if present.
    pub source: Option<&'a str>,
    /// The command name or numeric.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedMessage<'a> {
    /// Tokenize a line that has already had its CR/LF terminator removed.
    pub fn parse(input: &'a str) -> Result<Self, MessageParseError> {
        match parse_message(input) {
            Ok((_remaining, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut position = input.len();
                let mut innermost = None;
                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    if let VerboseErrorKind::Context(ctx) = error_kind {
                        innermost.get_or_insert(*ctx);
                    }
                }
                match innermost {
                    Some(COMMAND_CONTEXT) => Err(MessageParseError::InvalidCommand),
                    Some(ctx) => Err(MessageParseError::ParseContext {
                        position,
                        context: ctx.to_string(),
                    }),
                    None => Err(MessageParseError::InvalidCommand),
                }
            }
            Err(nom::Err::Incomplete(_)) => Err(MessageParseError::ParseContext {
                position: input.len(),
                context: "incomplete input".to_string(),
            }),
        }
    }
}
