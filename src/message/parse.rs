use std::str::FromStr;

use crate::error::MessageParseError;
use crate::source::Source;

use super::nom_parser::ParsedMessage;
use super::tags::parse_tag_block;
use super::Message;

impl Message {
    /// Parse one wire line, returning `None` if it is not a message.
    ///
    /// A trailing `\r\n` (or bare `\n`) is stripped first. Use the
    /// [`FromStr`] impl to learn why a line was rejected.
    pub fn parse(line: &str) -> Option<Message> {
        line.parse().ok()
    }

    /// Parse a line received as raw bytes.
    ///
    /// Bytes that are not valid UTF-8 are decoded as Windows-1252 instead of
    /// being dropped, so legacy Latin-1 clients stay readable.
    pub fn parse_bytes(bytes: &[u8]) -> Option<Message> {
        match std::str::from_utf8(bytes) {
            Ok(line) => Message::parse(line),
            Err(_) => {
                let (line, _) = encoding::WINDOWS_1252.decode_without_bom_handling(bytes);
                Message::parse(&line)
            }
        }
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let parsed = ParsedMessage::parse(trimmed)?;

        Ok(Message {
            tags: parsed.tags.map(parse_tag_block).unwrap_or_default(),
            source: parsed.source.and_then(Source::parse),
            command: parsed.command.to_owned(),
            params: parsed.params.into_iter().map(str::to_owned).collect(),
            raw: Some(s.to_owned()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tag;

    #[test]
    fn test_parse_full_line() {
        let msg = Message::parse("@id=1;flag :nick!user@host PRIVMSG #chan :hello world\r\n").unwrap();
        assert_eq!(
            msg.tags,
            vec![Tag("id".into(), Some("1".into())), Tag("flag".into(), None)]
        );
        assert_eq!(msg.source_nick(), Some("nick"));
        assert_eq!(msg.command, "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hello world"]);
        assert_eq!(msg.tag("flag"), Some(None));
        assert_eq!(msg.tag("id"), Some(Some("1")));
        assert_eq!(msg.tag("missing"), None);
    }

    #[test]
    fn test_keeps_raw_line() {
        let line = ":server 001 me :Welcome\r\n";
        let msg = Message::parse(line).unwrap();
        assert_eq!(msg.raw(), Some(line));
        assert_eq!(msg.numeric(), Some(1));
    }

    #[test]
    fn test_empty_lines_are_not_messages() {
        assert!(Message::parse("").is_none());
        assert!(Message::parse("\r\n").is_none());
        assert_eq!("\n".parse::<Message>(), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn test_malformed_command() {
        assert_eq!(
            ":server 12 me".parse::<Message>(),
            Err(MessageParseError::InvalidCommand)
        );
        assert!(Message::parse(":server.example").is_none());
    }

    #[test]
    fn test_equality_ignores_raw() {
        let a = Message::parse("PING :abc\r\n").unwrap();
        let b = Message::parse("PING abc").unwrap();
        assert_eq!(a, b);
        assert_ne!(a.raw(), b.raw());
    }

    #[test]
    fn test_parse_bytes_latin1_fallback() {
        let bytes = b":nick PRIVMSG #chan :caf\xe9\r\n";
        let msg = Message::parse_bytes(bytes).unwrap();
        assert_eq!(msg.trailing(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_parse_bytes_utf8() {
        let msg = Message::parse_bytes("PRIVMSG #chan :caf\u{e9}".as_bytes()).unwrap();
        assert_eq!(msg.trailing(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_lowercase_command_kept_as_received() {
        let msg = Message::parse("privmsg #chan :hi").unwrap();
        assert_eq!(msg.command, "privmsg");
        assert!(msg.is("PRIVMSG"));
    }
}
