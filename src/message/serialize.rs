use std::fmt::{Display, Formatter, Result as FmtResult};

use super::Message;

/// Whether the final parameter must be sent in `:trailing` form.
fn needs_colon_prefix(param: &str) -> bool {
    param.is_empty() || param.contains(' ') || param.starts_with(':')
}

impl Message {
    /// Serialize to a wire line, `\r\n` included.
    ///
    /// Tags and source are never emitted; clients do not send them.
    pub fn to_line(&self) -> String {
        self.to_string()
    }

    /// Whether the serialized form is exactly one line.
    ///
    /// A CR, LF or NUL in the command or any parameter would end the line
    /// early and let the rest be read as another command.
    pub fn is_single_line(&self) -> bool {
        std::iter::once(&self.command)
            .chain(&self.params)
            .all(|part| !part.contains(['\r', '\n', '\0']))
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                f.write_str(" ")?;
                f.write_str(param)?;
            }
            f.write_str(" ")?;
            if needs_colon_prefix(last) {
                f.write_str(":")?;
            }
            f.write_str(last)?;
        }

        f.write_str("\r\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_params() {
        assert_eq!(Message::new("QUIT", Vec::<String>::new()).to_line(), "QUIT\r\n");
    }

    #[test]
    fn test_trailing_only_when_needed() {
        assert_eq!(
            Message::new("PRIVMSG", ["#test", "Hello"]).to_line(),
            "PRIVMSG #test Hello\r\n"
        );
        assert_eq!(
            Message::new("PRIVMSG", ["#test", "Hello world"]).to_line(),
            "PRIVMSG #test :Hello world\r\n"
        );
        assert_eq!(
            Message::new("PRIVMSG", ["#test", ":)"]).to_line(),
            "PRIVMSG #test ::)\r\n"
        );
        assert_eq!(
            Message::new("TOPIC", ["#test", ""]).to_line(),
            "TOPIC #test :\r\n"
        );
    }

    #[test]
    fn test_tags_and_source_not_emitted() {
        let msg = Message::parse("@id=1 :nick!u@h PRIVMSG #c :hi there").unwrap();
        assert_eq!(msg.to_string(), "PRIVMSG #c :hi there\r\n");
    }

    #[test]
    fn test_line_breaks_in_params() {
        assert!(Message::topic("#test", Some("fine topic")).is_single_line());
        assert!(!Message::topic("#test", Some("hi\r\nQUIT :gone")).is_single_line());
        assert!(!Message::kick("#test", "bob", Some("bye\n")).is_single_line());
        assert!(!Message::privmsg("#test\rQUIT", "hello").is_single_line());
        assert!(!Message::quit(Some("nul\0byte")).is_single_line());
    }

    #[test]
    fn test_reparse_is_stable() {
        let msg = Message::new("USER", ["guest", "0", "*", "Real Name"]);
        let line = msg.to_line();
        assert_eq!(line, "USER guest 0 * :Real Name\r\n");
        assert_eq!(Message::parse(&line).unwrap(), msg);
    }
}
