//! IRC message source (prefix) decomposition.

use std::fmt;
use std::str::FromStr;

use crate::error::MessageParseError;

/// The decomposed source of a message: who (or which server) sent it.
///
/// Any subset of the components may be absent depending on the format the
/// server used. The raw prefix text is always kept.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Source {
    /// Nickname, when the source is a user.
    pub nick: Option<String>,
    /// Username (ident).
    pub user: Option<String>,
    /// Host name, or the server name for a bare server source.
    pub host: Option<String>,
    /// The prefix exactly as received, without the leading `:`.
    pub raw: String,
}

impl Source {
    /// Decompose a prefix string.
    ///
    /// - `nick!user@host` yields all three parts
    /// - `nick!user` yields nick and user
    /// - `nick@host` yields nick and host
    /// - a bare token containing `.` is a server host
    /// - any other bare token is a nick
    ///
    /// Returns `None` for an empty string.
    pub fn parse(s: &str) -> Option<Source> {
        if s.is_empty() {
            return None;
        }

        let (nick, user, host) = if let Some((nick, rest)) = s.split_once('!') {
            match rest.split_once('@') {
                Some((user, host)) => (Some(nick), Some(user), Some(host)),
                None => (Some(nick), Some(rest), None),
            }
        } else if let Some((nick, host)) = s.split_once('@') {
            (Some(nick), None, Some(host))
        } else if s.contains('.') {
            (None, None, Some(s))
        } else {
            (Some(s), None, None)
        };

        Some(Source {
            nick: nick.map(str::to_owned),
            user: user.map(str::to_owned),
            host: host.map(str::to_owned),
            raw: s.to_owned(),
        })
    }
}

impl FromStr for Source {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::parse(s).ok_or(MessageParseError::EmptyMessage)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
