//! Connection lifecycle states and registration.
//!
//! Registration is sans-IO: these helpers produce the messages to send and
//! leave the writing to the caller.

use std::fmt;

use crate::Message;

/// Where the client is in its connection lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionState {
    /// No transport is open.
    #[default]
    Disconnected,
    /// The transport is being opened.
    Connecting,
    /// PASS/NICK/USER sent, awaiting welcome (001).
    Registering,
    /// Received 001, fully connected.
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Registering => "registering",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The registration burst: `PASS` (when a password is set), `NICK`, `USER`.
pub fn registration_messages(
    password: Option<&str>,
    nickname: &str,
    username: &str,
    realname: &str,
) -> Vec<Message> {
    let mut messages = Vec::with_capacity(3);
    if let Some(pass) = password {
        messages.push(Message::pass(pass));
    }
    messages.push(Message::nick(nickname));
    messages.push(Message::user(username, realname));
    messages
}

/// The nick to retry with after the `attempts`-th 433 during registration.
///
/// Trailing underscores are stripped from the current candidate, then one
/// underscore per collision so far is appended: `dan` → `dan_` → `dan__`.
pub fn collision_nick(current: &str, attempts: u32) -> String {
    let base = current.trim_end_matches('_');
    let mut nick = String::with_capacity(base.len() + attempts as usize);
    nick.push_str(base);
    nick.extend(std::iter::repeat('_').take(attempts as usize));
    nick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order() {
        let lines: Vec<String> = registration_messages(Some("pw"), "dan", "d", "Dan D")
            .iter()
            .map(Message::to_line)
            .collect();
        assert_eq!(lines, vec!["PASS pw\r\n", "NICK dan\r\n", "USER d 0 * :Dan D\r\n"]);
    }

    #[test]
    fn test_registration_without_password() {
        let messages = registration_messages(None, "dan", "dan", "dan");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is("NICK"));
    }

    #[test]
    fn test_collision_nick_sequence() {
        assert_eq!(collision_nick("dan", 1), "dan_");
        assert_eq!(collision_nick("dan_", 2), "dan__");
        assert_eq!(collision_nick("dan__", 3), "dan___");
        assert_eq!(collision_nick("dan_", 1), "dan_");
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Registering.to_string(), "registering");
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
