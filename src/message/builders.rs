//! Constructors for the commands a client sends.

use super::Message;

impl Message {
    /// `PASS <password>`
    pub fn pass(password: &str) -> Message {
        Message::new("PASS", [password])
    }

    /// `NICK <nickname>`
    pub fn nick(nickname: &str) -> Message {
        Message::new("NICK", [nickname])
    }

    /// `USER <user> 0 * <realname>`
    pub fn user(username: &str, realname: &str) -> Message {
        Message::new("USER", [username, "0", "*", realname])
    }

    /// `JOIN <channel> [<key>]`
    pub fn join(channel: &str, key: Option<&str>) -> Message {
        Message::new("JOIN", std::iter::once(channel).chain(key))
    }

    /// `PART <channel> [<reason>]`
    pub fn part(channel: &str, reason: Option<&str>) -> Message {
        Message::new("PART", std::iter::once(channel).chain(reason))
    }

    pub fn privmsg(target: &str, text: &str) -> Message {
        Message::new("PRIVMSG", [target, text])
    }

    pub fn notice(target: &str, text: &str) -> Message {
        Message::new("NOTICE", [target, text])
    }

    /// `TOPIC <channel> [<topic>]`; an empty topic clears it.
    pub fn topic(channel: &str, topic: Option<&str>) -> Message {
        Message::new("TOPIC", std::iter::once(channel).chain(topic))
    }

    /// `KICK <channel> <nick> [<reason>]`
    pub fn kick(channel: &str, nick: &str, reason: Option<&str>) -> Message {
        Message::new("KICK", [channel, nick].into_iter().chain(reason))
    }

    /// `MODE <target> [<modes> [<args>...]]`
    pub fn mode(target: &str, modes: Option<&str>, args: &[&str]) -> Message {
        let mut params = vec![target];
        if let Some(modes) = modes {
            params.push(modes);
            params.extend_from_slice(args);
        }
        Message::new("MODE", params)
    }

    pub fn who(mask: &str) -> Message {
        Message::new("WHO", [mask])
    }

    pub fn whois(nick: &str) -> Message {
        Message::new("WHOIS", [nick])
    }

    pub fn names(channel: &str) -> Message {
        Message::new("NAMES", [channel])
    }

    /// `ISON <nick> [<nick>...]`, sent as a single space-joined parameter.
    pub fn ison(nicks: &[&str]) -> Message {
        Message::new("ISON", [nicks.join(" ")])
    }

    pub fn pong(token: &str) -> Message {
        Message::new("PONG", [token])
    }

    /// `QUIT [<reason>]`
    pub fn quit(reason: Option<&str>) -> Message {
        Message::new("QUIT", reason)
    }
}
