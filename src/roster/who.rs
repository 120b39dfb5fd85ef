use chrono::{DateTime, Utc};

use crate::Message;

/// One row of a WHO reply (352).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoResult {
    /// Channel the row refers to, `*` when none.
    pub channel: String,
    pub user: String,
    pub host: String,
    pub server: String,
    pub nick: String,
    /// The `G` (gone) flag was set.
    pub away: bool,
    pub realname: String,
}

impl WhoResult {
    /// Build from `352 <me> <channel> <user> <host> <server> <nick> <flags> :<hops> <realname>`.
    pub fn from_reply(msg: &Message) -> Option<WhoResult> {
        let param = |i: usize| msg.param(i).map(str::to_owned);
        let flags = msg.param(6).unwrap_or("");
        let realname = msg
            .param(7)
            .unwrap_or("")
            .trim_start_matches(|c: char| c.is_ascii_digit())
            .trim_start();

        Some(WhoResult {
            channel: param(1)?,
            user: param(2)?,
            host: param(3)?,
            server: param(4)?,
            nick: param(5)?,
            away: flags.contains('G'),
            realname: realname.to_owned(),
        })
    }
}

/// Everything a WHOIS reply sequence told us about one nick.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoisResult {
    pub nick: String,
    pub user: Option<String>,
    pub host: Option<String>,
    pub realname: Option<String>,
    pub server: Option<String>,
    /// Seconds idle.
    pub idle: Option<u64>,
    pub signon: Option<DateTime<Utc>>,
    pub account: Option<String>,
    /// Away message.
    pub away: Option<String>,
    /// Channel names with privilege prefixes stripped.
    pub channels: Vec<String>,
}

impl WhoisResult {
    pub fn new(nick: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            ..Self::default()
        }
    }

    /// Fold one WHOIS fragment (311, 312, 317, 319, 330, 301) into the
    /// result. Other messages are ignored.
    pub fn apply_reply(&mut self, msg: &Message) {
        let param = |i: usize| msg.param(i).map(str::to_owned);
        match msg.numeric() {
            Some(311) => {
                self.user = param(2);
                self.host = param(3);
                self.realname = param(5);
            }
            Some(312) => self.server = param(2),
            Some(317) => {
                self.idle = msg.param(2).and_then(|s| s.parse().ok());
                self.signon = msg
                    .param(3)
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
            }
            Some(319) => {
                if let Some(list) = msg.param(2) {
                    self.channels.extend(
                        list.split_whitespace()
                            .map(|c| c.trim_start_matches(['@', '+', '%', '~', '&']))
                            .filter(|c| !c.is_empty())
                            .map(str::to_owned),
                    );
                }
            }
            Some(330) => self.account = param(2),
            Some(301) => self.away = param(2),
            _ => {}
        }
    }
}
