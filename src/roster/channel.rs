use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::isupport::PrefixSpec;
use crate::mode::ModeChange;

/// A member privilege, as granted by a NAMES prefix or a MODE letter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Privilege {
    Owner,
    Admin,
    Op,
    HalfOp,
    Voice,
}

impl Privilege {
    /// Map a conventional NAMES prefix symbol (`~ & @ % +`).
    pub fn from_prefix(symbol: char) -> Option<Privilege> {
        match symbol {
            '~' => Some(Privilege::Owner),
            '&' => Some(Privilege::Admin),
            '@' => Some(Privilege::Op),
            '%' => Some(Privilege::HalfOp),
            '+' => Some(Privilege::Voice),
            _ => None,
        }
    }

    /// Map a channel MODE letter (`q a o h v`).
    pub fn from_mode(letter: char) -> Option<Privilege> {
        match letter {
            'q' => Some(Privilege::Owner),
            'a' => Some(Privilege::Admin),
            'o' => Some(Privilege::Op),
            'h' => Some(Privilege::HalfOp),
            'v' => Some(Privilege::Voice),
            _ => None,
        }
    }
}

/// Split a NAMES entry like `@+nick` into the nick and its privileges.
///
/// Several leading prefixes are accepted (multi-prefix). When the server
/// advertised `PREFIX`, only its symbols are stripped and each maps through
/// its mode letter; otherwise the conventional `~ & @ % +` are used.
pub fn parse_names_entry(entry: &str, prefix: Option<PrefixSpec<'_>>) -> (String, BTreeSet<Privilege>) {
    let mut privileges = BTreeSet::new();
    let mut nick = entry;
    while let Some(c) = nick.chars().next() {
        let privilege = match prefix {
            Some(spec) if spec.prefixes.contains(c) => spec
                .mode_for_prefix(c)
                .and_then(Privilege::from_mode)
                .or_else(|| Privilege::from_prefix(c)),
            Some(_) => break,
            None => match Privilege::from_prefix(c) {
                Some(p) => Some(p),
                None => break,
            },
        };
        privileges.extend(privilege);
        nick = &nick[c.len_utf8()..];
    }
    (nick.to_owned(), privileges)
}

/// Channel modes tracked on the roster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelMode {
    /// `+m`
    Moderated,
    /// `+i`
    InviteOnly,
    /// `+t`
    TopicProtected,
    /// `+n`
    NoExternal,
    /// `+s`
    Secret,
    /// `+p`
    Private,
    /// `+k <key>`
    Key,
    /// `+l <limit>`
    Limit,
}

impl ChannelMode {
    pub fn from_letter(letter: char) -> Option<ChannelMode> {
        match letter {
            'm' => Some(ChannelMode::Moderated),
            'i' => Some(ChannelMode::InviteOnly),
            't' => Some(ChannelMode::TopicProtected),
            'n' => Some(ChannelMode::NoExternal),
            's' => Some(ChannelMode::Secret),
            'p' => Some(ChannelMode::Private),
            'k' => Some(ChannelMode::Key),
            'l' => Some(ChannelMode::Limit),
            _ => None,
        }
    }
}

/// The value a set channel mode carries.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeValue {
    Flag,
    Limit(u32),
    Key(String),
}

/// A joined channel, as reconstructed from server notifications.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Channel {
    pub name: String,
    pub topic: Option<String>,
    /// Nick of whoever set the topic.
    pub topic_setter: Option<String>,
    pub topic_time: Option<DateTime<Utc>>,
    /// Present members and their privileges.
    pub users: BTreeMap<String, BTreeSet<Privilege>>,
    pub modes: BTreeMap<ChannelMode, ModeValue>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            topic: None,
            topic_setter: None,
            topic_time: None,
            users: BTreeMap::new(),
            modes: BTreeMap::new(),
        }
    }

    /// Update the topic fields; each is only touched when given.
    pub fn set_topic(
        &mut self,
        topic: Option<&str>,
        setter: Option<&str>,
        time: Option<DateTime<Utc>>,
    ) {
        if let Some(topic) = topic {
            self.topic = Some(topic.to_owned());
        }
        if let Some(setter) = setter {
            self.topic_setter = Some(setter.to_owned());
        }
        if let Some(time) = time {
            self.topic_time = Some(time);
        }
    }

    /// Record `nick` as present; existing privileges are kept.
    pub fn add_user(&mut self, nick: &str) {
        self.users.entry(nick.to_owned()).or_default();
    }

    pub fn remove_user(&mut self, nick: &str) -> bool {
        self.users.remove(nick).is_some()
    }

    /// Move `old`'s membership and privileges to `new`.
    pub fn rename_user(&mut self, old: &str, new: &str) -> bool {
        match self.users.remove(old) {
            Some(privileges) => {
                self.users.insert(new.to_owned(), privileges);
                true
            }
            None => false,
        }
    }

    pub fn has_user(&self, nick: &str) -> bool {
        self.users.contains_key(nick)
    }

    pub fn privileges(&self, nick: &str) -> Option<&BTreeSet<Privilege>> {
        self.users.get(nick)
    }

    /// Merge a completed NAMES listing into the member map.
    pub fn merge_names(&mut self, names: &BTreeMap<String, BTreeSet<Privilege>>) {
        for (nick, privileges) in names {
            self.users.insert(nick.clone(), privileges.clone());
        }
    }

    /// Apply one parsed mode letter. Unknown letters and list modes are
    /// ignored, as are privilege changes for nicks not in the channel.
    pub fn apply_mode(&mut self, change: &ModeChange) {
        if let Some(privilege) = Privilege::from_mode(change.letter) {
            let Some(nick) = change.arg.as_deref() else {
                return;
            };
            if let Some(privileges) = self.users.get_mut(nick) {
                if change.adding {
                    privileges.insert(privilege);
                } else {
                    privileges.remove(&privilege);
                }
            }
            return;
        }

        let Some(mode) = ChannelMode::from_letter(change.letter) else {
            return;
        };
        if !change.adding {
            self.modes.remove(&mode);
            return;
        }
        let value = match mode {
            ChannelMode::Key => match &change.arg {
                Some(key) => ModeValue::Key(key.clone()),
                None => return,
            },
            ChannelMode::Limit => {
                ModeValue::Limit(change.arg.as_deref().and_then(|l| l.parse().ok()).unwrap_or(0))
            }
            _ => ModeValue::Flag,
        };
        self.modes.insert(mode, value);
    }
}
