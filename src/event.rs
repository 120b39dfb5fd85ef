//! Typed events and the handler registry.
//!
//! Every inbound message produces a [`Event::Raw`] followed by at most one
//! typed event. Which typed event is decided by a static command table; any
//! other 4xx/5xx numeric becomes [`Event::Error`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use crate::roster::{Privilege, WhoResult, WhoisResult};
use crate::source::Source;
use crate::Message;

/// Something that happened on the connection.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Every parsed inbound message.
    Raw { message: Message },
    /// Registration completed (001).
    Connect { server: Option<String> },
    /// The connection ended, by `quit` or transport failure.
    Disconnect,
    Message {
        source: Option<Source>,
        target: String,
        text: String,
    },
    Notice {
        source: Option<Source>,
        target: String,
        text: String,
    },
    Join {
        channel: String,
        user: Option<Source>,
    },
    Part {
        channel: String,
        user: Option<Source>,
        reason: Option<String>,
    },
    Quit {
        user: Option<Source>,
        reason: Option<String>,
    },
    Kick {
        channel: String,
        /// Who was kicked.
        nick: String,
        by: Option<Source>,
        reason: Option<String>,
    },
    Nick {
        old_nick: Option<String>,
        new_nick: String,
    },
    /// A TOPIC change, or the 332 reply on join (no setter).
    Topic {
        channel: String,
        topic: Option<String>,
        setter: Option<Source>,
    },
    Mode {
        target: String,
        modes: String,
        args: Vec<String>,
    },
    /// One WHO row.
    Who(WhoResult),
    /// End of WHOIS; `result` is `None` for an unknown nick.
    Whois {
        nick: String,
        result: Option<WhoisResult>,
    },
    /// End of NAMES, with the members that listing added.
    Names {
        channel: String,
        users: BTreeMap<String, BTreeSet<Privilege>>,
    },
    Ison { nicks: Vec<String> },
    /// A 4xx/5xx numeric, a server `ERROR`, or a recoverable read failure.
    Error {
        numeric: Option<u16>,
        message: String,
    },
}

/// Discriminant of [`Event`], used to register handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    Raw,
    Connect,
    Disconnect,
    Message,
    Notice,
    Join,
    Part,
    Quit,
    Kick,
    Nick,
    Topic,
    Mode,
    Who,
    Whois,
    Names,
    Ison,
    Error,
}

const EVENT_TABLE: &[(&str, EventKind)] = &[
    ("PRIVMSG", EventKind::Message),
    ("NOTICE", EventKind::Notice),
    ("JOIN", EventKind::Join),
    ("PART", EventKind::Part),
    ("QUIT", EventKind::Quit),
    ("KICK", EventKind::Kick),
    ("NICK", EventKind::Nick),
    ("TOPIC", EventKind::Topic),
    ("MODE", EventKind::Mode),
    ("ERROR", EventKind::Error),
    ("001", EventKind::Connect),
    ("303", EventKind::Ison),
    ("318", EventKind::Whois),
    ("332", EventKind::Topic),
    ("352", EventKind::Who),
    ("366", EventKind::Names),
];

impl EventKind {
    /// The typed event kind a command produces, if any.
    pub fn for_command(command: &str) -> Option<EventKind> {
        EVENT_TABLE
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(command))
            .map(|&(_, kind)| kind)
            .or_else(|| is_error_numeric(command).then_some(EventKind::Error))
    }
}

fn is_error_numeric(command: &str) -> bool {
    let bytes = command.as_bytes();
    bytes.len() == 3 && matches!(bytes[0], b'4' | b'5') && bytes.iter().all(u8::is_ascii_digit)
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Raw { .. } => EventKind::Raw,
            Event::Connect { .. } => EventKind::Connect,
            Event::Disconnect => EventKind::Disconnect,
            Event::Message { .. } => EventKind::Message,
            Event::Notice { .. } => EventKind::Notice,
            Event::Join { .. } => EventKind::Join,
            Event::Part { .. } => EventKind::Part,
            Event::Quit { .. } => EventKind::Quit,
            Event::Kick { .. } => EventKind::Kick,
            Event::Nick { .. } => EventKind::Nick,
            Event::Topic { .. } => EventKind::Topic,
            Event::Mode { .. } => EventKind::Mode,
            Event::Who(_) => EventKind::Who,
            Event::Whois { .. } => EventKind::Whois,
            Event::Names { .. } => EventKind::Names,
            Event::Ison { .. } => EventKind::Ison,
            Event::Error { .. } => EventKind::Error,
        }
    }

    /// Build the typed event for `msg` from the message alone.
    ///
    /// WHOIS and NAMES completions carry accumulated state and are built by
    /// the session instead; for those kinds this returns `None`, as it does
    /// when required parameters are missing.
    pub fn from_message(kind: EventKind, msg: &Message) -> Option<Event> {
        let param = |i: usize| msg.param(i).map(str::to_owned);
        let event = match kind {
            EventKind::Connect => Event::Connect {
                server: msg.source.as_ref().map(|s| s.raw.clone()),
            },
            EventKind::Message => Event::Message {
                source: msg.source.clone(),
                target: param(0)?,
                text: param(1).unwrap_or_default(),
            },
            EventKind::Notice => Event::Notice {
                source: msg.source.clone(),
                target: param(0)?,
                text: param(1).unwrap_or_default(),
            },
            EventKind::Join => Event::Join {
                channel: param(0)?,
                user: msg.source.clone(),
            },
            EventKind::Part => Event::Part {
                channel: param(0)?,
                user: msg.source.clone(),
                reason: param(1),
            },
            EventKind::Quit => Event::Quit {
                user: msg.source.clone(),
                reason: param(0),
            },
            EventKind::Kick => Event::Kick {
                channel: param(0)?,
                nick: param(1)?,
                by: msg.source.clone(),
                reason: param(2),
            },
            EventKind::Nick => Event::Nick {
                old_nick: msg.source_nick().map(str::to_owned),
                new_nick: param(0)?,
            },
            EventKind::Topic if msg.numeric() == Some(332) => Event::Topic {
                channel: param(1)?,
                topic: param(2),
                setter: None,
            },
            EventKind::Topic => Event::Topic {
                channel: param(0)?,
                topic: param(1),
                setter: msg.source.clone(),
            },
            EventKind::Mode => Event::Mode {
                target: param(0)?,
                modes: param(1).unwrap_or_default(),
                args: msg.params_from(2).to_vec(),
            },
            EventKind::Who => Event::Who(WhoResult::from_reply(msg)?),
            EventKind::Ison => Event::Ison {
                nicks: msg
                    .params_from(1)
                    .iter()
                    .flat_map(|p| p.split_whitespace())
                    .map(str::to_owned)
                    .collect(),
            },
            EventKind::Error => Event::Error {
                numeric: msg.numeric(),
                message: msg.trailing().unwrap_or_default().to_owned(),
            },
            EventKind::Raw
            | EventKind::Disconnect
            | EventKind::Whois
            | EventKind::Names => return None,
        };
        Some(event)
    }
}

/// A registered event callback.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Identifies one registration, for [`Handlers::remove`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

/// Handlers per event kind, in registration order.
#[derive(Default)]
pub struct Handlers {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EventKind, handler: Handler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.by_kind.entry(kind).or_default().push((id, handler));
        id
    }

    /// Remove one registration. Returns whether it existed.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        for list in self.by_kind.values_mut() {
            if let Some(pos) = list.iter().position(|(h, _)| *h == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Remove every handler for `kind`, returning how many there were.
    pub fn clear(&mut self, kind: EventKind) -> usize {
        self.by_kind.remove(&kind).map_or(0, |list| list.len())
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Clone out the handlers for `kind` so they can run without the lock.
    pub fn snapshot(&self, kind: EventKind) -> Vec<Handler> {
        self.by_kind
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<_, _> = self.by_kind.iter().map(|(k, v)| (*k, v.len())).collect();
        f.debug_struct("Handlers").field("counts", &counts).finish()
    }
}

/// Run `handlers` in order. A panicking handler is logged and skipped.
pub fn dispatch(handlers: &[Handler], event: &Event) {
    for handler in handlers {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(kind = ?event.kind(), %reason, "event handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn parse(line: &str) -> Message {
        Message::parse(line).unwrap()
    }

    #[test]
    fn test_command_table() {
        assert_eq!(EventKind::for_command("PRIVMSG"), Some(EventKind::Message));
        assert_eq!(EventKind::for_command("privmsg"), Some(EventKind::Message));
        assert_eq!(EventKind::for_command("332"), Some(EventKind::Topic));
        assert_eq!(EventKind::for_command("001"), Some(EventKind::Connect));
        assert_eq!(EventKind::for_command("473"), Some(EventKind::Error));
        assert_eq!(EventKind::for_command("502"), Some(EventKind::Error));
        assert_eq!(EventKind::for_command("353"), None);
        assert_eq!(EventKind::for_command("PING"), None);
    }

    #[test]
    fn test_kick_event() {
        let msg = parse(":op!u@h KICK #chan victim :bye now");
        let event = Event::from_message(EventKind::Kick, &msg).unwrap();
        match event {
            Event::Kick { channel, nick, by, reason } => {
                assert_eq!(channel, "#chan");
                assert_eq!(nick, "victim");
                assert_eq!(by.unwrap().nick.as_deref(), Some("op"));
                assert_eq!(reason.as_deref(), Some("bye now"));
            }
            other => panic!("expected kick, got {:?}", other),
        }
    }

    #[test]
    fn test_topic_reply_has_no_setter() {
        let msg = parse(":server 332 me #chan :The topic");
        assert_eq!(
            Event::from_message(EventKind::Topic, &msg),
            Some(Event::Topic {
                channel: "#chan".into(),
                topic: Some("The topic".into()),
                setter: None,
            })
        );
    }

    #[test]
    fn test_error_event() {
        let msg = parse(":server 473 me #chan :Cannot join channel (+i)");
        assert_eq!(
            Event::from_message(EventKind::Error, &msg),
            Some(Event::Error {
                numeric: Some(473),
                message: "Cannot join channel (+i)".into(),
            })
        );

        let msg = parse("ERROR :Closing Link: host (Quit)");
        assert_eq!(
            Event::from_message(EventKind::Error, &msg),
            Some(Event::Error {
                numeric: None,
                message: "Closing Link: host (Quit)".into(),
            })
        );
    }

    #[test]
    fn test_registry_order_and_removal() {
        let mut handlers = Handlers::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let s1 = Arc::clone(&seen);
        let first = handlers.add(EventKind::Disconnect, Arc::new(move |_| s1.lock().push(1)));
        let s2 = Arc::clone(&seen);
        handlers.add(EventKind::Disconnect, Arc::new(move |_| s2.lock().push(2)));

        dispatch(&handlers.snapshot(EventKind::Disconnect), &Event::Disconnect);
        assert_eq!(*seen.lock(), vec![1, 2]);

        assert!(handlers.remove(first));
        assert!(!handlers.remove(first));
        assert_eq!(handlers.count(EventKind::Disconnect), 1);
        assert_eq!(handlers.clear(EventKind::Disconnect), 1);
        assert_eq!(handlers.count(EventKind::Disconnect), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_others() {
        let mut handlers = Handlers::new();
        let calls = Arc::new(AtomicUsize::new(0));
        handlers.add(EventKind::Disconnect, Arc::new(|_| panic!("boom")));
        let c = Arc::clone(&calls);
        handlers.add(
            EventKind::Disconnect,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        dispatch(&handlers.snapshot(EventKind::Disconnect), &Event::Disconnect);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
