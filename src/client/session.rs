//! Sans-IO protocol state for one connection.
//!
//! [`Session`] performs no I/O. The client feeds it every parsed message and
//! carries out the [`Action`]s it returns (lines to send, events to emit)
//! after releasing the state lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use chrono::DateTime;
use tracing::debug;

use super::config::ClientConfig;
use super::pending::{Correlations, Rejection};
use crate::event::{Event, EventKind};
use crate::isupport::Isupport;
use crate::mode::parse_channel_modes;
use crate::roster::{parse_names_entry, Channel, Privilege, WhoResult, WhoisResult};
use crate::source::Source;
use crate::state::{collision_nick, registration_messages, ConnectionState};
use crate::Message;

/// Silence after which a connection counts as stale.
pub const STALE_AFTER: Duration = Duration::from_secs(180);

/// Error numerics that answer a JOIN for the channel in `params[1]`.
const JOIN_ERRORS: &[u16] = &[403, 405, 437, 471, 473, 474, 475, 476, 477];
/// Error numerics that answer a PART for the channel in `params[1]`.
const PART_ERRORS: &[u16] = &[403, 442];
/// Error numerics that answer a NICK change for the nick in `params[1]`.
const NICK_ERRORS: &[u16] = &[432, 433, 436, 437];

/// Something the caller must do on the session's behalf.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Action {
    /// Send this message to the server.
    Send(Box<Message>),
    /// Dispatch this event to handlers.
    Emit(Event),
}

type Names = BTreeMap<String, BTreeSet<Privilege>>;

#[derive(Debug)]
pub(crate) struct Session {
    password: Option<String>,
    wanted_nick: String,
    user: String,
    realname: String,

    state: ConnectionState,
    nick: String,
    server: Option<String>,
    isupport: Isupport,
    last_received: Option<Instant>,
    /// Joined channels by case-folded name.
    channels: BTreeMap<String, Channel>,
    /// NAMES lines collected until 366, by case-folded channel.
    pending_names: HashMap<String, Names>,
    /// WHOIS replies collected until 318, by case-folded nick.
    whois_fragments: HashMap<String, WhoisResult>,
    nick_attempts: u32,
    correlations: Correlations,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            password: config.password.clone(),
            wanted_nick: config.nick.clone(),
            user: config.user.clone(),
            realname: config.realname.clone(),
            state: ConnectionState::Disconnected,
            nick: config.nick.clone(),
            server: None,
            isupport: Isupport::new(),
            last_received: None,
            channels: BTreeMap::new(),
            pending_names: HashMap::new(),
            whois_fragments: HashMap::new(),
            nick_attempts: 0,
            correlations: Correlations::default(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn isupport(&self) -> &Isupport {
        &self.isupport
    }

    pub fn last_received(&self) -> Option<Instant> {
        self.last_received
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        self.last_received
            .is_some_and(|at| now.saturating_duration_since(at) > STALE_AFTER)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channel(&self, name: &str) -> Option<&Channel> {
        self.channels.get(&self.fold(name))
    }

    pub fn correlations(&mut self) -> &mut Correlations {
        &mut self.correlations
    }

    /// Drop what is left of a request the caller stopped waiting on.
    pub fn abandon(&mut self, key: &str) {
        self.correlations.forget_ison(key);
        if !self.correlations.whois().is_pending(key) {
            self.whois_fragments.remove(key);
        }
    }

    /// Case-fold under the server's advertised mapping.
    pub fn fold(&self, s: &str) -> String {
        self.isupport.casemapping().to_lower(s)
    }

    fn is_me(&self, nick: &str) -> bool {
        self.isupport.casemapping().eq(nick, &self.nick)
    }

    pub fn begin_connect(&mut self) {
        debug!(from = %self.state, "connecting");
        self.state = ConnectionState::Connecting;
    }

    /// Enter registration and return the PASS/NICK/USER burst.
    pub fn start_registration(&mut self) -> Vec<Message> {
        self.state = ConnectionState::Registering;
        self.nick_attempts = 0;
        self.nick = self.wanted_nick.clone();
        debug!(nick = %self.nick, "registering");
        registration_messages(self.password.as_deref(), &self.nick, &self.user, &self.realname)
    }

    /// Forget the connection: back to `Disconnected`, no channels.
    pub fn reset(&mut self) {
        debug!(from = %self.state, "disconnected");
        self.state = ConnectionState::Disconnected;
        self.channels.clear();
        self.pending_names.clear();
        self.whois_fragments.clear();
    }

    /// Process one inbound message.
    ///
    /// Protocol handling runs first; then a `Raw` event and at most one
    /// typed event are emitted.
    pub fn handle(&mut self, msg: &Message, now: Instant) -> Vec<Action> {
        self.last_received = Some(now);

        let mut actions = Vec::new();
        let stateful = self.apply(msg, &mut actions);

        actions.push(Action::Emit(Event::Raw {
            message: msg.clone(),
        }));
        let typed = stateful.or_else(|| {
            EventKind::for_command(&msg.command).and_then(|kind| Event::from_message(kind, msg))
        });
        if let Some(event) = typed {
            actions.push(Action::Emit(event));
        }
        actions
    }

    /// Update state for `msg`. Returns the typed event when it depends on
    /// accumulated state.
    fn apply(&mut self, msg: &Message, actions: &mut Vec<Action>) -> Option<Event> {
        let command = msg.command.to_ascii_uppercase();
        match command.as_str() {
            "PING" => {
                let token = msg.param(0).unwrap_or("");
                actions.push(Action::Send(Box::new(Message::pong(token))));
            }
            "001" => self.on_welcome(msg),
            "005" => self.isupport.apply_reply(&msg.params),
            "433" if self.state == ConnectionState::Registering => {
                self.nick_attempts += 1;
                self.nick = collision_nick(&self.nick, self.nick_attempts);
                debug!(nick = %self.nick, attempt = self.nick_attempts, "nick in use, retrying");
                actions.push(Action::Send(Box::new(Message::nick(&self.nick))));
            }
            "JOIN" => {
                self.on_join(msg);
            }
            "PART" => {
                self.on_part(msg);
            }
            "KICK" => {
                self.on_kick(msg);
            }
            "QUIT" => {
                if let Some(nick) = msg.source_nick() {
                    for channel in self.channels.values_mut() {
                        channel.remove_user(nick);
                    }
                }
            }
            "NICK" => {
                self.on_nick(msg);
            }
            "TOPIC" | "332" | "333" => {
                self.on_topic(msg);
            }
            "MODE" => {
                self.on_mode(msg);
            }
            "353" => {
                self.on_names_reply(msg);
            }
            "366" => return self.on_end_of_names(msg),
            "352" => {
                self.on_who_reply(msg);
            }
            "315" => {
                self.on_end_of_who(msg);
            }
            "311" | "312" | "317" | "319" | "330" | "301" => {
                self.on_whois_fragment(msg);
            }
            "318" => return Some(self.on_end_of_whois(msg)),
            "303" => {
                let nicks = msg
                    .params_from(1)
                    .iter()
                    .flat_map(|p| p.split_whitespace())
                    .map(str::to_owned)
                    .collect();
                self.correlations.resolve_oldest_ison(nicks);
            }
            "401" => {
                if let Some(nick) = msg.param(1) {
                    let key = self.fold(nick);
                    self.correlations.whois().resolve_with(&key, None);
                }
            }
            _ => {}
        }

        if let Some(numeric) = msg.numeric().filter(|n| (400..600).contains(n)) {
            self.reject_pending(numeric, msg);
        }
        None
    }

    fn on_welcome(&mut self, msg: &Message) {
        if let Some(nick) = msg.param(0) {
            self.nick = nick.to_owned();
        }
        self.server = msg.source.as_ref().map(|s| s.raw.clone());
        self.state = ConnectionState::Connected;
        debug!(nick = %self.nick, server = ?self.server, "registered");
    }

    fn on_join(&mut self, msg: &Message) -> Option<()> {
        let name = msg.param(0)?;
        let nick = msg.source_nick()?;
        let key = self.fold(name);

        if self.is_me(nick) {
            debug!(channel = name, "joined");
            self.channels.insert(key.clone(), Channel::new(name));
            self.correlations.joins().accumulate(&key, |seen| *seen = true);
        } else if let Some(channel) = self.channels.get_mut(&key) {
            channel.add_user(nick);
        }
        Some(())
    }

    fn on_part(&mut self, msg: &Message) -> Option<()> {
        let name = msg.param(0)?;
        let nick = msg.source_nick()?;
        let key = self.fold(name);

        if self.is_me(nick) {
            debug!(channel = name, "parted");
            self.channels.remove(&key);
            self.pending_names.remove(&key);
            self.correlations.parts().resolve(&key);
        } else if let Some(channel) = self.channels.get_mut(&key) {
            channel.remove_user(nick);
        }
        Some(())
    }

    fn on_kick(&mut self, msg: &Message) -> Option<()> {
        let name = msg.param(0)?;
        let kicked = msg.param(1)?;
        let key = self.fold(name);

        if self.is_me(kicked) {
            debug!(channel = name, by = ?msg.source_nick(), "kicked");
            self.channels.remove(&key);
            self.pending_names.remove(&key);
        } else if let Some(channel) = self.channels.get_mut(&key) {
            channel.remove_user(kicked);
        }
        Some(())
    }

    fn on_nick(&mut self, msg: &Message) -> Option<()> {
        let old = msg.source_nick()?;
        let new = msg.param(0)?;

        if self.is_me(old) {
            debug!(old, new, "own nick changed");
            self.nick = new.to_owned();
            let key = self.fold(new);
            self.correlations.nicks().resolve(&key);
        }
        for channel in self.channels.values_mut() {
            channel.rename_user(old, new);
        }
        Some(())
    }

    fn on_topic(&mut self, msg: &Message) -> Option<()> {
        match msg.numeric() {
            Some(332) => {
                let key = self.fold(msg.param(1)?);
                let channel = self.channels.get_mut(&key)?;
                channel.set_topic(msg.param(2), None, None);
            }
            Some(333) => {
                let key = self.fold(msg.param(1)?);
                let setter = msg.param(2)?;
                let setter_nick = Source::parse(setter)
                    .and_then(|s| s.nick)
                    .unwrap_or_else(|| setter.to_owned());
                let time = msg
                    .param(3)
                    .and_then(|t| t.parse::<i64>().ok())
                    .and_then(|secs| DateTime::from_timestamp(secs, 0));
                let channel = self.channels.get_mut(&key)?;
                channel.set_topic(None, Some(&setter_nick), time);
            }
            _ => {
                let key = self.fold(msg.param(0)?);
                let setter = msg.source_nick();
                let channel = self.channels.get_mut(&key)?;
                channel.set_topic(msg.param(1), setter, None);
            }
        }
        Some(())
    }

    fn on_mode(&mut self, msg: &Message) -> Option<()> {
        let key = self.fold(msg.param(0)?);
        let modes = msg.param(1)?;
        let channel = self.channels.get_mut(&key)?;
        for change in parse_channel_modes(modes, msg.params_from(2)) {
            channel.apply_mode(&change);
        }
        Some(())
    }

    fn on_names_reply(&mut self, msg: &Message) -> Option<()> {
        let key = self.fold(msg.param(2)?);
        let list = msg.param(3)?;
        let prefix = self.isupport.prefix();
        let names = self.pending_names.entry(key).or_default();
        for entry in list.split_whitespace() {
            let (nick, privileges) = parse_names_entry(entry, prefix);
            if !nick.is_empty() {
                names.insert(nick, privileges);
            }
        }
        Some(())
    }

    fn on_end_of_names(&mut self, msg: &Message) -> Option<Event> {
        let name = msg.param(1)?;
        let key = self.fold(name);
        let users = self.pending_names.remove(&key).unwrap_or_default();

        if let Some(channel) = self.channels.get_mut(&key) {
            channel.merge_names(&users);
        }
        if self.correlations.joins().get(&key) == Some(&true) {
            self.correlations.joins().resolve(&key);
        }

        Some(Event::Names {
            channel: name.to_owned(),
            users,
        })
    }

    fn on_who_reply(&mut self, msg: &Message) -> Option<()> {
        let row = WhoResult::from_reply(msg)?;
        let by_channel = self.fold(&row.channel);
        let by_nick = self.fold(&row.nick);

        let key = self.who_key([by_channel, by_nick])?;
        self.correlations.who().accumulate(&key, |rows| rows.push(row));
        Some(())
    }

    fn on_end_of_who(&mut self, msg: &Message) -> Option<()> {
        let mask = self.fold(msg.param(1)?);
        let key = self.who_key([mask])?;
        self.correlations.who().resolve(&key);
        Some(())
    }

    /// The pending WHO a reply belongs to: the first candidate key that is
    /// waiting, else the only WHO in flight.
    fn who_key<const N: usize>(&mut self, candidates: [String; N]) -> Option<String> {
        let table = self.correlations.who();
        if let Some(key) = candidates.into_iter().find(|k| table.is_pending(k)) {
            return Some(key);
        }
        let mut waiting = table.waiting_keys();
        match (waiting.next(), waiting.next()) {
            (Some(only), None) => Some(only.to_owned()),
            _ => None,
        }
    }

    fn on_whois_fragment(&mut self, msg: &Message) -> Option<()> {
        let nick = msg.param(1)?;
        let key = self.fold(nick);
        if msg.numeric() == Some(311) {
            self.whois_fragments
                .insert(key.clone(), WhoisResult::new(nick));
        }
        self.whois_fragments.get_mut(&key)?.apply_reply(msg);
        Some(())
    }

    fn on_end_of_whois(&mut self, msg: &Message) -> Event {
        let nick = msg.param(1).unwrap_or_default();
        let key = self.fold(nick);
        let result = self.whois_fragments.remove(&key);
        self.correlations.whois().resolve_with(&key, result.clone());
        Event::Whois {
            nick: nick.to_owned(),
            result,
        }
    }

    /// Fail a pending join, part or nick change whose target an error
    /// numeric names.
    fn reject_pending(&mut self, numeric: u16, msg: &Message) {
        let Some(target) = msg.param(1) else {
            return;
        };
        let key = self.fold(target);
        let rejection = || Rejection {
            numeric,
            message: msg.trailing().unwrap_or_default().to_owned(),
        };

        if JOIN_ERRORS.contains(&numeric) && self.correlations.joins().reject(&key, rejection()) {
            debug!(numeric, channel = target, "join rejected");
        }
        if PART_ERRORS.contains(&numeric) && self.correlations.parts().reject(&key, rejection()) {
            debug!(numeric, channel = target, "part rejected");
        }
        if self.state == ConnectionState::Connected
            && NICK_ERRORS.contains(&numeric)
            && self.correlations.nicks().reject(&key, rejection())
        {
            debug!(numeric, nick = target, "nick change rejected");
        }
    }
}
