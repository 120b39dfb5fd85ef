//! The blocking IRC client.
//!
//! A [`Client`] owns one [`Transport`] and a worker thread that reads from
//! it. Every inbound line goes through [`Client::handle_message`], which
//! updates the session state, completes pending requests and dispatches
//! events to registered handlers. Caller-facing operations such as
//! [`Client::join`] send a command and then poll the shared state until the
//! server has answered or the timeout elapses.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use slirc_client::{Client, ClientConfig, Event, EventKind};
//!
//! # fn main() -> slirc_client::Result<()> {
//! let client = Client::new(ClientConfig::new("irc.libera.chat", 6667, "slirc-bot"));
//! client.on(EventKind::Message, |event| {
//!     if let Event::Message { target, text, .. } = event {
//!         println!("{target}: {text}");
//!     }
//! });
//!
//! client.connect(Duration::from_secs(30))?;
//! client.join("#slirc", None, Duration::from_secs(10))?;
//! client.privmsg("#slirc", "hello")?;
//! client.quit(Some("bye"))?;
//! # Ok(())
//! # }
//! ```

mod config;
mod pending;
mod session;
mod worker;

pub use self::config::ClientConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use self::pending::{Correlations, Table};
use self::session::{Action, Session};
use crate::error::{ClientError, Result, TransportError};
use crate::event::{dispatch, Event, EventKind, HandlerId, Handlers};
use crate::isupport::Isupport;
use crate::roster::{Channel, WhoResult, WhoisResult};
use crate::state::ConnectionState;
use crate::transport::Transport;
use crate::util::{max_text_bytes, relay_prefix_len, split_message, MAX_MESSAGE_BODY};
use crate::Message;

/// Interval between polls of a pending request.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long `quit` waits for the worker thread to finish.
const WORKER_JOIN_WAIT: Duration = Duration::from_secs(2);

/// Progress line for users who asked for verbose output.
macro_rules! progress {
    ($config:expr, $($arg:tt)+) => {
        if $config.verbose {
            tracing::info!(target: "slirc_client::progress", $($arg)+);
        }
    };
}

struct Inner {
    session: Session,
    handlers: Handlers,
}

/// State shared between the client handle and its worker thread.
pub(crate) struct Shared {
    config: ClientConfig,
    inner: Mutex<Inner>,
    transport: Mutex<Box<dyn Transport>>,
}

impl Shared {
    fn handle_message(&self, msg: &Message) {
        let actions = self.inner.lock().session.handle(msg, Instant::now());
        self.perform(actions);
    }

    fn perform(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(msg) => {
                    if let Err(e) = self.send(&msg) {
                        warn!(command = %msg.command, error = %e, "automatic reply failed");
                    }
                }
                Action::Emit(event) => self.emit(event),
            }
        }
    }

    /// Run the handlers for `event` with no lock held.
    fn emit(&self, event: Event) {
        let handlers = self.inner.lock().handlers.snapshot(event.kind());
        dispatch(&handlers, &event);
    }

    /// Write one command. Every outbound message goes through here.
    fn send(&self, msg: &Message) -> Result<()> {
        if !msg.is_single_line() {
            return Err(ClientError::InvalidInput {
                command: msg.command.clone(),
            });
        }
        let line = msg.to_line();
        trace!(line = %line.trim_end(), ">>");
        self.transport.lock().write(&line)?;
        Ok(())
    }

    /// Forget the connection, close the transport and announce it.
    fn teardown(&self) {
        self.inner.lock().session.reset();
        self.transport.lock().disconnect();
        progress!(self.config, "Disconnected");
        self.emit(Event::Disconnect);
    }
}

/// A spawned reader thread and its own stop flag.
///
/// Each connection gets a fresh flag, so a worker left detached by a quit
/// from one of its handlers can never be revived by a later `connect`.
struct Worker {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
}

/// A blocking IRC client. Safe to share between threads.
pub struct Client {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Client {
    /// A client that will connect over TCP (or TLS) as `config` describes.
    pub fn new(config: ClientConfig) -> Self {
        let transport = config.transport();
        Self::with_transport(config, transport)
    }

    /// A client driven by a caller-supplied transport.
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        let session = Session::new(&config);
        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    session,
                    handlers: Handlers::new(),
                }),
                transport: Mutex::new(Box::new(transport)),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Open the transport, register, and block until the server welcomes us.
    ///
    /// On timeout the half-open connection is torn down.
    pub fn connect(&self, timeout: Duration) -> Result<()> {
        {
            let mut inner = self.shared.inner.lock();
            let state = inner.session.state();
            if state != ConnectionState::Disconnected {
                return Err(ClientError::InvalidState {
                    operation: "connect",
                    state,
                });
            }
            inner.session.begin_connect();
        }
        // A worker left over from a dropped connection has exited by now.
        self.join_worker();

        let config = &self.shared.config;
        progress!(config, "Connecting to {}:{}...", config.host, config.port);

        if let Err(e) = self.shared.transport.lock().connect() {
            self.shared.inner.lock().session.reset();
            return Err(e.into());
        }

        let burst = self.shared.inner.lock().session.start_registration();
        for msg in &burst {
            if let Err(e) = self.shared.send(msg) {
                self.shared.inner.lock().session.reset();
                self.shared.transport.lock().disconnect();
                return Err(e);
            }
        }

        let running = Arc::new(AtomicBool::new(true));
        let handle = {
            let shared = Arc::clone(&self.shared);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("slirc-client".to_string())
                .spawn(move || worker::run(shared, running))
                .map_err(|e| {
                    self.shared.inner.lock().session.reset();
                    self.shared.transport.lock().disconnect();
                    TransportError::Io(e)
                })?
        };
        *self.worker.lock() = Some(Worker { handle, running });

        let outcome = poll_until(timeout, || match self.state() {
            ConnectionState::Connected => Some(Ok(())),
            ConnectionState::Disconnected => Some(Err(TransportError::Closed)),
            _ => None,
        });
        match outcome {
            Some(Ok(())) => {
                progress!(config, "Connected");
                Ok(())
            }
            Some(Err(e)) => {
                self.join_worker();
                Err(e.into())
            }
            None => {
                debug!(?timeout, "registration did not complete");
                self.shutdown();
                Err(ClientError::Timeout {
                    operation: "connect",
                    after: timeout,
                })
            }
        }
    }

    /// Send QUIT, stop the worker, close the transport and emit `Disconnect`.
    ///
    /// A reason that would not fit on one line is refused before anything
    /// is torn down.
    pub fn quit(&self, reason: Option<&str>) -> Result<()> {
        self.require_open("quit")?;
        let msg = Message::quit(reason);
        match self.shared.send(&msg) {
            Err(e @ ClientError::InvalidInput { .. }) => return Err(e),
            Err(e) => debug!(error = %e, "QUIT could not be sent"),
            Ok(()) => {}
        }
        self.shutdown();
        Ok(())
    }

    /// Join `channel` and wait for the server to confirm it with the end of
    /// the NAMES listing.
    pub fn join(&self, channel: &str, key: Option<&str>, timeout: Duration) -> Result<()> {
        progress!(self.shared.config, "Joining {}...", channel);
        self.correlate(
            "join",
            Correlations::joins,
            |session| session.fold(channel),
            false,
            Message::join(channel, key),
            timeout,
        )?;
        progress!(self.shared.config, "Joined {}", channel);
        Ok(())
    }

    pub fn part(&self, channel: &str, reason: Option<&str>, timeout: Duration) -> Result<()> {
        progress!(self.shared.config, "Parting {}...", channel);
        self.correlate(
            "part",
            Correlations::parts,
            |session| session.fold(channel),
            (),
            Message::part(channel, reason),
            timeout,
        )?;
        progress!(self.shared.config, "Left {}", channel);
        Ok(())
    }

    /// Change our nick and wait until the server confirms it.
    pub fn change_nick(&self, nick: &str, timeout: Duration) -> Result<()> {
        progress!(self.shared.config, "Changing nick to {}...", nick);
        self.correlate(
            "nick",
            Correlations::nicks,
            |session| session.fold(nick),
            (),
            Message::nick(nick),
            timeout,
        )?;
        progress!(self.shared.config, "Nick is now {}", nick);
        Ok(())
    }

    /// Run WHO for `mask` and collect the rows until end of list.
    pub fn who(&self, mask: &str, timeout: Duration) -> Result<Vec<WhoResult>> {
        progress!(self.shared.config, "Sending WHO {}...", mask);
        let rows = self.correlate(
            "who",
            Correlations::who,
            |session| session.fold(mask),
            Vec::new(),
            Message::who(mask),
            timeout,
        )?;
        progress!(self.shared.config, "WHO complete ({} results)", rows.len());
        Ok(rows)
    }

    /// Run WHOIS for `nick`. `None` means the server does not know the nick.
    pub fn whois(&self, nick: &str, timeout: Duration) -> Result<Option<WhoisResult>> {
        progress!(self.shared.config, "Sending WHOIS {}...", nick);
        let result = self.correlate(
            "whois",
            Correlations::whois,
            |session| session.fold(nick),
            None,
            Message::whois(nick),
            timeout,
        )?;
        progress!(self.shared.config, "WHOIS complete");
        Ok(result)
    }

    /// Ask which of `nicks` are online. An empty list returns immediately.
    pub fn ison(&self, nicks: &[&str], timeout: Duration) -> Result<Vec<String>> {
        if nicks.is_empty() {
            return Ok(Vec::new());
        }
        progress!(self.shared.config, "Sending ISON {}...", nicks.join(" "));
        let online = self.correlate(
            "ison",
            Correlations::ison,
            |session| session.correlations().next_ison_key(),
            Vec::new(),
            Message::ison(nicks),
            timeout,
        )?;
        progress!(self.shared.config, "ISON complete ({} online)", online.len());
        Ok(online)
    }

    /// Send a PRIVMSG, split over several lines if it does not fit in one.
    pub fn privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.send_text("privmsg", target, text, Message::privmsg)
    }

    /// Alias of [`Client::privmsg`].
    pub fn msg(&self, target: &str, text: &str) -> Result<()> {
        self.privmsg(target, text)
    }

    pub fn notice(&self, target: &str, text: &str) -> Result<()> {
        self.send_text("notice", target, text, Message::notice)
    }

    /// Set the topic, or query it with `None`.
    pub fn topic(&self, channel: &str, topic: Option<&str>) -> Result<()> {
        self.send("topic", &Message::topic(channel, topic))
    }

    pub fn kick(&self, channel: &str, nick: &str, reason: Option<&str>) -> Result<()> {
        self.send("kick", &Message::kick(channel, nick, reason))
    }

    pub fn names(&self, channel: &str) -> Result<()> {
        self.send("names", &Message::names(channel))
    }

    pub fn mode(&self, target: &str, modes: Option<&str>, args: &[&str]) -> Result<()> {
        self.send("mode", &Message::mode(target, modes, args))
    }

    /// Send `line` verbatim. Anything after the first line break is dropped.
    pub fn raw(&self, line: &str) -> Result<()> {
        self.require_open("raw")?;
        let line = line.split(['\r', '\n']).next().unwrap_or_default();
        trace!(line = %line, ">>");
        self.shared.transport.lock().write(line)?;
        Ok(())
    }

    /// Register a handler for `kind`. Handlers run on the worker thread in
    /// registration order.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.shared.inner.lock().handlers.add(kind, Arc::new(handler))
    }

    /// Remove every handler for `kind`, returning how many were removed.
    pub fn off(&self, kind: EventKind) -> usize {
        self.shared.inner.lock().handlers.clear(kind)
    }

    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.shared.inner.lock().handlers.remove(id)
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.shared.inner.lock().handlers.count(kind)
    }

    /// Feed one inbound message through protocol handling and dispatch.
    ///
    /// The worker calls this for every line it reads.
    pub fn handle_message(&self, msg: &Message) {
        self.shared.handle_message(msg);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().session.state()
    }

    /// Current nick: the server-confirmed one once registered.
    pub fn nick(&self) -> String {
        self.shared.inner.lock().session.nick().to_owned()
    }

    /// Source of the welcome message.
    pub fn server(&self) -> Option<String> {
        self.shared.inner.lock().session.server().map(str::to_owned)
    }

    pub fn isupport(&self) -> Isupport {
        self.shared.inner.lock().session.isupport().clone()
    }

    /// Snapshot of every joined channel.
    pub fn channels(&self) -> Vec<Channel> {
        self.shared.inner.lock().session.channels().cloned().collect()
    }

    pub fn channel(&self, name: &str) -> Option<Channel> {
        self.shared.inner.lock().session.channel(name).cloned()
    }

    pub fn last_received_at(&self) -> Option<Instant> {
        self.shared.inner.lock().session.last_received()
    }

    /// Nothing has arrived for three minutes.
    pub fn is_stale(&self) -> bool {
        self.shared.inner.lock().session.is_stale(Instant::now())
    }

    fn require_open(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            ConnectionState::Disconnected => Err(ClientError::InvalidState {
                operation,
                state: ConnectionState::Disconnected,
            }),
            _ => Ok(()),
        }
    }

    fn require_connected(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            state => Err(ClientError::InvalidState { operation, state }),
        }
    }

    fn send(&self, operation: &'static str, msg: &Message) -> Result<()> {
        self.require_open(operation)?;
        self.shared.send(msg)
    }

    fn send_text(
        &self,
        operation: &'static str,
        target: &str,
        text: &str,
        build: fn(&str, &str) -> Message,
    ) -> Result<()> {
        self.require_open(operation)?;
        let max_bytes = {
            let inner = self.shared.inner.lock();
            let session = &inner.session;
            let line_length = session.isupport().linelen().unwrap_or(MAX_MESSAGE_BODY);
            max_text_bytes(
                line_length,
                &operation.to_ascii_uppercase(),
                target,
                relay_prefix_len(session.nick(), session.user()),
            )
        };

        let mut lines: Vec<&str> = text.split(['\r', '\n']).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            lines.push("");
        }
        for line in lines {
            for chunk in split_message(line, max_bytes) {
                self.shared.send(&build(target, chunk))?;
            }
        }
        Ok(())
    }

    /// Register a pending request, send `message`, and wait for the session
    /// to complete the request.
    fn correlate<T>(
        &self,
        operation: &'static str,
        table: fn(&mut Correlations) -> &mut Table<T>,
        key: impl FnOnce(&mut Session) -> String,
        initial: T,
        message: Message,
        timeout: Duration,
    ) -> Result<T> {
        self.require_connected(operation)?;
        let key = {
            let mut inner = self.shared.inner.lock();
            let key = key(&mut inner.session);
            table(inner.session.correlations()).register(key.clone(), initial);
            key
        };
        let give_up = || {
            let mut inner = self.shared.inner.lock();
            let outcome = table(inner.session.correlations()).remove(&key);
            inner.session.abandon(&key);
            outcome
        };
        if let Err(e) = self.shared.send(&message) {
            give_up();
            return Err(e);
        }

        let outcome = poll_until(timeout, || {
            table(self.shared.inner.lock().session.correlations()).take_ready(&key)
        })
        // A reply may have landed between the last poll and the deadline.
        .or_else(give_up);

        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(rejection)) => Err(ClientError::Rejected {
                operation,
                numeric: rejection.numeric,
                message: rejection.message,
            }),
            None => Err(ClientError::Timeout {
                operation,
                after: timeout,
            }),
        }
    }

    /// Stop the worker and tear the connection down if it is still up.
    fn shutdown(&self) {
        let was_running = self
            .worker
            .lock()
            .as_ref()
            .is_some_and(|worker| worker.running.swap(false, Ordering::AcqRel));
        self.join_worker();
        if was_running {
            self.shared.teardown();
        }
    }

    fn join_worker(&self) {
        let Some(Worker { handle, .. }) = self.worker.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            debug!("stopping from the worker thread, not joining it");
            return;
        }

        let deadline = Instant::now() + WORKER_JOIN_WAIT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(wait = ?WORKER_JOIN_WAIT, "worker thread did not stop in time");
                return;
            }
            thread::sleep(POLL_INTERVAL);
        }
        if handle.join().is_err() {
            warn!("worker thread panicked");
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("host", &self.shared.config.host)
            .field("port", &self.shared.config.port)
            .field("state", &self.state())
            .finish()
    }
}

/// Call `check` every [`POLL_INTERVAL`] until it yields or `timeout` passes.
fn poll_until<T>(timeout: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_until_times_out() {
        let start = Instant::now();
        let result: Option<()> = poll_until(Duration::from_millis(30), || None);
        assert!(result.is_none());
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_poll_until_returns_early() {
        let mut calls = 0;
        let result = poll_until(Duration::from_secs(5), || {
            calls += 1;
            (calls == 3).then_some(calls)
        });
        assert_eq!(result, Some(3));
    }
}
