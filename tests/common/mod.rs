//! In-memory transport for driving a [`Client`] against a scripted server.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use slirc_client::{Client, ClientConfig, Transport, TransportError};

type Responder = Box<dyn FnMut(&str) -> Vec<String> + Send>;

#[derive(Default)]
struct ServerState {
    open: bool,
    peer_closed: bool,
    refuse: bool,
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    responder: Option<Responder>,
}

/// The server side of a [`MockTransport`]. Cloning shares the same state.
#[derive(Clone, Default)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl MockServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every line the client writes with the lines `f` returns.
    pub fn respond<F>(&self, f: F)
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        self.state.lock().responder = Some(Box::new(f));
    }

    /// Queue a line for the client to read.
    pub fn push(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");
        self.state.lock().inbound.push_back(bytes);
    }

    /// Close the connection from the server side.
    pub fn hang_up(&self) {
        self.state.lock().peer_closed = true;
    }

    /// Make the next `connect` fail.
    pub fn refuse(&self) {
        self.state.lock().refuse = true;
    }

    /// Every line the client wrote, without line terminators.
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    pub fn sent_starting_with(&self, prefix: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn transport(&self) -> MockTransport {
        MockTransport {
            server: self.clone(),
        }
    }
}

pub struct MockTransport {
    server: MockServer,
}

impl Transport for MockTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.server.state.lock();
        if state.refuse {
            return Err(TransportError::Refused("mock:6667".to_string()));
        }
        state.open = true;
        state.peer_closed = false;
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.server.state.lock();
        state.open = false;
        state.inbound.clear();
    }

    fn read(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut state = self.server.state.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        if let Some(line) = state.inbound.pop_front() {
            return Ok(Some(line));
        }
        if state.peer_closed {
            return Err(TransportError::Closed);
        }
        Ok(None)
    }

    fn write(&mut self, line: &str) -> Result<(), TransportError> {
        let mut state = self.server.state.lock();
        if !state.open {
            return Err(TransportError::NotConnected);
        }
        let line = line.trim_end_matches(['\r', '\n']).to_string();
        state.sent.push(line.clone());

        let replies = match state.responder.as_mut() {
            Some(responder) => responder(&line),
            None => Vec::new(),
        };
        for reply in replies {
            let mut bytes = reply.into_bytes();
            bytes.extend_from_slice(b"\r\n");
            state.inbound.push_back(bytes);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.server.state.lock().open
    }
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn config() -> ClientConfig {
    ClientConfig::new("irc.test", 6667, "me").with_realname("Me Bot")
}

/// A small well-behaved server: welcomes `me`, confirms joins with a NAMES
/// listing, answers PING-free traffic with nothing.
pub fn basic_server(line: &str) -> Vec<String> {
    let mut words = line.split(' ');
    match (words.next(), words.next()) {
        (Some("USER"), _) => vec![
            ":irc.test 001 me :Welcome to the Test IRC Network me".to_string(),
            ":irc.test 005 me CASEMAPPING=rfc1459 NETWORK=TestNet PREFIX=(ov)@+ :are supported by this server".to_string(),
        ],
        (Some("JOIN"), Some(channel)) => vec![
            format!(":me!me@test.host JOIN {channel}"),
            format!(":irc.test 332 me {channel} :Test topic"),
            format!(":irc.test 353 me = {channel} :me @alice"),
            format!(":irc.test 353 me = {channel} :+bob carol"),
            format!(":irc.test 366 me {channel} :End of /NAMES list."),
        ],
        (Some("PART"), Some(channel)) => vec![format!(":me!me@test.host PART {channel}")],
        _ => Vec::new(),
    }
}

/// A client connected to `server`, which answers with `basic_server`.
pub fn connected(server: &MockServer) -> Client {
    server.respond(basic_server);
    let client = Client::with_transport(config(), server.transport());
    client.connect(TIMEOUT).expect("registration should complete");
    client
}

/// Poll `check` until it holds or `limit` passes.
pub fn wait_for(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    check()
}
