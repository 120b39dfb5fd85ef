//! The reader loop that runs on the client's worker thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace, warn};

use super::Shared;
use crate::event::Event;
use crate::Message;

/// Sleep between read attempts when nothing is buffered.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Back-off after a recoverable read failure.
const ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Read until `running` is cleared or the connection drops.
pub(super) fn run(shared: Arc<Shared>, running: Arc<AtomicBool>) {
    debug!("worker started");

    while running.load(Ordering::Acquire) {
        let result = shared.transport.lock().read();
        match result {
            Ok(Some(line)) => match Message::parse_bytes(&line) {
                Some(msg) => {
                    trace!(line = %String::from_utf8_lossy(&line).trim_end(), "<<");
                    shared.handle_message(&msg);
                }
                None => {
                    trace!(line = %String::from_utf8_lossy(&line).trim_end(), "skipping malformed line");
                }
            },
            Ok(None) => thread::sleep(IDLE_POLL),
            Err(e) if e.is_fatal() => {
                // Whoever clears the flag first owns the teardown.
                if running.swap(false, Ordering::AcqRel) {
                    warn!(error = %e, "connection lost");
                    shared.teardown();
                }
                break;
            }
            Err(e) => {
                warn!(error = %e, "read failed");
                shared.emit(Event::Error {
                    numeric: None,
                    message: e.to_string(),
                });
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    debug!("worker stopped");
}
