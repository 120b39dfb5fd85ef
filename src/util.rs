//! Utility functions for IRC protocol handling.
//!
//! This module provides helper functions that are commonly needed when
//! sending IRC messages: safe string truncation and fitting message text
//! into the line length budget.

/// Default maximum length of an IRC line, CRLF included.
pub const MAX_MESSAGE_BODY: usize = 512;

/// Longest host name a server will put in the relayed source prefix.
const MAX_HOST_LEN: usize = 63;

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// # Examples
///
/// ```
/// use slirc_client::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
///
/// // Multi-byte chars are not split
/// let emoji = "Hello 👋 World";
/// assert_eq!(truncate_utf8_safe(emoji, 8), "Hello ");
///
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// How many bytes of text fit in one `COMMAND target :text\r\n` line.
///
/// `prefix_length` reserves room for the `:nick!user@host ` source the
/// server prepends when relaying. Never returns less than 1.
///
/// # Examples
///
/// ```
/// use slirc_client::util::max_text_bytes;
///
/// assert_eq!(max_text_bytes(512, "PRIVMSG", "#test", 0), 495);
/// assert_eq!(max_text_bytes(10, "PRIVMSG", "#very_long_channel_name", 0), 1);
/// ```
pub fn max_text_bytes(line_length: usize, command: &str, target: &str, prefix_length: usize) -> usize {
    // spaces around the target, the trailing colon, CRLF
    let overhead = command.len() + 1 + target.len() + 2 + 2 + prefix_length;
    line_length.saturating_sub(overhead).max(1)
}

/// Bytes to reserve for the source prefix the server adds when relaying a
/// message from `nick`/`user`.
pub fn relay_prefix_len(nick: &str, user: &str) -> usize {
    // ':' nick '!' user '@' host ' '
    1 + nick.len() + 1 + user.len() + 1 + MAX_HOST_LEN + 1
}

/// Splits message text into chunks of at most `max_bytes` bytes.
///
/// Chunks break at the last space that fits (the space itself is consumed),
/// falling back to a byte cut that never splits a UTF-8 character. Text that
/// already fits, including empty text, comes back as a single chunk. A
/// character wider than `max_bytes` ends the split.
///
/// # Examples
///
/// ```
/// use slirc_client::util::split_message;
///
/// let chunks: Vec<_> = split_message("hello world foo bar", 11).collect();
/// assert_eq!(chunks, vec!["hello world", "foo bar"]);
///
/// let long = "a".repeat(50);
/// let chunks: Vec<_> = split_message(&long, 20).collect();
/// assert_eq!(chunks.len(), 3);
/// ```
pub fn split_message(s: &str, max_bytes: usize) -> impl Iterator<Item = &str> {
    SplitMessage {
        remaining: s,
        max_bytes,
        started: false,
    }
}

struct SplitMessage<'a> {
    remaining: &'a str,
    max_bytes: usize,
    started: bool,
}

impl<'a> SplitMessage<'a> {
    fn take(&mut self, end: usize, skip: usize) -> &'a str {
        let chunk = &self.remaining[..end];
        self.remaining = &self.remaining[end + skip..];
        chunk
    }
}

impl<'a> Iterator for SplitMessage<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let first = !self.started;
        self.started = true;

        if self.remaining.is_empty() && !first {
            return None;
        }
        if self.remaining.len() <= self.max_bytes {
            return Some(self.take(self.remaining.len(), 0));
        }

        // A space right after the budget still counts as a break point.
        let window = truncate_utf8_safe(self.remaining, self.max_bytes.saturating_add(1));
        if let Some(space) = window.rfind(' ').filter(|&i| i > 0) {
            return Some(self.take(space, 1));
        }

        let chunk = truncate_utf8_safe(self.remaining, self.max_bytes);
        if chunk.is_empty() {
            self.remaining = "";
            return None;
        }
        Some(self.take(chunk.len(), 0))
    }
}
