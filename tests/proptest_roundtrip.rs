//! Property-based tests for the wire codec and text helpers.
//!
//! Uses proptest to generate random IRC components and verify that:
//! 1. Parsing never panics, on any input
//! 2. Serialized messages re-parse to the same command and parameters
//! 3. Inbound tag values, source parsing, splitting and case-folding hold their
//!    invariants across random inputs

use proptest::prelude::*;
use slirc_client::util::split_message;
use slirc_client::{irc_eq, irc_to_lower, Message, Source};

/// Escape a tag value the way a server writes it on the wire.
fn server_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => escaped.push_str("\\:"),
            ' ' => escaped.push_str("\\s"),
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

// =============================================================================
// STRATEGIES - Generators for valid IRC components
// =============================================================================

/// Valid IRC nickname: starts with letter or special char, followed by
/// letters, digits, or special chars. Max 9 chars per RFC 2812.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

/// Valid IRC username (ident): alphanumeric, no spaces or @ or !
fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex")
}

/// Valid hostname: simplified version
fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

/// Valid IRC channel name: starts with # or &, followed by valid chars
fn channel_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#&][a-zA-Z0-9_\\-]{1,49}").expect("valid regex")
}

/// Message text: printable ASCII plus a few multi-byte characters.
fn message_text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ -~éü🎉]{0,400}").expect("valid regex")
}

/// Tag key: alphanumeric with optional vendor prefix
fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?[a-zA-Z][a-zA-Z0-9\\-]{0,30}").expect("valid regex")
}

/// Tag value including the characters that need escaping.
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 ;\\\\._\\-]{0,60}").expect("valid regex")
}

/// Commands a client sends, with their parameters.
fn message_strategy() -> impl Strategy<Value = Message> {
    prop_oneof![
        (channel_strategy(), message_text_strategy())
            .prop_map(|(target, text)| Message::privmsg(&target, &text)),
        (nickname_strategy(), message_text_strategy())
            .prop_map(|(target, text)| Message::notice(&target, &text)),
        nickname_strategy().prop_map(|nick| Message::nick(&nick)),
        (channel_strategy(), prop::option::of(username_strategy()))
            .prop_map(|(chan, key)| Message::join(&chan, key.as_deref())),
        (channel_strategy(), prop::option::of(message_text_strategy()))
            .prop_map(|(chan, reason)| Message::part(&chan, reason.as_deref())),
        hostname_strategy().prop_map(|token| Message::pong(&token)),
        prop::option::of(message_text_strategy()).prop_map(|r| Message::quit(r.as_deref())),
        (
            channel_strategy(),
            nickname_strategy(),
            prop::option::of(message_text_strategy())
        )
            .prop_map(|(chan, nick, reason)| Message::kick(&chan, &nick, reason.as_deref())),
        (username_strategy(), message_text_strategy())
            .prop_map(|(user, realname)| Message::user(&user, &realname)),
        prop::collection::vec(nickname_strategy(), 1..6).prop_map(|nicks| {
            let nicks: Vec<&str> = nicks.iter().map(String::as_str).collect();
            Message::ison(&nicks)
        }),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// parse → serialize → parse keeps command and parameters
    #[test]
    fn message_roundtrip(msg in message_strategy()) {
        let serialized = msg.to_string();
        prop_assert!(serialized.ends_with("\r\n"));

        let parsed: Message = serialized.parse()
            .expect("Serialized message should be parseable");

        prop_assert_eq!(&msg, &parsed,
            "Roundtrip failed for serialized: {}", serialized);
        prop_assert_eq!(parsed.to_string(), serialized);
    }

    /// Parsing never panics, whatever the input
    #[test]
    fn parse_never_panics(line in any::<String>()) {
        let _ = line.parse::<Message>();
    }

    #[test]
    fn parse_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..600)) {
        let _ = Message::parse_bytes(&bytes);
    }

    /// Source parsing splits a full `nick!user@host` into its parts
    #[test]
    fn source_full_mask(
        nick in nickname_strategy(),
        user in username_strategy(),
        host in hostname_strategy()
    ) {
        let raw = format!("{}!{}@{}", nick, user, host);
        let source = Source::parse(&raw).expect("full mask parses");
        prop_assert_eq!(source.nick.as_deref(), Some(nick.as_str()));
        prop_assert_eq!(source.user.as_deref(), Some(user.as_str()));
        prop_assert_eq!(source.host.as_deref(), Some(host.as_str()));
        prop_assert_eq!(source.raw, raw);
    }

    /// A server-escaped tag value reads back unchanged
    #[test]
    fn tag_value_unescapes(
        key in tag_key_strategy(),
        value in tag_value_strategy()
    ) {
        let escaped = server_escape(&value);
        let line = format!("@{}={} PING test", key, escaped);

        let parsed: Message = line.parse().expect("Tagged message should parse");
        prop_assert_eq!(parsed.tag(&key), Some(Some(value.as_str())),
            "Tag value mismatch for line {}", line);
    }

    /// Chunks respect the byte budget and lose nothing but break spaces
    #[test]
    fn split_respects_budget(
        text in prop::string::string_regex("[a-zé ]{0,300}").expect("valid regex"),
        max in 2usize..120
    ) {
        let chunks: Vec<&str> = split_message(&text, max).collect();
        prop_assert!(!chunks.is_empty());
        for chunk in &chunks {
            prop_assert!(chunk.len() <= max, "chunk of {} bytes over {}", chunk.len(), max);
        }

        let kept: String = chunks.concat().chars().filter(|c| *c != ' ').collect();
        let original: String = text.chars().filter(|c| *c != ' ').collect();
        prop_assert_eq!(kept, original);
    }

    /// Case-folding is idempotent and ignores ASCII case
    #[test]
    fn casefold_properties(nick in nickname_strategy()) {
        let folded = irc_to_lower(&nick);
        prop_assert_eq!(irc_to_lower(&folded), folded.clone());
        prop_assert!(irc_eq(&nick, &nick.to_ascii_uppercase()));
        prop_assert!(irc_eq(&nick, &folded));
    }
}

// =============================================================================
// EDGE CASE TESTS
// =============================================================================

proptest! {
    /// Empty message text keeps its trailing form
    #[test]
    fn empty_message_text_roundtrip(target in channel_strategy()) {
        let msg = Message::privmsg(&target, "");
        let serialized = msg.to_string();
        prop_assert_eq!(&serialized, &format!("PRIVMSG {} :\r\n", target));

        let parsed: Message = serialized.parse().expect("Should parse");
        prop_assert_eq!(msg, parsed);
    }

    /// Text that starts with a colon is never mistaken for a middle param
    #[test]
    fn leading_colon_survives(target in channel_strategy(), word in username_strategy()) {
        let text = format!(":{}", word);
        let parsed: Message = Message::privmsg(&target, &text).to_string().parse().expect("Should parse");
        prop_assert_eq!(parsed.trailing(), Some(text.as_str()));
    }
}
