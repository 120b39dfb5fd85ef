use crate::source::Source;

/// A single IRCv3 message tag: a key and an optional value.
///
/// A tag without a value (`@+draft/typing`) is a present-only flag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag(pub String, pub Option<String>);

/// An IRC protocol message.
///
/// Parsed messages keep the line they were parsed from (see [`Message::raw`]);
/// equality compares only tags, source, command and parameters.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    /// IRCv3 tags in wire order.
    pub tags: Vec<Tag>,
    /// Who sent the message, if the server said.
    pub source: Option<Source>,
    /// Alphabetic command or three-digit numeric, as received.
    pub command: String,
    /// Ordered parameters; the last one may contain spaces.
    pub params: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub(crate) raw: Option<String>,
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.tags == other.tags
            && self.source == other.source
            && self.command == other.command
            && self.params == other.params
    }
}

impl Eq for Message {}

impl Message {
    /// Build an outbound message from a command and its parameters.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Message {
            tags: Vec::new(),
            source: None,
            command: command.into(),
            params: params.into_iter().map(Into::into).collect(),
            raw: None,
        }
    }

    /// Attach a tag. Tags are never serialized on outbound lines; this exists
    /// for constructing inbound-shaped messages.
    #[must_use]
    pub fn with_tag(mut self, key: &str, value: Option<&str>) -> Self {
        self.tags
            .push(Tag(key.to_owned(), value.map(str::to_owned)));
        self
    }

    /// Attach a source.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// The line this message was parsed from, terminator included.
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Look up a tag: `None` if absent, `Some(None)` for a flag tag.
    pub fn tag(&self, key: &str) -> Option<Option<&str>> {
        self.tags
            .iter()
            .find(|Tag(k, _)| k == key)
            .map(|Tag(_, v)| v.as_deref())
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// Parameters from `index` onwards (empty if out of range).
    pub fn params_from(&self, index: usize) -> &[String] {
        self.params.get(index..).unwrap_or(&[])
    }

    /// The last parameter.
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Nick of the source, if the source is a user.
    pub fn source_nick(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.nick.as_deref())
    }

    /// The numeric code, if the command is a three-digit numeric.
    pub fn numeric(&self) -> Option<u16> {
        if self.command.len() == 3 && self.command.bytes().all(|b| b.is_ascii_digit()) {
            self.command.parse().ok()
        } else {
            None
        }
    }

    /// Whether the command is `command`, ignoring ASCII case.
    pub fn is(&self, command: &str) -> bool {
        self.command.eq_ignore_ascii_case(command)
    }
}
