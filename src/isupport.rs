//! RPL_ISUPPORT (005) feature table.

use std::collections::BTreeMap;

use crate::casemap::CaseMapping;

/// Server features advertised through `005` replies.
///
/// Tokens accumulate across replies. `KEY=value` stores a value, a bare
/// `KEY` stores a flag, and `-KEY` withdraws an earlier token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isupport {
    entries: BTreeMap<String, Option<String>>,
}

impl Isupport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the parameters of one `005` reply.
    ///
    /// The first parameter (our nick) and the last (the human-readable
    /// "are supported by this server") are skipped.
    pub fn apply_reply(&mut self, params: &[String]) {
        if params.len() < 2 {
            return;
        }
        for token in &params[1..params.len() - 1] {
            self.apply_token(token);
        }
    }

    /// Apply a single token.
    pub fn apply_token(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        if let Some(key) = token.strip_prefix('-') {
            self.entries.remove(key);
            return;
        }
        match token.split_once('=') {
            Some((key, value)) => {
                self.entries.insert(key.to_owned(), Some(value.to_owned()));
            }
            None => {
                self.entries.insert(token.to_owned(), None);
            }
        }
    }

    /// `None` if absent, `Some(None)` if advertised as a flag.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries.get(key).map(Option::as_deref)
    }

    /// Value of `key`, if it was advertised with one.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).flatten()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The advertised case mapping, RFC 1459 when not advertised.
    pub fn casemapping(&self) -> CaseMapping {
        self.value("CASEMAPPING")
            .map(CaseMapping::from_token)
            .unwrap_or_default()
    }

    pub fn network(&self) -> Option<&str> {
        self.value("NETWORK")
    }

    pub fn prefix(&self) -> Option<PrefixSpec<'_>> {
        self.value("PREFIX").and_then(PrefixSpec::parse)
    }

    /// Maximum line length, when the server raises it above 512.
    pub fn linelen(&self) -> Option<usize> {
        self.value("LINELEN").and_then(|v| v.parse().ok())
    }
}

/// A parsed `PREFIX=(modes)prefixes` value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrefixSpec<'a> {
    pub modes: &'a str,
    pub prefixes: &'a str,
}

impl<'a> PrefixSpec<'a> {
    pub fn parse(s: &'a str) -> Option<Self> {
        if let Some(open) = s.find('(') {
            if let Some(close) = s[open + 1..].find(')') {
                let close = open + 1 + close;
                let modes = &s[open + 1..close];
                let prefixes = &s[close + 1..];
                if !modes.is_empty() && !prefixes.is_empty() {
                    return Some(PrefixSpec { modes, prefixes });
                }
            }
        } else if !s.is_empty() {
            return Some(PrefixSpec { modes: "", prefixes: s });
        }
        None
    }

    /// The mode letter granted by a NAMES prefix symbol.
    pub fn mode_for_prefix(&self, prefix: char) -> Option<char> {
        let idx = self.prefixes.chars().position(|c| c == prefix)?;
        self.modes.chars().nth(idx)
    }
}
