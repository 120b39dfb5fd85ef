//! IRC case-mapping functions.
//!
//! IRC uses a special case-insensitive comparison where some characters
//! are considered equivalent (e.g., `[` and `{`). Servers advertise which
//! mapping they use through the `CASEMAPPING` ISUPPORT token.

/// A case mapping a server may advertise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CaseMapping {
    /// ASCII letters only.
    Ascii,
    /// ASCII letters plus `[]\~` folding to `{}|^`.
    #[default]
    Rfc1459,
}

impl CaseMapping {
    /// Map an ISUPPORT `CASEMAPPING` value; unknown names fall back to
    /// RFC 1459.
    pub fn from_token(value: &str) -> CaseMapping {
        if value.eq_ignore_ascii_case("ascii") {
            CaseMapping::Ascii
        } else {
            CaseMapping::Rfc1459
        }
    }

    #[inline]
    fn fold(self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => c.to_ascii_lowercase(),
            (CaseMapping::Rfc1459, '[') => '{',
            (CaseMapping::Rfc1459, ']') => '}',
            (CaseMapping::Rfc1459, '\\') => '|',
            (CaseMapping::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Lowercase `s` under this mapping.
    pub fn to_lower(self, s: &str) -> String {
        s.chars().map(|c| self.fold(c)).collect()
    }

    /// Compare two strings case-insensitively under this mapping.
    pub fn eq(self, a: &str, b: &str) -> bool {
        a.len() == b.len()
            && a
                .chars()
                .zip(b.chars())
                .all(|(ca, cb)| self.fold(ca) == self.fold(cb))
    }
}

/// Convert a string to IRC lowercase using RFC 1459 case mapping.
pub fn irc_to_lower(s: &str) -> String {
    CaseMapping::Rfc1459.to_lower(s)
}

/// Compare two strings using RFC 1459 case-insensitive comparison.
pub fn irc_eq(a: &str, b: &str) -> bool {
    CaseMapping::Rfc1459.eq(a, b)
}
