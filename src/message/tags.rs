//! IRCv3 message tag parsing. Tags are only ever read, never sent.

use super::Tag;

/// Unescape a tag value from wire format.
///
/// `\:` `\s` `\\` `\r` `\n` map back to `;`, space, backslash, CR and LF.
/// Any other escaped character stands for itself.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Split a raw tag block (without the leading `@`) into ordered tags.
///
/// `key` alone becomes a flag tag with no value; `key=value` carries the
/// unescaped value. Empty segments between semicolons are skipped.
pub(crate) fn parse_tag_block(block: &str) -> Vec<Tag> {
    block
        .split(';')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((key, value)) => Tag(key.to_owned(), Some(unescape_tag_value(value))),
            None => Tag(segment.to_owned(), None),
        })
        .collect()
}
