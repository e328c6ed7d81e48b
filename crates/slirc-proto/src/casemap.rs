//! IRC case-mapping functions.
//!
//! Nicknames and channel names compare case-insensitively under the
//! `rfc1459` mapping: ASCII letters fold as usual and `[]\~` are the
//! uppercase forms of `{}|^`.

/// Fold a single character under RFC 1459 case mapping.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c,
    }
}

/// Fold a whole string under RFC 1459 case mapping.
///
/// Used as the lookup key for channel tables.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Compare two names under RFC 1459 case mapping.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.chars().map(irc_lower_char).eq(b.chars().map(irc_lower_char))
}
