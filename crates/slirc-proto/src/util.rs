//! Small string helpers shared by clients: prefix splitting, channel name
//! detection, byte-safe truncation and IRC wildcard masks.

use crate::casemap::irc_lower_char;

/// Extract the nickname from a `nick!user@host` prefix.
///
/// Server prefixes (containing a dot and no `!`/`@`) yield `None`.
///
/// ```
/// use slirc_proto::util::nick_from_prefix;
///
/// assert_eq!(nick_from_prefix("alice!a@example.com"), Some("alice"));
/// assert_eq!(nick_from_prefix("bob"), Some("bob"));
/// assert_eq!(nick_from_prefix("irc.example.com"), None);
/// ```
pub fn nick_from_prefix(prefix: &str) -> Option<&str> {
    let end = prefix.find(['!', '@']).unwrap_or(prefix.len());
    let nick = &prefix[..end];
    if nick.is_empty() || (end == prefix.len() && nick.contains('.')) {
        return None;
    }
    Some(nick)
}

/// Whether `target` names a channel rather than a user.
///
/// ```
/// use slirc_proto::util::is_channel_name;
///
/// assert!(is_channel_name("#rust"));
/// assert!(is_channel_name("&local"));
/// assert!(!is_channel_name("alice"));
/// ```
#[inline]
pub fn is_channel_name(target: &str) -> bool {
    target.len() > 1 && target.starts_with(['#', '&', '+', '!'])
}

/// Truncate to at most `max_bytes` without splitting a UTF-8 codepoint.
///
/// ```
/// use slirc_proto::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
/// assert_eq!(truncate_utf8_safe("hé", 2), "h");
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|&i| s.is_char_boundary(i))
        .unwrap_or(0);
    &s[..end]
}

/// Match `text` against an IRC wildcard `pattern` (`*` and `?`), folding
/// case with RFC 1459 rules.
///
/// ```
/// use slirc_proto::util::wildcard_match;
///
/// assert!(wildcard_match("ali*", "ALICE"));
/// assert!(wildcard_match("b?b", "bob"));
/// assert!(!wildcard_match("b?b", "bobby"));
/// ```
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().map(irc_lower_char).collect();
    let text: Vec<char> = text.chars().map(irc_lower_char).collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` seen, and the text index it was tried against.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    p = star + 1;
                    t = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match a full `nick!user@host` against a mask.
///
/// A mask without `!` or `@` is treated as a bare nickname (`nick!*@*`).
///
/// ```
/// use slirc_proto::util::matches_hostmask;
///
/// assert!(matches_hostmask("*!*@*.example.com", "nick!user@host.example.com"));
/// assert!(matches_hostmask("frodo", "Frodo!bag@shire.me"));
/// assert!(!matches_hostmask("frodo", "sam!bag@shire.me"));
/// ```
pub fn matches_hostmask(mask: &str, hostmask: &str) -> bool {
    if mask.contains(['!', '@']) {
        wildcard_match(mask, hostmask)
    } else {
        wildcard_match(&format!("{mask}!*@*"), hostmask)
    }
}
