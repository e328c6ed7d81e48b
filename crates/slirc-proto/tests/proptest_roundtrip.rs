//! Property-based tests for IRC message parsing and line framing.
//!
//! Uses proptest to generate random IRC components and verify that:
//! 1. Serialized messages can be re-parsed (roundtrip)
//! 2. Parsing never panics on arbitrary input
//! 3. Framing does not depend on where the byte stream is split

use bytes::BytesMut;
use proptest::prelude::*;
use slirc_proto::{irc_to_lower, matches_hostmask, IrcCodec, Message};
use tokio_util::codec::Decoder;

// =============================================================================
// STRATEGIES - Generators for valid IRC components
// =============================================================================

/// Valid IRC nickname. Max 9 chars per RFC 2812.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

fn username_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex")
}

fn hostname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex")
}

/// Either a server name or `nick!user@host`.
fn prefix_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]+\\.[a-z]+\\.[a-z]+").expect("valid regex"),
        (nickname_strategy(), username_strategy(), hostname_strategy())
            .prop_map(|(nick, user, host)| format!("{nick}!{user}@{host}")),
    ]
}

fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[A-Z]{1,12}").expect("valid regex"),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

/// A middle parameter: no spaces, never empty, never `:`-led.
fn middle_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9#&*!@.=\\-][a-zA-Z0-9#&*!@.=:\\-]{0,20}")
        .expect("valid regex")
}

/// Trailing text that doesn't contain CR/LF/NUL.
fn trailing_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[^\r\n\0]{0,400}").expect("valid regex"),
        Just(String::new()),
        Just(":".to_string()),
        Just(": trailing".to_string()),
        Just("multiple   spaces   here".to_string()),
        Just("\x01VERSION\x01".to_string()),
    ]
}

fn message_strategy() -> impl Strategy<Value = Message> {
    (
        prop::option::of(prefix_strategy()),
        command_strategy(),
        prop::collection::vec(middle_strategy(), 0..6),
        prop::option::of(trailing_strategy()),
    )
        .prop_map(|(prefix, command, mut params, trailing)| {
            params.extend(trailing);
            Message {
                prefix,
                command,
                params,
            }
        })
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// parse(serialize(msg)) == msg
    #[test]
    fn message_roundtrip(msg in message_strategy()) {
        let serialized = msg.to_string();
        let parsed: Message = serialized.parse()
            .expect("Serialized message should be parseable");
        prop_assert_eq!(&msg, &parsed, "Roundtrip failed for serialized: {}", serialized);
    }

    /// Parser must never panic, whatever it is fed.
    #[test]
    fn parse_never_panics(input in "\\PC{0,600}") {
        let _ = input.parse::<Message>();
        let _ = IrcCodec::sanitize(input);
    }

    /// Splitting the stream at any byte yields the same messages.
    #[test]
    fn framing_ignores_chunk_boundaries(
        msgs in prop::collection::vec(message_strategy(), 1..8),
        split in any::<prop::sample::Index>(),
    ) {
        let wire: String = msgs.iter().map(ToString::to_string).collect();
        let bytes = wire.as_bytes();
        let at = split.index(bytes.len() + 1);

        // Generated lines may exceed 512 bytes, so lift the limit.
        let mut codec = IrcCodec::with_max_len("utf-8", 64 * 1024).unwrap();
        let mut buf = BytesMut::new();
        let mut decoded = Vec::new();

        for chunk in [&bytes[..at], &bytes[at..]] {
            buf.extend_from_slice(chunk);
            while let Some(msg) = codec.decode(&mut buf).unwrap() {
                decoded.push(msg);
            }
        }

        prop_assert_eq!(decoded, msgs);
        prop_assert!(buf.is_empty());
    }

    /// Case folding is idempotent.
    #[test]
    fn casemap_idempotent(s in "[ -~]{0,40}") {
        let once = irc_to_lower(&s);
        prop_assert_eq!(irc_to_lower(&once), once);
    }

    /// A full hostmask always matches itself and `*!*@*`.
    #[test]
    fn hostmask_matches_self(
        nick in nickname_strategy(),
        user in username_strategy(),
        host in hostname_strategy(),
    ) {
        let full = format!("{nick}!{user}@{host}");
        prop_assert!(matches_hostmask(&full, &full));
        prop_assert!(matches_hostmask("*!*@*", &full));
        prop_assert!(matches_hostmask(&nick, &full));
    }
}
