//! Fuzz target for IRC message parsing and line framing
//!
//! Feeds arbitrary bytes through the codec the client reads with. Neither
//! the codec nor the parser may panic, and the codec must always make
//! progress.

#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use slirc_proto::IrcCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8191 {
        return;
    }

    let mut codec = match IrcCodec::new("utf-8") {
        Ok(codec) => codec,
        Err(_) => return,
    };
    let mut buf = BytesMut::from(data);

    // Every call either yields, errors after consuming input, or asks for more.
    loop {
        let before = buf.len();
        match codec.decode(&mut buf) {
            Ok(Some(msg)) => {
                let _ = msg.to_string().parse::<slirc_proto::Message>();
            }
            Ok(None) => break,
            Err(_) => assert!(buf.len() < before || buf.is_empty()),
        }
    }

    if let Ok(input) = std::str::from_utf8(data) {
        let _ = input.parse::<slirc_proto::Message>();
        let _ = IrcCodec::sanitize(input.to_string());
    }
});
