//! Fuzz target for CTCP message parsing
//!
//! This fuzzer tests the CTCP parser and the ERRMSG reply builder for
//! robustness against malformed input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_proto::ctcp::{Ctcp, ERRMSG_ECHO_LIMIT};
use std::str;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = str::from_utf8(data) {
        if input.len() > 512 {
            return;
        }

        let _ = Ctcp::parse(input);
        let _ = Ctcp::is_ctcp(input);

        let reply = Ctcp::unknown_query_reply(input);
        assert!(reply.len() <= ERRMSG_ECHO_LIMIT + 32);
    }
});
