//! Integration test common infrastructure.
//!
//! Provides an in-process mock IRC server and helpers for connecting a
//! client to it.

pub mod client;
pub mod server;

#[allow(unused_imports)]
pub use client::{connected, disconnect_reason, test_config};
#[allow(unused_imports)]
pub use server::{MockServer, ServerConn};
