//! slirc-client - Straylight IRC client engine.
//!
//! One [`Client`] owns one server connection. Inbound lines are parsed and
//! republished as [`Event`]s; higher-level operations such as
//! [`Client::join`] and [`Client::who`] are built from reply watchers that
//! resolve [`Deferred`] results.
//!
//! ```no_run
//! use slirc_client::{Client, Config, EventName};
//!
//! # async fn run() -> Result<(), slirc_client::ClientError> {
//! let client = Client::new(Config::default())?;
//! let joiner = client.clone();
//! client.on(EventName::Numeric(1), move |_| {
//!     joiner.join(["#rust", "#tokio"]).on_finish(|results| {
//!         println!("{} channels settled", results.len());
//!     });
//! });
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod channel;
pub mod client;
pub mod config;
pub mod correlator;
pub mod deferred;
pub mod error;
pub mod event;
pub mod registry;
pub mod telemetry;

pub use aggregate::{Aggregate, Operation, Results};
pub use channel::{Channel, Member, WhoEntry};
pub use client::{Client, JoinRequest};
pub use config::{Config, ConfigError};
pub use correlator::{Correlator, Expect, Reply, ReplyTemplate};
pub use deferred::{Deferred, Outcome, Reason, State};
pub use error::ClientError;
pub use event::{Emitter, Event, EventName, Subscription};
pub use registry::Registry;
