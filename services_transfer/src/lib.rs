//! # Transfer Service
//!
//! This crate delivers the bytes written to a download sink to the host's
//! native save action.
//!
//! ## Philosophy
//!
//! - **Decide once**: The delivery strategy is chosen when the
//!   [`TransferOrchestrator`] is built, from an injected
//!   [`HostEnvironment`]. Nothing downstream sniffs the engine.
//! - **Bounded buffering when streaming**: Chunks cross to the delegate one
//!   credit at a time, so at most one chunk is ever in flight.
//! - **Release what you borrow**: Object URLs are revoked after a delay,
//!   channel endpoints are closed or aborted on every path, and the
//!   keep-alive stops when the transfer ends.
//!
//! ## Strategies
//!
//! - **Buffered**: [`BufferedSink`] collects every chunk and, on close,
//!   saves the concatenation through an ephemeral object URL.
//! - **Streaming**: [`StreamingSink`] normalizes chunks to binary and
//!   forwards them over an `ipc` channel to the [`DelegateContext`], which
//!   writes them to the [`SaveTarget`] and reports a [`DeliveryReport`].

pub mod config;
pub mod delegate;
pub mod headers;
pub mod host;
pub mod keep_alive;
pub mod normalize;
pub mod orchestrator;
pub mod sink;

pub use config::{ConfigError, TransferConfig, DEFAULT_CONTENT_TYPE};
pub use delegate::{DelegateContext, DelegateMessage, DelegatePort, DeliveryReport, Registration};
pub use headers::{decode_filename, encode_filename, ResponseHeaders};
pub use host::{DirectorySaveTarget, HostEnvironment, ObjectEntry, ObjectUrlRegistry, SaveTarget};
pub use keep_alive::KeepAlive;
pub use normalize::{download_payload, normalize, Normalized};
pub use orchestrator::{select_strategy, TransferOrchestrator, TransferStrategy};
pub use sink::{BufferedSink, StreamingSink};
