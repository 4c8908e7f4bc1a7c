//! # Inter-Context Channels
//!
//! This crate defines the credit-based channel that carries written bytes
//! from a producer context to an independently scheduled consumer context.
//!
//! ## Philosophy
//!
//! - **Messages, not shared memory**: Chunks change owner when they are sent;
//!   the two contexts never touch the same mutable state.
//! - **One credit, one chunk**: The producer may only transmit after the
//!   consumer grants a credit, and every transmission spends it. The consumer
//!   therefore never holds more than one unacknowledged chunk.
//! - **Explicit states**: The producer endpoint is a small state machine
//!   (Blocked, Ready, Closed, Errored) instead of a web of callbacks.
//!
//! ## Architecture
//!
//! [`channel()`] builds a connected [`ProducerEndpoint`] /
//! [`ConsumerEndpoint`] pair over two ordered queues, one per direction.
//! Protocol traffic is the tagged [`ChannelMessage`] union.

pub mod backpressure;
pub mod channel;
pub mod message;

pub use backpressure::{
    channel, ConsumerEndpoint, CreditWait, ProducerEndpoint, ProducerEvent, ProducerState,
};
pub use channel::ChannelId;
pub use message::{ChannelMessage, MessageTag};
