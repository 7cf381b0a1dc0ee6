//! Shared publish/subscribe machinery.
//!
//! Everything in here is protocol neutral: the MQTT and MQTT-SN clients plug
//! their codecs into the same wire primitives, in-flight table and session
//! core.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod inflight;
pub mod message;
pub mod packet_id;
pub mod session;
pub mod wire;

pub use config::Config;
pub use error::Error;
pub use handlers::HandlerTable;
pub use inflight::{AwaitingRelease, Exchange, ExchangeKind, InFlight, Stage};
pub use message::{Message, QoS, SubAckResult};
pub use packet_id::PacketIdAllocator;
pub use session::{Event, Session, State};

/// Maximum length of a topic name or filter kept by a client (handler keys,
/// registry entries).
pub const MAX_TOPIC_LEN: usize = 128;

/// Number of completion events a client buffers before dropping the oldest.
pub const EVENT_QUEUE_LEN: usize = 8;
