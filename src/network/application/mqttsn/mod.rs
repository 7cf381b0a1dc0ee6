//! MQTT-SN 1.2 protocol implementation.
//!
//! MQTT-SN is MQTT for sensor networks: the same publish/subscribe model
//! carried over datagram links (UDP, DTLS, serial radios) through a gateway.
//! Packets are smaller because topics travel as 2-byte identifiers instead of
//! full names.
//!
//! # Topic identifiers
//!
//! - **Normal**: assigned by the gateway in answer to REGISTER or SUBSCRIBE,
//!   valid for the session, tracked by the [`registry::TopicRegistry`]
//! - **Predefined**: agreed on out of band, used as is
//! - **Short**: two-character topic names carried in place of the id
//!
//! Wildcard subscriptions work, but matching happens at the gateway: it
//! registers each concrete topic with the client before publishing to it.

/// Session state machine.
pub mod client;

/// Packet codec.
pub mod packet;

/// Topic name registry.
pub mod registry;

pub use crate::network::application::pubsub::{Message, QoS, SubAckResult};
pub use client::{Client, MessageData, MessageHandler};
pub use packet::{
    Connect, Decoded, MsgType, Options, Packet, Publish, Register, ReturnCode, SubAck, Subscribe,
    TopicAck, TopicId, Unsubscribe, Will, WillTopic,
};
pub use registry::TopicRegistry;
