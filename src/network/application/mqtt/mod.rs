//! MQTT 3.1.1 protocol implementation for embedded systems.
//!
//! MQTT uses a publish-subscribe pattern where:
//! - **Publishers** send messages to topics
//! - **Subscribers** receive messages from topics they're interested in
//! - **Brokers** route messages between publishers and subscribers
//!
//! # Key Features
//!
//! - MQTT 3.1.1 packets, plus the MQTT 3.1 (`MQIsdp`) CONNECT variant
//! - Quality of Service (QoS) levels 0, 1, and 2 in both directions
//! - Clean session and persistent session support
//! - Topic filtering with `+` and `#` wildcards
//! - Keep-alive mechanism for connection monitoring
//! - Last will and username/password authentication
//!
//! # Usage
//!
//! [`packet`] is a standalone codec; [`Client`] runs a session on top of it.
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{Options, Packet};
//!
//! let mut options = Options::new("iot_device_123");
//! options.keep_alive_seconds = 60;
//!
//! let mut buf = [0u8; 64];
//! let len = Packet::Connect(options).serialize(&mut buf).unwrap();
//! assert_eq!(buf[0], 0x10);
//! assert_eq!(&buf[4..8], b"MQTT");
//! # let _ = len;
//! ```

/// Session state machine.
pub mod client;

/// Packet codec.
pub mod packet;

/// Topic filter matching.
pub mod topic;

pub use crate::network::application::pubsub::{Message, QoS, SubAckResult};
pub use client::{Client, MessageData, MessageHandler};
pub use packet::{
    Ack, ConnAckResult, Options, Packet, PacketType, ProtocolVersion, Publish, SubAck, Subscribe,
    Unsubscribe, Will,
};
