//! # Application Layer Network Protocols
//!
//! This module contains the publish/subscribe protocol clients. Both share one
//! session core and one error taxonomy, and differ in their wire codec and in
//! how topics are named on the wire.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT 3.1.1 client with full topic names and wildcards
//! - **[`mqttsn`]**: MQTT-SN 1.2 client with registered, predefined and short
//!   topic identifiers
//! - **[`pubsub`]**: the shared building blocks (wire primitives, message model,
//!   packet identifiers, in-flight tracking, configuration)
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **No-std Compatible**: Designed for embedded systems without heap allocation
//! - **Resource Conscious**: Use fixed-size buffers and minimal memory
//! - **Cooperative**: Nothing runs unless the application calls into the client

/// Building blocks shared by the MQTT and MQTT-SN clients.
pub mod pubsub;

/// MQTT 3.1.1 codec and client.
pub mod mqtt;

/// MQTT-SN 1.2 codec, topic registry and client.
pub mod mqttsn;
