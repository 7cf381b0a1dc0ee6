//! # libmqtt - Embedded MQTT and MQTT-SN client
//!
//! A publish/subscribe client for IoT devices that speaks two related wire
//! protocols over any transport you plug in:
//!
//! - **MQTT 3.1.1** (and the 3.1 `MQIsdp` CONNECT variant) with full topic
//!   names and wildcard subscriptions, usually carried over TCP or TLS.
//! - **MQTT-SN 1.2**, the compressed topic identifier variant for constrained
//!   links such as UDP, DTLS, or serial radios.
//!
//! The library is designed for embedded systems and supports `no_std`
//! environments: every buffer, table, and queue has a fixed capacity chosen at
//! compile time, and nothing is allocated on the heap.
//!
//! ## Features
//!
//! ### Packet codecs
//! - Bit-exact serialization and deserialization of every packet type
//! - Bounds-checked decoding that never reads past the supplied buffer
//!
//! ### Session state machine
//! - QoS 0, 1 and 2 in both directions with bounded retransmission
//! - Packet identifier allocation and in-flight tracking
//! - Topic handler dispatch with exact, wildcard and default handlers
//! - Keepalive scheduling driven by a cooperative `poll` loop
//!
//! ## Usage
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! libmqtt = "0.1.0"
//! ```
//!
//! ### Encoding a packet
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{Message, Packet, Publish, QoS};
//!
//! let publish = Packet::Publish(Publish {
//!     topic: "sensors/temperature",
//!     message: Message::new(b"23.5", QoS::AtMostOnce),
//! });
//!
//! let mut buf = [0u8; 64];
//! let len = publish.serialize(&mut buf).unwrap();
//! assert_eq!(&buf[..4], &[0x30, 0x19, 0x00, 0x13]);
//!
//! let (decoded, consumed) = Packet::deserialize(&buf[..len]).unwrap();
//! assert_eq!(decoded, publish);
//! assert_eq!(consumed, len);
//! ```
//!
//! ### Running a client
//!
//! The [`mqtt::Client`](network::application::mqtt::Client) and
//! [`mqttsn::Client`](network::application::mqttsn::Client) are generic over a
//! [`Connection`](network::Connection) and a [`Timer`](network::Timer). Call
//! `poll` regularly: it services keepalive and retransmission deadlines, reads
//! once from the transport, and dispatches whatever arrived.
//!
//! ## Platform Support
//!
//! This library is designed to work on:
//! - Embedded microcontrollers (ARM Cortex-M, RISC-V, etc.)
//! - Linux-based IoT devices (Raspberry Pi, etc.)
//! - Any platform supporting Rust's `core` library
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support, including [`network::StdTimer`]
//! - `defmt`: Enable defmt logging and `defmt::Format` implementations
//! - `log`: Route diagnostics through the `log` facade

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

#[macro_use]
mod fmt;

/// Network abstraction layer providing the transport and timer collaborators
/// and the protocol implementations built on top of them.
pub mod network;
