//! MQTT 3.1.1 packet codec.
//!
//! Every control packet is a variant of [`Packet`]. Encoding goes through
//! [`Packet::serialize`], which sizes the whole packet before touching the
//! output buffer; decoding goes through [`Packet::deserialize`], which returns
//! views borrowed from the input.
//!
//! # Fixed header
//!
//! ```text
//!   bit    7   6   5   4   3     2   1     0
//!        +---------------+-----+-------+--------+
//! byte 1 |  packet type  | DUP |  QoS  | RETAIN |
//!        +---------------+-----+-------+--------+
//! byte 2..5  remaining length (1 to 4 bytes)
//! ```
//!
//! # Examples
//!
//! ```rust
//! use libmqtt::network::application::mqtt::{Ack, Packet};
//!
//! let mut buf = [0u8; 4];
//! let len = Packet::PubRel(Ack::new(7)).serialize(&mut buf).unwrap();
//! assert_eq!(&buf[..len], &[0x62, 0x02, 0x00, 0x07]);
//! ```

use heapless::Vec;

use crate::network::application::pubsub::wire::{
    self, MAX_REMAINING_LENGTH, Writer, remaining_length_len,
};
use crate::network::application::pubsub::{Error, Message, QoS, SubAckResult};

/// Shift of the packet type nibble in the first header byte.
pub const TYPE_SHIFT: u8 = 4;
/// Duplicate delivery flag.
pub const DUP_FLAG: u8 = 0x08;
/// QoS bits.
pub const QOS_MASK: u8 = 0x06;
/// Shift of the QoS bits.
pub const QOS_SHIFT: u8 = 1;
/// Retain flag.
pub const RETAIN_FLAG: u8 = 0x01;

/// Most topic filters carried by one SUBSCRIBE, UNSUBSCRIBE or SUBACK.
pub const MAX_FILTERS: usize = 8;

// CONNECT flag byte
const CONNECT_RESERVED: u8 = 0x01;
const CONNECT_CLEAN_SESSION: u8 = 0x02;
const CONNECT_WILL: u8 = 0x04;
const CONNECT_WILL_QOS_MASK: u8 = 0x18;
const CONNECT_WILL_QOS_SHIFT: u8 = 3;
const CONNECT_WILL_RETAIN: u8 = 0x20;
const CONNECT_PASSWORD: u8 = 0x40;
const CONNECT_USERNAME: u8 = 0x80;

/// MQTT control packet types, as carried in the high nibble of the header.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PacketType {
    /// Client request to connect.
    Connect = 1,
    /// Connect acknowledgement.
    ConnAck = 2,
    /// Publish message.
    Publish = 3,
    /// QoS 1 acknowledgement.
    PubAck = 4,
    /// QoS 2 step 1.
    PubRec = 5,
    /// QoS 2 step 2.
    PubRel = 6,
    /// QoS 2 step 3.
    PubComp = 7,
    /// Subscribe request.
    Subscribe = 8,
    /// Subscribe acknowledgement.
    SubAck = 9,
    /// Unsubscribe request.
    Unsubscribe = 10,
    /// Unsubscribe acknowledgement.
    UnsubAck = 11,
    /// Ping request.
    PingReq = 12,
    /// Ping response.
    PingResp = 13,
    /// Client is disconnecting.
    Disconnect = 14,
}

impl PacketType {
    /// Packet type of a fixed header byte.
    pub fn from_header(header: u8) -> Result<Self, Error> {
        Self::try_from(header >> TYPE_SHIFT)
    }
}

impl TryFrom<u8> for PacketType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => PacketType::Connect,
            2 => PacketType::ConnAck,
            3 => PacketType::Publish,
            4 => PacketType::PubAck,
            5 => PacketType::PubRec,
            6 => PacketType::PubRel,
            7 => PacketType::PubComp,
            8 => PacketType::Subscribe,
            9 => PacketType::SubAck,
            10 => PacketType::Unsubscribe,
            11 => PacketType::UnsubAck,
            12 => PacketType::PingReq,
            13 => PacketType::PingResp,
            14 => PacketType::Disconnect,
            _ => return Err(Error::MalformedPacket),
        })
    }
}

/// Whether the DUP flag is set in a fixed header byte.
pub fn header_dup(header: u8) -> bool {
    header & DUP_FLAG != 0
}

/// QoS bits of a fixed header byte.
pub fn header_qos(header: u8) -> Result<QoS, Error> {
    QoS::from_bits((header & QOS_MASK) >> QOS_SHIFT)
}

/// Whether the RETAIN flag is set in a fixed header byte.
pub fn header_retain(header: u8) -> bool {
    header & RETAIN_FLAG != 0
}

/// Protocol name and level sent in CONNECT.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolVersion {
    /// MQTT 3.1, protocol name `MQIsdp`, level 3.
    V3_1,
    /// MQTT 3.1.1, protocol name `MQTT`, level 4.
    V3_1_1,
}

impl ProtocolVersion {
    /// Protocol name string.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolVersion::V3_1 => "MQIsdp",
            ProtocolVersion::V3_1_1 => "MQTT",
        }
    }

    /// Protocol level byte.
    pub fn level(&self) -> u8 {
        match self {
            ProtocolVersion::V3_1 => 3,
            ProtocolVersion::V3_1_1 => 4,
        }
    }

    fn from_wire(name: &[u8], level: u8) -> Result<Self, Error> {
        match (name, level) {
            (b"MQIsdp", 3) => Ok(ProtocolVersion::V3_1),
            (b"MQTT", 4) => Ok(ProtocolVersion::V3_1_1),
            _ => Err(Error::ProtocolMismatch),
        }
    }
}

/// Last will, published by the server if the client vanishes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Will<'a> {
    /// Topic the will is published to.
    pub topic: &'a str,
    /// Will payload.
    pub message: &'a [u8],
    /// QoS of the will publication.
    pub qos: QoS,
    /// Whether the will is retained.
    pub retained: bool,
}

/// CONNECT parameters.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::mqtt::Options;
///
/// let mut options = Options::new("sensor-42");
/// options.keep_alive_seconds = 120;
/// options.username = Some("alice");
/// options.password = Some(b"");
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Options<'a> {
    /// Protocol name and level.
    pub version: ProtocolVersion,
    /// Client identifier, unique per server.
    pub client_id: &'a str,
    /// Longest idle interval before a ping, zero to disable keepalive.
    pub keep_alive_seconds: u16,
    /// Discard any previous session state on the server.
    pub clean_session: bool,
    /// Optional last will.
    pub will: Option<Will<'a>>,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password. Only valid together with a user name.
    pub password: Option<&'a [u8]>,
}

impl<'a> Options<'a> {
    /// MQTT 3.1.1, 60 second keepalive, clean session, no will or
    /// credentials.
    pub fn new(client_id: &'a str) -> Self {
        Self {
            version: ProtocolVersion::V3_1_1,
            client_id,
            keep_alive_seconds: 60,
            clean_session: true,
            will: None,
            username: None,
            password: None,
        }
    }

    fn flags(&self) -> Result<u8, Error> {
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::MalformedPacket);
        }
        let mut flags = 0;
        if self.clean_session {
            flags |= CONNECT_CLEAN_SESSION;
        }
        if let Some(will) = &self.will {
            flags |= CONNECT_WILL;
            flags |= (will.qos as u8) << CONNECT_WILL_QOS_SHIFT;
            if will.retained {
                flags |= CONNECT_WILL_RETAIN;
            }
        }
        if self.username.is_some() {
            flags |= CONNECT_USERNAME;
        }
        if self.password.is_some() {
            flags |= CONNECT_PASSWORD;
        }
        Ok(flags)
    }
}

/// CONNACK contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnAckResult {
    /// Zero when accepted, otherwise the refusal reason.
    pub return_code: u8,
    /// Whether the server resumed a stored session.
    pub session_present: bool,
}

/// PUBLISH contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Publish<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Message with flags and packet identifier.
    pub message: Message<'a>,
}

/// Shape shared by PUBACK, PUBREC, PUBREL, PUBCOMP and UNSUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ack {
    /// Identifier of the acknowledged packet.
    pub packet_id: u16,
    /// Duplicate flag from the fixed header.
    pub dup: bool,
}

impl Ack {
    /// An acknowledgement without the DUP flag.
    pub fn new(packet_id: u16) -> Self {
        Self { packet_id, dup: false }
    }
}

/// SUBSCRIBE contents.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subscribe<'a> {
    /// Packet identifier.
    pub packet_id: u16,
    /// Duplicate flag.
    pub dup: bool,
    /// Topic filters and the QoS requested for each.
    pub filters: Vec<(&'a str, QoS), MAX_FILTERS>,
}

/// SUBACK contents.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubAck {
    /// Identifier of the acknowledged SUBSCRIBE.
    pub packet_id: u16,
    /// One result per requested filter, in order.
    pub results: Vec<SubAckResult, MAX_FILTERS>,
}

/// UNSUBSCRIBE contents.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Unsubscribe<'a> {
    /// Packet identifier.
    pub packet_id: u16,
    /// Duplicate flag.
    pub dup: bool,
    /// Topic filters to remove.
    pub filters: Vec<&'a str, MAX_FILTERS>,
}

/// An MQTT control packet.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Packet<'a> {
    /// CONNECT
    Connect(Options<'a>),
    /// CONNACK
    ConnAck(ConnAckResult),
    /// PUBLISH
    Publish(Publish<'a>),
    /// PUBACK
    PubAck(Ack),
    /// PUBREC
    PubRec(Ack),
    /// PUBREL
    PubRel(Ack),
    /// PUBCOMP
    PubComp(Ack),
    /// SUBSCRIBE
    Subscribe(Subscribe<'a>),
    /// SUBACK
    SubAck(SubAck),
    /// UNSUBSCRIBE
    Unsubscribe(Unsubscribe<'a>),
    /// UNSUBACK
    UnsubAck(Ack),
    /// PINGREQ
    PingReq,
    /// PINGRESP
    PingResp,
    /// DISCONNECT
    Disconnect,
}

fn lstring_len(bytes: &[u8]) -> Result<usize, Error> {
    if bytes.len() > u16::MAX as usize {
        return Err(Error::MalformedPacket);
    }
    Ok(2 + bytes.len())
}

impl<'a> Packet<'a> {
    /// Packet type of this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect => PacketType::Disconnect,
        }
    }

    fn header(&self) -> u8 {
        let flags = match self {
            Packet::Publish(p) => {
                let mut flags = (p.message.qos as u8) << QOS_SHIFT;
                if p.message.dup {
                    flags |= DUP_FLAG;
                }
                if p.message.retained {
                    flags |= RETAIN_FLAG;
                }
                flags
            }
            Packet::PubRel(ack) => (1 << QOS_SHIFT) | if ack.dup { DUP_FLAG } else { 0 },
            Packet::PubAck(ack) | Packet::PubRec(ack) | Packet::PubComp(ack) | Packet::UnsubAck(ack) => {
                if ack.dup { DUP_FLAG } else { 0 }
            }
            Packet::Subscribe(Subscribe { dup, .. }) | Packet::Unsubscribe(Unsubscribe { dup, .. }) => {
                (1 << QOS_SHIFT) | if *dup { DUP_FLAG } else { 0 }
            }
            _ => 0,
        };
        ((self.packet_type() as u8) << TYPE_SHIFT) | flags
    }

    fn remaining_len(&self) -> Result<usize, Error> {
        let len = match self {
            Packet::Connect(options) => {
                options.flags()?;
                let mut len = lstring_len(options.version.name().as_bytes())? + 1 + 1 + 2;
                len += lstring_len(options.client_id.as_bytes())?;
                if let Some(will) = &options.will {
                    len += lstring_len(will.topic.as_bytes())?;
                    len += lstring_len(will.message)?;
                }
                if let Some(username) = options.username {
                    len += lstring_len(username.as_bytes())?;
                }
                if let Some(password) = options.password {
                    len += lstring_len(password)?;
                }
                len
            }
            Packet::ConnAck(_) => 2,
            Packet::Publish(p) => {
                if p.message.qos == QoS::AtMostOnce && p.message.dup {
                    return Err(Error::MalformedPacket);
                }
                let id = if p.message.qos == QoS::AtMostOnce { 0 } else { 2 };
                lstring_len(p.topic.as_bytes())? + id + p.message.payload.len()
            }
            Packet::PubAck(_) | Packet::PubRec(_) | Packet::PubRel(_) | Packet::PubComp(_) | Packet::UnsubAck(_) => 2,
            Packet::Subscribe(s) => {
                if s.filters.is_empty() {
                    return Err(Error::MalformedPacket);
                }
                let mut len = 2;
                for (filter, _) in &s.filters {
                    len += lstring_len(filter.as_bytes())? + 1;
                }
                len
            }
            Packet::SubAck(s) => {
                if s.results.is_empty() {
                    return Err(Error::MalformedPacket);
                }
                2 + s.results.len()
            }
            Packet::Unsubscribe(u) => {
                if u.filters.is_empty() {
                    return Err(Error::MalformedPacket);
                }
                let mut len = 2;
                for filter in &u.filters {
                    len += lstring_len(filter.as_bytes())?;
                }
                len
            }
            Packet::PingReq | Packet::PingResp | Packet::Disconnect => 0,
        };
        if len > MAX_REMAINING_LENGTH {
            return Err(Error::MalformedLength);
        }
        Ok(len)
    }

    /// Total encoded size in bytes, fixed header included.
    pub fn encoded_len(&self) -> Result<usize, Error> {
        let remaining = self.remaining_len()?;
        Ok(1 + remaining_length_len(remaining) + remaining)
    }

    /// Encode into `buf` and return the number of bytes written.
    ///
    /// Nothing is written unless the whole packet fits; a short buffer fails
    /// with `BufferTooSmall` and is left untouched.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let remaining = self.remaining_len()?;
        let total = 1 + remaining_length_len(remaining) + remaining;
        if buf.len() < total {
            return Err(Error::BufferTooSmall);
        }

        let mut w = Writer::new(buf);
        w.put_u8(self.header())?;
        w.put_remaining_length(remaining)?;
        match self {
            Packet::Connect(options) => encode_connect(&mut w, options)?,
            Packet::ConnAck(result) => {
                w.put_u8(u8::from(result.session_present))?;
                w.put_u8(result.return_code)?;
            }
            Packet::Publish(p) => {
                w.put_lstring(p.topic.as_bytes())?;
                if p.message.qos != QoS::AtMostOnce {
                    w.put_u16(p.message.id)?;
                }
                w.put_bytes(p.message.payload)?;
            }
            Packet::PubAck(ack) | Packet::PubRec(ack) | Packet::PubRel(ack) | Packet::PubComp(ack) | Packet::UnsubAck(ack) => {
                w.put_u16(ack.packet_id)?;
            }
            Packet::Subscribe(s) => {
                w.put_u16(s.packet_id)?;
                for (filter, qos) in &s.filters {
                    w.put_lstring(filter.as_bytes())?;
                    w.put_u8(*qos as u8)?;
                }
            }
            Packet::SubAck(s) => {
                w.put_u16(s.packet_id)?;
                for result in &s.results {
                    w.put_u8(result.code())?;
                }
            }
            Packet::Unsubscribe(u) => {
                w.put_u16(u.packet_id)?;
                for filter in &u.filters {
                    w.put_lstring(filter.as_bytes())?;
                }
            }
            Packet::PingReq | Packet::PingResp | Packet::Disconnect => {}
        }
        Ok(w.finish())
    }

    /// Decode the frame at the start of `buf`.
    ///
    /// Returns the packet and the number of bytes it occupied. Fails with
    /// `TruncatedInput` when `buf` ends before the frame its header declares,
    /// which means more bytes must be read.
    pub fn deserialize(buf: &'a [u8]) -> Result<(Self, usize), Error> {
        let (header, _) = wire::read_u8(buf, 0)?;
        let (remaining, used) = wire::read_remaining_length(buf, 1).map_err(|e| match e {
            Error::MalformedLength => Error::MalformedPacket,
            other => other,
        })?;
        let start = 1 + used;
        let end = start + remaining;
        let body = buf.get(start..end).ok_or(Error::TruncatedInput)?;

        let packet = decode_body(header, body).map_err(|e| match e {
            // inside a complete frame a short field is a malformed packet
            Error::TruncatedInput | Error::MalformedLength => Error::MalformedPacket,
            other => other,
        })?;
        Ok((packet, end))
    }
}

/// Length of the frame starting at `buf[0]`, fixed header included.
///
/// Fails with `TruncatedInput` until the whole remaining length field is
/// available.
pub fn frame_len(buf: &[u8]) -> Result<usize, Error> {
    wire::read_u8(buf, 0)?;
    let (remaining, used) = wire::read_remaining_length(buf, 1)?;
    Ok(1 + used + remaining)
}

fn encode_connect(w: &mut Writer<'_>, options: &Options<'_>) -> Result<(), Error> {
    w.put_lstring(options.version.name().as_bytes())?;
    w.put_u8(options.version.level())?;
    w.put_u8(options.flags()?)?;
    w.put_u16(options.keep_alive_seconds)?;
    w.put_lstring(options.client_id.as_bytes())?;
    if let Some(will) = &options.will {
        w.put_lstring(will.topic.as_bytes())?;
        w.put_lstring(will.message)?;
    }
    if let Some(username) = options.username {
        w.put_lstring(username.as_bytes())?;
    }
    if let Some(password) = options.password {
        w.put_lstring(password)?;
    }
    Ok(())
}

fn expect_flags(header: u8, flags: u8) -> Result<(), Error> {
    if header & 0x0F == flags {
        Ok(())
    } else {
        Err(Error::MalformedPacket)
    }
}

fn expect_end(body: &[u8], offset: usize) -> Result<(), Error> {
    if offset == body.len() {
        Ok(())
    } else {
        Err(Error::MalformedPacket)
    }
}

fn decode_ack(header: u8, body: &[u8], qos_bits: u8) -> Result<Ack, Error> {
    if header & (QOS_MASK | RETAIN_FLAG) != qos_bits << QOS_SHIFT {
        return Err(Error::MalformedPacket);
    }
    if body.len() != 2 {
        return Err(Error::MalformedPacket);
    }
    let (packet_id, _) = wire::read_u16(body, 0)?;
    Ok(Ack {
        packet_id,
        dup: header_dup(header),
    })
}

fn decode_body(header: u8, body: &[u8]) -> Result<Packet<'_>, Error> {
    let packet = match PacketType::from_header(header)? {
        PacketType::Connect => {
            expect_flags(header, 0)?;
            Packet::Connect(decode_connect(body)?)
        }
        PacketType::ConnAck => {
            expect_flags(header, 0)?;
            if body.len() != 2 {
                return Err(Error::MalformedPacket);
            }
            let (ack_flags, _) = wire::read_u8(body, 0)?;
            if ack_flags & !0x01 != 0 {
                return Err(Error::MalformedPacket);
            }
            let (return_code, _) = wire::read_u8(body, 1)?;
            Packet::ConnAck(ConnAckResult {
                return_code,
                session_present: ack_flags & 0x01 != 0,
            })
        }
        PacketType::Publish => Packet::Publish(decode_publish(header, body)?),
        PacketType::PubAck => Packet::PubAck(decode_ack(header, body, 0)?),
        PacketType::PubRec => Packet::PubRec(decode_ack(header, body, 0)?),
        PacketType::PubRel => Packet::PubRel(decode_ack(header, body, 1)?),
        PacketType::PubComp => Packet::PubComp(decode_ack(header, body, 0)?),
        PacketType::UnsubAck => Packet::UnsubAck(decode_ack(header, body, 0)?),
        PacketType::Subscribe => {
            let Ack { packet_id, dup } = decode_request_header(header, body)?;
            let mut filters = Vec::new();
            let mut offset = 2;
            while offset < body.len() {
                let (filter, used) = wire::read_utf8(body, offset)?;
                offset += used;
                let (requested, used) = wire::read_u8(body, offset)?;
                offset += used;
                if requested & !0x03 != 0 {
                    return Err(Error::MalformedPacket);
                }
                let qos = QoS::from_bits(requested)?;
                filters.push((filter, qos)).map_err(|_| Error::MalformedPacket)?;
            }
            if filters.is_empty() {
                return Err(Error::MalformedPacket);
            }
            Packet::Subscribe(Subscribe { packet_id, dup, filters })
        }
        PacketType::SubAck => {
            expect_flags(header, 0)?;
            let (packet_id, _) = wire::read_u16(body, 0)?;
            let mut results = Vec::new();
            for code in body.iter().skip(2) {
                results
                    .push(SubAckResult::from_code(*code)?)
                    .map_err(|_| Error::MalformedPacket)?;
            }
            if results.is_empty() {
                return Err(Error::MalformedPacket);
            }
            Packet::SubAck(SubAck { packet_id, results })
        }
        PacketType::Unsubscribe => {
            let Ack { packet_id, dup } = decode_request_header(header, body)?;
            let mut filters = Vec::new();
            let mut offset = 2;
            while offset < body.len() {
                let (filter, used) = wire::read_utf8(body, offset)?;
                offset += used;
                filters.push(filter).map_err(|_| Error::MalformedPacket)?;
            }
            if filters.is_empty() {
                return Err(Error::MalformedPacket);
            }
            Packet::Unsubscribe(Unsubscribe { packet_id, dup, filters })
        }
        PacketType::PingReq => {
            expect_flags(header, 0)?;
            expect_end(body, 0)?;
            Packet::PingReq
        }
        PacketType::PingResp => {
            expect_flags(header, 0)?;
            expect_end(body, 0)?;
            Packet::PingResp
        }
        PacketType::Disconnect => {
            expect_flags(header, 0)?;
            expect_end(body, 0)?;
            Packet::Disconnect
        }
    };
    Ok(packet)
}

fn decode_request_header(header: u8, body: &[u8]) -> Result<Ack, Error> {
    if header & (QOS_MASK | RETAIN_FLAG) != 1 << QOS_SHIFT {
        return Err(Error::MalformedPacket);
    }
    let (packet_id, _) = wire::read_u16(body, 0)?;
    Ok(Ack {
        packet_id,
        dup: header_dup(header),
    })
}

fn decode_publish(header: u8, body: &[u8]) -> Result<Publish<'_>, Error> {
    let qos = header_qos(header)?;
    let dup = header_dup(header);
    if qos == QoS::AtMostOnce && dup {
        return Err(Error::MalformedPacket);
    }
    let (topic, mut offset) = wire::read_utf8(body, 0)?;
    let mut id = 0;
    if qos != QoS::AtMostOnce {
        let (packet_id, used) = wire::read_u16(body, offset)?;
        offset += used;
        id = packet_id;
    }
    let payload = body.get(offset..).ok_or(Error::MalformedPacket)?;
    Ok(Publish {
        topic,
        message: Message {
            qos,
            retained: header_retain(header),
            dup,
            id,
            payload,
        },
    })
}

fn decode_connect(body: &[u8]) -> Result<Options<'_>, Error> {
    let (name, mut offset) = wire::read_lstring(body, 0)?;
    let (level, used) = wire::read_u8(body, offset)?;
    offset += used;
    let version = ProtocolVersion::from_wire(name, level)?;

    let (flags, used) = wire::read_u8(body, offset)?;
    offset += used;
    if flags & CONNECT_RESERVED != 0 {
        return Err(Error::MalformedPacket);
    }
    let has_will = flags & CONNECT_WILL != 0;
    if !has_will && flags & (CONNECT_WILL_QOS_MASK | CONNECT_WILL_RETAIN) != 0 {
        return Err(Error::MalformedPacket);
    }
    if flags & CONNECT_PASSWORD != 0 && flags & CONNECT_USERNAME == 0 {
        return Err(Error::MalformedPacket);
    }

    let (keep_alive_seconds, used) = wire::read_u16(body, offset)?;
    offset += used;
    let (client_id, used) = wire::read_utf8(body, offset)?;
    offset += used;

    let mut will = None;
    if has_will {
        let qos = QoS::from_bits((flags & CONNECT_WILL_QOS_MASK) >> CONNECT_WILL_QOS_SHIFT)?;
        let (topic, used) = wire::read_utf8(body, offset)?;
        offset += used;
        let (message, used) = wire::read_lstring(body, offset)?;
        offset += used;
        will = Some(Will {
            topic,
            message,
            qos,
            retained: flags & CONNECT_WILL_RETAIN != 0,
        });
    }

    let mut username = None;
    if flags & CONNECT_USERNAME != 0 {
        let (value, used) = wire::read_utf8(body, offset)?;
        offset += used;
        username = Some(value);
    }
    let mut password = None;
    if flags & CONNECT_PASSWORD != 0 {
        let (value, used) = wire::read_lstring(body, offset)?;
        offset += used;
        password = Some(value);
    }
    expect_end(body, offset)?;

    Ok(Options {
        version,
        client_id,
        keep_alive_seconds,
        clean_session: flags & CONNECT_CLEAN_SESSION != 0,
        will,
        username,
        password,
    })
}

/// Set the DUP flag on a stored QoS 1 or 2 PUBLISH before it is
/// retransmitted.
///
/// Every other packet is resent as it was. PUBREL in particular must keep its
/// fixed header flags at 0010.
pub fn mark_dup(packet: &mut [u8]) {
    if let Some(header) = packet.first_mut() {
        if PacketType::from_header(*header) == Ok(PacketType::Publish) && (*header & QOS_MASK) != 0
        {
            *header |= DUP_FLAG;
        }
    }
}
