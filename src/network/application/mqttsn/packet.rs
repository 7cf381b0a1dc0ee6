//! MQTT-SN 1.2 packet codec.
//!
//! ```text
//! +--------+---------+-----------------+
//! | Length | MsgType | Variable part   |
//! +--------+---------+-----------------+
//!  1 byte, or 0x01 followed by a 2-byte length when the packet is longer
//!  than 255 bytes. The length counts the whole packet, itself included.
//! ```
//!
//! Topics travel as 2-byte identifiers: registered (`Normal`), `Predefined`
//! or two-character `Short` names. Only SUBSCRIBE, UNSUBSCRIBE and REGISTER
//! carry full topic names.
//!
//! # Examples
//!
//! ```rust
//! use libmqtt::network::application::mqttsn::{Packet, Publish, TopicId};
//! use libmqtt::network::application::pubsub::{Message, QoS};
//!
//! let mut message = Message::new(b"on", QoS::AtLeastOnce);
//! message.id = 1;
//! let publish = Packet::Publish(Publish { topic: TopicId::Normal(5), message });
//!
//! let mut buf = [0u8; 16];
//! let len = publish.serialize(&mut buf).unwrap();
//! assert_eq!(&buf[..len], &[0x09, 0x0C, 0x20, 0x00, 0x05, 0x00, 0x01, b'o', b'n']);
//! ```

use crate::network::application::pubsub::wire::{self, Writer};
use crate::network::application::pubsub::{Error, Message, QoS};

/// Duplicate delivery flag.
pub const DUP_FLAG: u8 = 0x80;
/// QoS bits.
pub const QOS_MASK: u8 = 0x60;
/// Shift of the QoS bits.
pub const QOS_SHIFT: u8 = 5;
/// Retain flag.
pub const RETAIN_FLAG: u8 = 0x10;
/// Will flag (CONNECT).
pub const WILL_FLAG: u8 = 0x08;
/// Clean session flag (CONNECT).
pub const CLEAN_SESSION_FLAG: u8 = 0x04;
/// Topic identifier type bits.
pub const TOPIC_TYPE_MASK: u8 = 0x03;

/// Protocol id carried by CONNECT.
pub const PROTOCOL_ID: u8 = 0x01;

// marks the 3-byte length form
const LONG_LENGTH: u8 = 0x01;

const TOPIC_TYPE_NORMAL: u8 = 0x00;
const TOPIC_TYPE_PREDEFINED: u8 = 0x01;
const TOPIC_TYPE_SHORT: u8 = 0x02;

/// MQTT-SN message types.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum MsgType {
    Connect = 0x04,
    ConnAck = 0x05,
    WillTopicReq = 0x06,
    WillTopic = 0x07,
    WillMsgReq = 0x08,
    WillMsg = 0x09,
    Register = 0x0A,
    RegAck = 0x0B,
    Publish = 0x0C,
    PubAck = 0x0D,
    PubComp = 0x0E,
    PubRec = 0x0F,
    PubRel = 0x10,
    Subscribe = 0x12,
    SubAck = 0x13,
    Unsubscribe = 0x14,
    UnsubAck = 0x15,
    PingReq = 0x16,
    PingResp = 0x17,
    Disconnect = 0x18,
}

impl TryFrom<u8> for MsgType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x04 => MsgType::Connect,
            0x05 => MsgType::ConnAck,
            0x06 => MsgType::WillTopicReq,
            0x07 => MsgType::WillTopic,
            0x08 => MsgType::WillMsgReq,
            0x09 => MsgType::WillMsg,
            0x0A => MsgType::Register,
            0x0B => MsgType::RegAck,
            0x0C => MsgType::Publish,
            0x0D => MsgType::PubAck,
            0x0E => MsgType::PubComp,
            0x0F => MsgType::PubRec,
            0x10 => MsgType::PubRel,
            0x12 => MsgType::Subscribe,
            0x13 => MsgType::SubAck,
            0x14 => MsgType::Unsubscribe,
            0x15 => MsgType::UnsubAck,
            0x16 => MsgType::PingReq,
            0x17 => MsgType::PingResp,
            0x18 => MsgType::Disconnect,
            _ => return Err(Error::MalformedPacket),
        })
    }
}

/// Gateway return codes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReturnCode {
    /// Accepted.
    Accepted = 0x00,
    /// Rejected: congestion.
    Congestion = 0x01,
    /// Rejected: invalid topic id.
    InvalidTopicId = 0x02,
    /// Rejected: not supported.
    NotSupported = 0x03,
}

impl TryFrom<u8> for ReturnCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ReturnCode::Accepted),
            0x01 => Ok(ReturnCode::Congestion),
            0x02 => Ok(ReturnCode::InvalidTopicId),
            0x03 => Ok(ReturnCode::NotSupported),
            _ => Err(Error::MalformedPacket),
        }
    }
}

/// How a topic is named on the wire.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TopicId<'a> {
    /// Full topic name. Only valid in SUBSCRIBE and UNSUBSCRIBE (and for the
    /// client API, which resolves it through the topic registry).
    Name(&'a str),
    /// Identifier assigned by the gateway through REGISTER/REGACK or SUBACK.
    Normal(u16),
    /// Identifier agreed on out of band.
    Predefined(u16),
    /// Two-character topic name.
    Short([u8; 2]),
}

impl TopicId<'_> {
    fn type_bits(&self) -> u8 {
        match self {
            TopicId::Name(_) | TopicId::Normal(_) => TOPIC_TYPE_NORMAL,
            TopicId::Predefined(_) => TOPIC_TYPE_PREDEFINED,
            TopicId::Short(_) => TOPIC_TYPE_SHORT,
        }
    }

    // the 2-byte form used by PUBLISH
    fn id_bytes(&self) -> Result<[u8; 2], Error> {
        match self {
            TopicId::Name(_) => Err(Error::MalformedPacket),
            TopicId::Normal(id) | TopicId::Predefined(id) => Ok(id.to_be_bytes()),
            TopicId::Short(name) => Ok(*name),
        }
    }

    // the form used by SUBSCRIBE and UNSUBSCRIBE
    fn request_len(&self) -> Result<usize, Error> {
        match self {
            TopicId::Name(name) => Ok(name.len()),
            TopicId::Normal(_) => Err(Error::MalformedPacket),
            TopicId::Predefined(_) | TopicId::Short(_) => Ok(2),
        }
    }

    fn put_request(&self, w: &mut Writer<'_>) -> Result<(), Error> {
        match self {
            TopicId::Name(name) => w.put_bytes(name.as_bytes()),
            other => w.put_bytes(&other.id_bytes()?),
        }
    }
}

/// Decode QoS bits from a flags byte; the value 3 ("QoS -1") is rejected.
pub fn flags_qos(flags: u8) -> Result<QoS, Error> {
    QoS::from_bits((flags & QOS_MASK) >> QOS_SHIFT)
}

fn qos_flags(qos: QoS) -> u8 {
    (qos as u8) << QOS_SHIFT
}

fn topic_type(flags: u8) -> Result<u8, Error> {
    match flags & TOPIC_TYPE_MASK {
        0x03 => Err(Error::MalformedPacket),
        bits => Ok(bits),
    }
}

/// Last will.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Will<'a> {
    /// Topic name the will is published to.
    pub topic: &'a str,
    /// Will payload.
    pub message: &'a [u8],
    /// QoS of the will publication.
    pub qos: QoS,
    /// Whether the will is retained.
    pub retained: bool,
}

/// CONNECT parameters.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Options<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Keepalive duration in seconds, zero to disable.
    pub duration: u16,
    /// Discard any previous session state on the gateway.
    pub clean_session: bool,
    /// Optional last will. The gateway asks for it with WILLTOPICREQ and
    /// WILLMSGREQ; CONNECT only carries the will flag.
    pub will: Option<Will<'a>>,
}

impl<'a> Options<'a> {
    /// 60 second keepalive, clean session, no will.
    pub fn new(client_id: &'a str) -> Self {
        Self {
            client_id,
            duration: 60,
            clean_session: true,
            will: None,
        }
    }
}

/// CONNECT as decoded from the wire. The will contents arrive separately.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Connect<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Keepalive duration in seconds.
    pub duration: u16,
    /// Clean session flag.
    pub clean_session: bool,
    /// Will flag.
    pub will: bool,
}

/// WILLTOPIC contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct WillTopic<'a> {
    /// QoS of the will publication.
    pub qos: QoS,
    /// Whether the will is retained.
    pub retained: bool,
    /// Will topic name.
    pub topic: &'a str,
}

/// REGISTER contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Register<'a> {
    /// Topic id; zero when sent by a client.
    pub topic_id: u16,
    /// Message identifier.
    pub msg_id: u16,
    /// Topic name being registered.
    pub topic_name: &'a str,
}

/// Shape shared by REGACK and PUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TopicAck {
    /// Topic id the acknowledgement refers to.
    pub topic_id: u16,
    /// Identifier of the acknowledged message.
    pub msg_id: u16,
    /// Outcome.
    pub return_code: ReturnCode,
}

/// PUBLISH contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Publish<'a> {
    /// Topic identifier. `TopicId::Name` cannot be encoded.
    pub topic: TopicId<'a>,
    /// Message with flags and message identifier.
    pub message: Message<'a>,
}

/// SUBSCRIBE contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Subscribe<'a> {
    /// Message identifier.
    pub msg_id: u16,
    /// Duplicate flag.
    pub dup: bool,
    /// Requested QoS.
    pub qos: QoS,
    /// Topic name, predefined id or short name.
    pub topic: TopicId<'a>,
}

/// SUBACK contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SubAck {
    /// Granted QoS.
    pub qos: QoS,
    /// Topic id assigned by the gateway, zero for wildcard filters.
    pub topic_id: u16,
    /// Identifier of the acknowledged SUBSCRIBE.
    pub msg_id: u16,
    /// Outcome.
    pub return_code: ReturnCode,
}

/// UNSUBSCRIBE contents.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Unsubscribe<'a> {
    /// Message identifier.
    pub msg_id: u16,
    /// Topic name, predefined id or short name.
    pub topic: TopicId<'a>,
}

/// An MQTT-SN message.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Packet<'a> {
    /// CONNECT. The will, if any, only contributes its flag.
    Connect(Options<'a>),
    /// CONNACK
    ConnAck(ReturnCode),
    /// WILLTOPICREQ
    WillTopicReq,
    /// WILLTOPIC
    WillTopic(WillTopic<'a>),
    /// WILLMSGREQ
    WillMsgReq,
    /// WILLMSG
    WillMsg(&'a [u8]),
    /// REGISTER
    Register(Register<'a>),
    /// REGACK
    RegAck(TopicAck),
    /// PUBLISH
    Publish(Publish<'a>),
    /// PUBACK
    PubAck(TopicAck),
    /// PUBREC
    PubRec(u16),
    /// PUBREL
    PubRel(u16),
    /// PUBCOMP
    PubComp(u16),
    /// SUBSCRIBE
    Subscribe(Subscribe<'a>),
    /// SUBACK
    SubAck(SubAck),
    /// UNSUBSCRIBE
    Unsubscribe(Unsubscribe<'a>),
    /// UNSUBACK
    UnsubAck(u16),
    /// PINGREQ, with the client id of a sleeping client.
    PingReq(Option<&'a str>),
    /// PINGRESP
    PingResp,
    /// DISCONNECT, with a sleep duration.
    Disconnect(Option<u16>),
}

/// Decoded CONNECT differs from the encoded form (the will arrives later), so
/// decoding yields this instead of [`Packet::Connect`] for that one type.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Decoded<'a> {
    /// A CONNECT from a client.
    Connect(Connect<'a>),
    /// Every other message.
    Packet(Packet<'a>),
}

impl<'a> Packet<'a> {
    /// Message type of this packet.
    pub fn msg_type(&self) -> MsgType {
        match self {
            Packet::Connect(_) => MsgType::Connect,
            Packet::ConnAck(_) => MsgType::ConnAck,
            Packet::WillTopicReq => MsgType::WillTopicReq,
            Packet::WillTopic(_) => MsgType::WillTopic,
            Packet::WillMsgReq => MsgType::WillMsgReq,
            Packet::WillMsg(_) => MsgType::WillMsg,
            Packet::Register(_) => MsgType::Register,
            Packet::RegAck(_) => MsgType::RegAck,
            Packet::Publish(_) => MsgType::Publish,
            Packet::PubAck(_) => MsgType::PubAck,
            Packet::PubRec(_) => MsgType::PubRec,
            Packet::PubRel(_) => MsgType::PubRel,
            Packet::PubComp(_) => MsgType::PubComp,
            Packet::Subscribe(_) => MsgType::Subscribe,
            Packet::SubAck(_) => MsgType::SubAck,
            Packet::Unsubscribe(_) => MsgType::Unsubscribe,
            Packet::UnsubAck(_) => MsgType::UnsubAck,
            Packet::PingReq(_) => MsgType::PingReq,
            Packet::PingResp => MsgType::PingResp,
            Packet::Disconnect(_) => MsgType::Disconnect,
        }
    }

    // bytes after the message type
    fn body_len(&self) -> Result<usize, Error> {
        Ok(match self {
            Packet::Connect(options) => 4 + options.client_id.len(),
            Packet::ConnAck(_) => 1,
            Packet::WillTopicReq | Packet::WillMsgReq | Packet::PingResp => 0,
            Packet::WillTopic(will) => 1 + will.topic.len(),
            Packet::WillMsg(message) => message.len(),
            Packet::Register(register) => 4 + register.topic_name.len(),
            Packet::RegAck(_) | Packet::PubAck(_) => 5,
            Packet::Publish(publish) => {
                publish.topic.id_bytes()?;
                5 + publish.message.payload.len()
            }
            Packet::PubRec(_) | Packet::PubRel(_) | Packet::PubComp(_) | Packet::UnsubAck(_) => 2,
            Packet::Subscribe(subscribe) => 3 + subscribe.topic.request_len()?,
            Packet::SubAck(_) => 6,
            Packet::Unsubscribe(unsubscribe) => 3 + unsubscribe.topic.request_len()?,
            Packet::PingReq(client_id) => client_id.map_or(0, str::len),
            Packet::Disconnect(duration) => if duration.is_some() { 2 } else { 0 },
        })
    }

    /// Total encoded size in bytes, length field included.
    pub fn encoded_len(&self) -> Result<usize, Error> {
        let body = self.body_len()?;
        let short = body + 2;
        if short <= 255 {
            Ok(short)
        } else if body + 4 <= u16::MAX as usize {
            Ok(body + 4)
        } else {
            Err(Error::MalformedPacket)
        }
    }

    /// Encode into `buf` and return the number of bytes written.
    ///
    /// Nothing is written unless the whole packet fits.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let total = self.encoded_len()?;
        if buf.len() < total {
            return Err(Error::BufferTooSmall);
        }

        let mut w = Writer::new(buf);
        if total > 255 {
            w.put_u8(LONG_LENGTH)?;
            w.put_u16(total as u16)?;
        } else {
            w.put_u8(total as u8)?;
        }
        w.put_u8(self.msg_type() as u8)?;

        match self {
            Packet::Connect(options) => {
                let mut flags = 0;
                if options.will.is_some() {
                    flags |= WILL_FLAG;
                }
                if options.clean_session {
                    flags |= CLEAN_SESSION_FLAG;
                }
                w.put_u8(flags)?;
                w.put_u8(PROTOCOL_ID)?;
                w.put_u16(options.duration)?;
                w.put_bytes(options.client_id.as_bytes())?;
            }
            Packet::ConnAck(rc) => w.put_u8(*rc as u8)?,
            Packet::WillTopicReq | Packet::WillMsgReq | Packet::PingResp => {}
            Packet::WillTopic(will) => {
                let mut flags = qos_flags(will.qos);
                if will.retained {
                    flags |= RETAIN_FLAG;
                }
                w.put_u8(flags)?;
                w.put_bytes(will.topic.as_bytes())?;
            }
            Packet::WillMsg(message) => w.put_bytes(message)?,
            Packet::Register(register) => {
                w.put_u16(register.topic_id)?;
                w.put_u16(register.msg_id)?;
                w.put_bytes(register.topic_name.as_bytes())?;
            }
            Packet::RegAck(ack) | Packet::PubAck(ack) => {
                w.put_u16(ack.topic_id)?;
                w.put_u16(ack.msg_id)?;
                w.put_u8(ack.return_code as u8)?;
            }
            Packet::Publish(publish) => {
                let message = &publish.message;
                let mut flags = qos_flags(message.qos) | publish.topic.type_bits();
                if message.dup {
                    flags |= DUP_FLAG;
                }
                if message.retained {
                    flags |= RETAIN_FLAG;
                }
                w.put_u8(flags)?;
                w.put_bytes(&publish.topic.id_bytes()?)?;
                w.put_u16(message.id)?;
                w.put_bytes(message.payload)?;
            }
            Packet::PubRec(id) | Packet::PubRel(id) | Packet::PubComp(id) | Packet::UnsubAck(id) => {
                w.put_u16(*id)?;
            }
            Packet::Subscribe(subscribe) => {
                let mut flags = qos_flags(subscribe.qos) | subscribe.topic.type_bits();
                if subscribe.dup {
                    flags |= DUP_FLAG;
                }
                w.put_u8(flags)?;
                w.put_u16(subscribe.msg_id)?;
                subscribe.topic.put_request(&mut w)?;
            }
            Packet::SubAck(ack) => {
                w.put_u8(qos_flags(ack.qos))?;
                w.put_u16(ack.topic_id)?;
                w.put_u16(ack.msg_id)?;
                w.put_u8(ack.return_code as u8)?;
            }
            Packet::Unsubscribe(unsubscribe) => {
                w.put_u8(unsubscribe.topic.type_bits())?;
                w.put_u16(unsubscribe.msg_id)?;
                unsubscribe.topic.put_request(&mut w)?;
            }
            Packet::PingReq(client_id) => {
                if let Some(client_id) = client_id {
                    w.put_bytes(client_id.as_bytes())?;
                }
            }
            Packet::Disconnect(duration) => {
                if let Some(duration) = duration {
                    w.put_u16(*duration)?;
                }
            }
        }
        Ok(w.finish())
    }

    /// Decode the frame at the start of `buf`.
    ///
    /// Fails with `TruncatedInput` when `buf` ends before the declared
    /// length.
    pub fn deserialize(buf: &'a [u8]) -> Result<(Decoded<'a>, usize), Error> {
        let total = frame_len(buf)?;
        let frame = buf.get(..total).ok_or(Error::TruncatedInput)?;
        let header = if frame[0] == LONG_LENGTH { 3 } else { 1 };
        let (msg_type, _) = wire::read_u8(frame, header)?;
        let body = frame.get(header + 1..).ok_or(Error::MalformedPacket)?;
        let decoded = decode_body(MsgType::try_from(msg_type)?, body).map_err(|e| match e {
            Error::TruncatedInput => Error::MalformedPacket,
            other => other,
        })?;
        Ok((decoded, total))
    }
}

/// Length of the frame starting at `buf[0]`, length field included.
pub fn frame_len(buf: &[u8]) -> Result<usize, Error> {
    let (first, _) = wire::read_u8(buf, 0)?;
    if first == LONG_LENGTH {
        let (total, _) = wire::read_u16(buf, 1)?;
        if total < 4 {
            return Err(Error::MalformedPacket);
        }
        Ok(total as usize)
    } else if first < 2 {
        Err(Error::MalformedPacket)
    } else {
        Ok(first as usize)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    core::str::from_utf8(bytes).map_err(|_| Error::MalformedPacket)
}

fn exact(body: &[u8], len: usize) -> Result<(), Error> {
    if body.len() == len {
        Ok(())
    } else {
        Err(Error::MalformedPacket)
    }
}

fn decode_topic_ack(body: &[u8]) -> Result<TopicAck, Error> {
    exact(body, 5)?;
    let (topic_id, _) = wire::read_u16(body, 0)?;
    let (msg_id, _) = wire::read_u16(body, 2)?;
    let (rc, _) = wire::read_u8(body, 4)?;
    Ok(TopicAck {
        topic_id,
        msg_id,
        return_code: ReturnCode::try_from(rc)?,
    })
}

fn decode_msg_id(body: &[u8]) -> Result<u16, Error> {
    exact(body, 2)?;
    Ok(wire::read_u16(body, 0)?.0)
}

fn decode_request_topic(flags: u8, rest: &[u8]) -> Result<TopicId<'_>, Error> {
    match topic_type(flags)? {
        TOPIC_TYPE_NORMAL => Ok(TopicId::Name(utf8(rest)?)),
        TOPIC_TYPE_PREDEFINED => {
            exact(rest, 2)?;
            Ok(TopicId::Predefined(wire::read_u16(rest, 0)?.0))
        }
        _ => {
            exact(rest, 2)?;
            Ok(TopicId::Short([rest[0], rest[1]]))
        }
    }
}

fn decode_body(msg_type: MsgType, body: &[u8]) -> Result<Decoded<'_>, Error> {
    let packet = match msg_type {
        MsgType::Connect => {
            let (flags, _) = wire::read_u8(body, 0)?;
            let (protocol_id, _) = wire::read_u8(body, 1)?;
            if protocol_id != PROTOCOL_ID {
                return Err(Error::ProtocolMismatch);
            }
            let (duration, _) = wire::read_u16(body, 2)?;
            return Ok(Decoded::Connect(Connect {
                client_id: utf8(&body[4..])?,
                duration,
                clean_session: flags & CLEAN_SESSION_FLAG != 0,
                will: flags & WILL_FLAG != 0,
            }));
        }
        MsgType::ConnAck => {
            exact(body, 1)?;
            Packet::ConnAck(ReturnCode::try_from(body[0])?)
        }
        MsgType::WillTopicReq => {
            exact(body, 0)?;
            Packet::WillTopicReq
        }
        MsgType::WillTopic => {
            let (flags, _) = wire::read_u8(body, 0)?;
            Packet::WillTopic(WillTopic {
                qos: flags_qos(flags)?,
                retained: flags & RETAIN_FLAG != 0,
                topic: utf8(&body[1..])?,
            })
        }
        MsgType::WillMsgReq => {
            exact(body, 0)?;
            Packet::WillMsgReq
        }
        MsgType::WillMsg => Packet::WillMsg(body),
        MsgType::Register => {
            let (topic_id, _) = wire::read_u16(body, 0)?;
            let (msg_id, _) = wire::read_u16(body, 2)?;
            Packet::Register(Register {
                topic_id,
                msg_id,
                topic_name: utf8(&body[4..])?,
            })
        }
        MsgType::RegAck => Packet::RegAck(decode_topic_ack(body)?),
        MsgType::Publish => {
            let (flags, _) = wire::read_u8(body, 0)?;
            let qos = flags_qos(flags)?;
            let (raw, _) = wire::read_u16(body, 1)?;
            let topic = match topic_type(flags)? {
                TOPIC_TYPE_NORMAL => TopicId::Normal(raw),
                TOPIC_TYPE_PREDEFINED => TopicId::Predefined(raw),
                _ => TopicId::Short(raw.to_be_bytes()),
            };
            let (id, _) = wire::read_u16(body, 3)?;
            Packet::Publish(Publish {
                topic,
                message: Message {
                    qos,
                    retained: flags & RETAIN_FLAG != 0,
                    dup: flags & DUP_FLAG != 0,
                    id,
                    payload: &body[5..],
                },
            })
        }
        MsgType::PubAck => Packet::PubAck(decode_topic_ack(body)?),
        MsgType::PubRec => Packet::PubRec(decode_msg_id(body)?),
        MsgType::PubRel => Packet::PubRel(decode_msg_id(body)?),
        MsgType::PubComp => Packet::PubComp(decode_msg_id(body)?),
        MsgType::Subscribe => {
            let (flags, _) = wire::read_u8(body, 0)?;
            let (msg_id, _) = wire::read_u16(body, 1)?;
            Packet::Subscribe(Subscribe {
                msg_id,
                dup: flags & DUP_FLAG != 0,
                qos: flags_qos(flags)?,
                topic: decode_request_topic(flags, &body[3..])?,
            })
        }
        MsgType::SubAck => {
            exact(body, 6)?;
            let (flags, _) = wire::read_u8(body, 0)?;
            let (topic_id, _) = wire::read_u16(body, 1)?;
            let (msg_id, _) = wire::read_u16(body, 3)?;
            let (rc, _) = wire::read_u8(body, 5)?;
            Packet::SubAck(SubAck {
                qos: flags_qos(flags)?,
                topic_id,
                msg_id,
                return_code: ReturnCode::try_from(rc)?,
            })
        }
        MsgType::Unsubscribe => {
            let (flags, _) = wire::read_u8(body, 0)?;
            let (msg_id, _) = wire::read_u16(body, 1)?;
            Packet::Unsubscribe(Unsubscribe {
                msg_id,
                topic: decode_request_topic(flags, &body[3..])?,
            })
        }
        MsgType::UnsubAck => Packet::UnsubAck(decode_msg_id(body)?),
        MsgType::PingReq => {
            if body.is_empty() {
                Packet::PingReq(None)
            } else {
                Packet::PingReq(Some(utf8(body)?))
            }
        }
        MsgType::PingResp => {
            exact(body, 0)?;
            Packet::PingResp
        }
        MsgType::Disconnect => match body.len() {
            0 => Packet::Disconnect(None),
            2 => Packet::Disconnect(Some(wire::read_u16(body, 0)?.0)),
            _ => return Err(Error::MalformedPacket),
        },
    };
    Ok(Decoded::Packet(packet))
}

/// Set the DUP flag on a stored PUBLISH or SUBSCRIBE before it is
/// retransmitted.
pub fn mark_dup(packet: &mut [u8]) {
    let header = match packet.first() {
        Some(&LONG_LENGTH) => 3,
        Some(_) => 1,
        None => return,
    };
    let is_flagged = matches!(
        packet.get(header).copied().map(MsgType::try_from),
        Some(Ok(MsgType::Publish)) | Some(Ok(MsgType::Subscribe))
    );
    if is_flagged {
        if let Some(flags) = packet.get_mut(header + 1) {
            *flags |= DUP_FLAG;
        }
    }
}
