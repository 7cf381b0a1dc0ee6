//! Message model shared by both protocols.

use super::Error;

/// Quality of Service levels for published messages.
///
/// QoS defines the guarantee of delivery for a specific message. Higher QoS
/// levels provide stronger delivery guarantees but require more round trips
/// and more client state.
///
/// # Examples
///
/// ```rust
/// use libmqtt::network::application::pubsub::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::try_from(2), Ok(QoS::ExactlyOnce));
/// assert!(QoS::try_from(3).is_err());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    /// **QoS 0**: at most once. Fire and forget, no acknowledgement.
    AtMostOnce = 0,
    /// **QoS 1**: at least once. Acknowledged by PUBACK; duplicates can occur.
    AtLeastOnce = 1,
    /// **QoS 2**: exactly once. Four-step PUBLISH/PUBREC/PUBREL/PUBCOMP handshake.
    ExactlyOnce = 2,
}

impl QoS {
    /// Decode the two QoS bits. The value 3 is malformed.
    pub fn from_bits(bits: u8) -> Result<Self, Error> {
        match bits {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(Error::MalformedPacket),
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        QoS::from_bits(value)
    }
}

/// An application message.
///
/// The payload is a borrowed view; the codec never keeps it past the call that
/// received it. `id` is only meaningful for QoS 1 and 2, the client fills it in
/// when publishing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Message<'a> {
    /// Delivery guarantee.
    pub qos: QoS,
    /// Whether the server should keep this as the topic's retained message.
    pub retained: bool,
    /// Set on retransmissions.
    pub dup: bool,
    /// Packet identifier, zero for QoS 0.
    pub id: u16,
    /// Raw payload bytes.
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    /// A fresh, non-retained message.
    pub fn new(payload: &'a [u8], qos: QoS) -> Self {
        Self {
            qos,
            retained: false,
            dup: false,
            id: 0,
            payload,
        }
    }

    /// The same message with the retain flag set.
    pub fn retained(mut self) -> Self {
        self.retained = true;
        self
    }
}

/// Outcome of one topic filter in a SUBACK.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubAckResult {
    /// Subscription accepted with this maximum QoS.
    Granted(QoS),
    /// Subscription refused (`0x80`).
    Rejected,
}

impl SubAckResult {
    /// Wire value of the result.
    pub fn code(&self) -> u8 {
        match self {
            SubAckResult::Granted(qos) => *qos as u8,
            SubAckResult::Rejected => 0x80,
        }
    }

    /// Decode a SUBACK return code. Anything outside `{0, 1, 2, 0x80}` is
    /// malformed.
    pub fn from_code(code: u8) -> Result<Self, Error> {
        match code {
            0x80 => Ok(SubAckResult::Rejected),
            other => QoS::from_bits(other).map(SubAckResult::Granted),
        }
    }

    /// Whether the subscription was accepted.
    pub fn is_granted(&self) -> bool {
        matches!(self, SubAckResult::Granted(_))
    }
}
