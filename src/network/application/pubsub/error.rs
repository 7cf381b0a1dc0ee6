//! Error taxonomy for the codecs and sessions.

/// Errors returned by the packet codecs and the protocol clients.
///
/// Decode-time errors (`MalformedPacket`, `TruncatedInput`, `MalformedLength`)
/// never corrupt session state: the client discards the offending bytes and
/// keeps reading. Only `TransportError` and `KeepaliveTimeout` tear the
/// session down.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// The bytes do not form a valid packet.
    MalformedPacket,
    /// The buffer ends before the field or frame it declares.
    TruncatedInput,
    /// A variable remaining length carried more than four bytes.
    MalformedLength,
    /// The caller-supplied buffer cannot hold the encoded packet.
    BufferTooSmall,
    /// CONNECT with an unsupported protocol name/version combination.
    ProtocolMismatch,
    /// An in-flight exchange used up its retransmission budget.
    DeliveryTimeout,
    /// No ping response arrived in time; the session was torn down.
    KeepaliveTimeout,
    /// A blocking request (CONNECT) got no answer within the command timeout.
    CommandTimeout,
    /// The transport failed; the session was torn down.
    TransportError,
    /// The in-flight table is full.
    TooManyInFlight,
    /// The topic registry is full.
    TooManyTopics,
    /// The handler table is full.
    TooManyHandlers,
    /// The gateway rejected a topic registration with this return code.
    RegistrationRejected(u8),
    /// The gateway rejected a publish with this return code.
    PublishRejected(u8),
    /// The server refused the connection with this return code.
    ConnectionRefused(u8),
    /// The operation needs an established session.
    NotConnected,
    /// `connect` was called on an established session.
    AlreadyConnected,
    /// A topic id was used before it was registered.
    TopicNotRegistered,
    /// The configuration has a zero interval or attempt count, or is not
    /// valid JSON.
    InvalidConfig,
}

impl Error {
    /// Whether the error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::TransportError | Error::KeepaliveTimeout)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::MalformedPacket => write!(f, "malformed packet"),
            Error::TruncatedInput => write!(f, "truncated input"),
            Error::MalformedLength => write!(f, "malformed remaining length"),
            Error::BufferTooSmall => write!(f, "buffer too small"),
            Error::ProtocolMismatch => write!(f, "unsupported protocol name or version"),
            Error::DeliveryTimeout => write!(f, "delivery timed out"),
            Error::KeepaliveTimeout => write!(f, "keepalive timed out"),
            Error::CommandTimeout => write!(f, "command timed out"),
            Error::TransportError => write!(f, "transport error"),
            Error::TooManyInFlight => write!(f, "too many in-flight exchanges"),
            Error::TooManyTopics => write!(f, "too many registered topics"),
            Error::TooManyHandlers => write!(f, "too many message handlers"),
            Error::RegistrationRejected(rc) => write!(f, "registration rejected: {}", rc),
            Error::PublishRejected(rc) => write!(f, "publish rejected: {}", rc),
            Error::ConnectionRefused(rc) => write!(f, "connection refused: {}", rc),
            Error::NotConnected => write!(f, "not connected"),
            Error::AlreadyConnected => write!(f, "already connected"),
            Error::TopicNotRegistered => write!(f, "topic not registered"),
            Error::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}

impl core::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::MalformedPacket => defmt::write!(f, "MalformedPacket"),
            Error::TruncatedInput => defmt::write!(f, "TruncatedInput"),
            Error::MalformedLength => defmt::write!(f, "MalformedLength"),
            Error::BufferTooSmall => defmt::write!(f, "BufferTooSmall"),
            Error::ProtocolMismatch => defmt::write!(f, "ProtocolMismatch"),
            Error::DeliveryTimeout => defmt::write!(f, "DeliveryTimeout"),
            Error::KeepaliveTimeout => defmt::write!(f, "KeepaliveTimeout"),
            Error::CommandTimeout => defmt::write!(f, "CommandTimeout"),
            Error::TransportError => defmt::write!(f, "TransportError"),
            Error::TooManyInFlight => defmt::write!(f, "TooManyInFlight"),
            Error::TooManyTopics => defmt::write!(f, "TooManyTopics"),
            Error::TooManyHandlers => defmt::write!(f, "TooManyHandlers"),
            Error::RegistrationRejected(rc) => defmt::write!(f, "RegistrationRejected({})", rc),
            Error::PublishRejected(rc) => defmt::write!(f, "PublishRejected({})", rc),
            Error::ConnectionRefused(rc) => defmt::write!(f, "ConnectionRefused({})", rc),
            Error::NotConnected => defmt::write!(f, "NotConnected"),
            Error::AlreadyConnected => defmt::write!(f, "AlreadyConnected"),
            Error::TopicNotRegistered => defmt::write!(f, "TopicNotRegistered"),
            Error::InvalidConfig => defmt::write!(f, "InvalidConfig"),
        }
    }
}
