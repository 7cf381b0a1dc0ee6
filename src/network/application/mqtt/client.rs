//! MQTT 3.1.1 client session.
//!
//! The [`Client`] drives one session over any [`Connection`]: it performs the
//! CONNECT handshake, tracks QoS 1 and QoS 2 exchanges in both directions,
//! dispatches inbound publications to topic handlers and keeps the link alive.
//! Nothing runs in the background; the application calls [`Client::poll`]
//! regularly.
//!
//! # Examples
//!
//! ```rust,no_run
//! use libmqtt::network::application::mqtt::{Client, MessageData, Options, Message, QoS};
//! use libmqtt::network::application::pubsub::Config;
//! # use libmqtt::network::{Close, Connection, Read, Timer, Write};
//! # struct Tcp;
//! # impl Connection for Tcp {}
//! # impl Read for Tcp {
//! #     type Error = ();
//! #     fn read(&mut self, _buf: &mut [u8], _timeout_ms: u32) -> Result<usize, ()> { Ok(0) }
//! # }
//! # impl Write for Tcp {
//! #     type Error = ();
//! #     fn write(&mut self, buf: &[u8], _timeout_ms: u32) -> Result<usize, ()> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # impl Close for Tcp {
//! #     type Error = ();
//! #     fn close(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # #[derive(Clone)]
//! # struct Clock;
//! # impl Timer for Clock {
//! #     fn start(&mut self, _duration_ms: u32) {}
//! #     fn expired(&self) -> bool { false }
//! #     fn remaining(&self) -> u32 { 1000 }
//! # }
//!
//! fn on_command(data: &MessageData<'_>) {
//!     let _ = (data.topic, data.message.payload);
//! }
//!
//! let mut client: Client<_, _> = Client::new(Tcp, Clock, Config::default()).unwrap();
//! client.connect(&Options::new("sensor-42")).unwrap();
//! client.subscribe("commands/#", QoS::AtLeastOnce, on_command).unwrap();
//! client.publish("status", &Message::new(b"online", QoS::AtLeastOnce)).unwrap();
//! loop {
//!     client.poll(100).unwrap();
//! }
//! ```

use heapless::{String, Vec};

use super::packet::{self, Ack, ConnAckResult, Options, Packet, Publish, Subscribe, Unsubscribe};
use super::topic;
use crate::network::application::pubsub::session::{Frame, split_frame};
use crate::network::application::pubsub::{
    Config, Error, Event, Exchange, ExchangeKind, HandlerTable, MAX_TOPIC_LEN, Message, QoS,
    Session, Stage, State,
};
use crate::network::{Connect, Connection, Timer};

const PINGREQ: [u8; 2] = [0xC0, 0x00];

/// An inbound publication as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct MessageData<'a> {
    /// Topic name the message was published to.
    pub topic: &'a str,
    /// The message itself.
    pub message: Message<'a>,
}

/// Callback invoked for every delivered publication.
pub type MessageHandler = fn(&MessageData<'_>);

type TopicKey = String<MAX_TOPIC_LEN>;

/// An MQTT 3.1.1 client session.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`]
/// * `T` - The timer type implementing [`Timer`]
/// * `B` - Size of the transmit and receive buffers, and the largest packet
///   the client can send or receive
/// * `F` - Maximum number of in-flight exchanges
/// * `H` - Maximum number of topic handlers
pub struct Client<C, T, const B: usize = 256, const F: usize = 4, const H: usize = 5> {
    session: Session<C, T, B, F>,
    handlers: HandlerTable<TopicKey, MessageHandler, H>,
    unsubscribing: Vec<(u16, TopicKey), F>,
    connack: Option<ConnAckResult>,
}

impl<C, T, const B: usize, const F: usize, const H: usize> core::fmt::Debug for Client<C, T, B, F, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<C: Connection, T: Timer, const B: usize, const F: usize, const H: usize> Client<C, T, B, F, H> {
    /// Wrap an open transport. No bytes are sent until [`connect`](Self::connect).
    pub fn new(connection: C, timer: T, config: Config) -> Result<Self, Error> {
        Ok(Self {
            session: Session::new(connection, timer, config)?,
            handlers: HandlerTable::new(),
            unsubscribing: Vec::new(),
            connack: None,
        })
    }

    /// Open a transport to `host:port` through `network`, then wrap it.
    pub fn open<N>(network: &mut N, host: &str, port: u16, timer: T, config: Config) -> Result<Self, Error>
    where
        N: Connect<Connection = C>,
    {
        let connection = network
            .connect(host, port)
            .map_err(|_| Error::TransportError)?;
        info!("transport open to {}:{}", host, port);
        Self::new(connection, timer, config)
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.session.state()
    }

    /// Whether the session is established.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Session configuration.
    pub fn config(&self) -> &Config {
        self.session.config()
    }

    /// Number of outbound exchanges waiting for an acknowledgement.
    pub fn in_flight(&self) -> usize {
        self.session.inflight.len()
    }

    /// Oldest unread completion event.
    pub fn next_event(&mut self) -> Option<Event> {
        self.session.next_event()
    }

    /// Replace the transport of a disconnected client, typically with a new
    /// link to the broker after a failed or lost session closed the old one.
    ///
    /// Fails with [`Error::AlreadyConnected`] while a session is up.
    pub fn set_connection(&mut self, connection: C) -> Result<(), Error> {
        self.session.replace_connection(connection)
    }

    /// Install or clear the handler for publications no topic handler matches.
    pub fn set_default_handler(&mut self, handler: Option<MessageHandler>) {
        self.handlers.set_default(handler);
    }

    /// Route publications matching `filter` to `handler` without sending
    /// SUBSCRIBE, e.g. for subscriptions kept by the broker from an earlier
    /// session. `None` removes the handler bound to `filter`.
    ///
    /// # Errors
    ///
    /// * [`Error::MalformedPacket`] - `filter` is not a valid topic filter
    /// * [`Error::TooManyHandlers`] - The handler table is full
    pub fn set_message_handler(&mut self, filter: &str, handler: Option<MessageHandler>) -> Result<(), Error> {
        topic::validate_filter(filter)?;
        let key = TopicKey::try_from(filter).map_err(|_| Error::BufferTooSmall)?;
        match handler {
            Some(handler) => self.handlers.insert(key, handler, None),
            None => {
                self.handlers.remove(&key);
                Ok(())
            }
        }
    }

    /// Send CONNECT and wait for CONNACK.
    ///
    /// Blocks, reading from the transport, for at most the configured command
    /// timeout.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyConnected`] - A session is already established
    /// * [`Error::ConnectionRefused`] - The server answered with a non-zero
    ///   return code
    /// * [`Error::CommandTimeout`] - No CONNACK arrived in time. The transport
    ///   is closed; see [`set_connection`](Self::set_connection)
    /// * [`Error::TransportError`] - The transport failed
    /// * [`Error::MalformedPacket`] - The options cannot be encoded, e.g. a
    ///   password without a user name
    pub fn connect(&mut self, options: &Options<'_>) -> Result<ConnAckResult, Error> {
        if self.session.state() != State::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        let len = Packet::Connect(*options).serialize(&mut self.session.tx)?;
        self.connack = None;
        self.session.set_state(State::Connecting);
        info!("connecting as {}", options.client_id);
        self.session.send(len)?;

        let timer = self.session.deadline(self.session.config.command_timeout_ms);
        loop {
            if timer.expired() {
                warn!("no CONNACK within {} ms", self.session.config.command_timeout_ms);
                self.session.teardown(Error::CommandTimeout);
                return Err(Error::CommandTimeout);
            }
            self.session.receive(timer.remaining())?;
            self.process_frames()?;
            if let Some(result) = self.connack.take() {
                if result.return_code != 0 {
                    self.session.teardown(Error::ConnectionRefused(result.return_code));
                    return Err(Error::ConnectionRefused(result.return_code));
                }
                self.session
                    .establish(u32::from(options.keep_alive_seconds) * 1000);
                return Ok(result);
            }
        }
    }

    /// Publish `message` to `topic`.
    ///
    /// QoS 0 messages are sent and forgotten and return 0. QoS 1 and 2
    /// messages get a fresh packet identifier, which is returned; completion
    /// is reported through [`Event::Published`].
    pub fn publish(&mut self, topic: &str, message: &Message<'_>) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        let mut message = *message;
        message.dup = false;
        message.id = 0;
        if message.qos != QoS::AtMostOnce {
            if self.session.inflight.is_full(&self.session.config) {
                return Err(Error::TooManyInFlight);
            }
            message.id = self.session.ids.next_id();
        }

        let len = Packet::Publish(Publish { topic, message }).serialize(&mut self.session.tx)?;
        debug!("publish {} to {} ({} bytes)", message.id, topic, message.payload.len());
        self.session.send(len)?;
        if message.qos != QoS::AtMostOnce {
            let timer = self.session.retry_timer();
            self.session.inflight.insert(
                message.id,
                ExchangeKind::Publish(message.qos),
                &self.session.tx[..len],
                timer,
                &self.session.config,
            )?;
        }
        Ok(message.id)
    }

    /// Subscribe to `filter` and route matching publications to `handler`.
    ///
    /// The handler is installed right away and removed again if the server
    /// rejects the subscription or never answers. Returns the SUBSCRIBE packet
    /// identifier; the outcome is reported through [`Event::Subscribed`].
    pub fn subscribe(&mut self, filter: &str, qos: QoS, handler: MessageHandler) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        topic::validate_filter(filter)?;
        if self.session.inflight.is_full(&self.session.config) {
            return Err(Error::TooManyInFlight);
        }
        let key = TopicKey::try_from(filter).map_err(|_| Error::BufferTooSmall)?;
        let packet_id = self.session.ids.next_id();

        let mut filters = Vec::new();
        filters
            .push((filter, qos))
            .map_err(|_| Error::BufferTooSmall)?;
        let len = Packet::Subscribe(Subscribe {
            packet_id,
            dup: false,
            filters,
        })
        .serialize(&mut self.session.tx)?;

        self.handlers.insert(key, handler, Some(packet_id))?;
        debug!("subscribe {} to {}", packet_id, filter);
        if let Err(e) = self.session.send(len) {
            self.handlers.remove_pending(packet_id);
            return Err(e);
        }
        let timer = self.session.retry_timer();
        self.session.inflight.insert(
            packet_id,
            ExchangeKind::Subscribe,
            &self.session.tx[..len],
            timer,
            &self.session.config,
        )?;
        Ok(packet_id)
    }

    /// Unsubscribe from `filter`. Its handler is removed when UNSUBACK
    /// arrives; completion is reported through [`Event::Unsubscribed`].
    pub fn unsubscribe(&mut self, filter: &str) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        topic::validate_filter(filter)?;
        if self.session.inflight.is_full(&self.session.config) {
            return Err(Error::TooManyInFlight);
        }
        let key = TopicKey::try_from(filter).map_err(|_| Error::BufferTooSmall)?;
        let packet_id = self.session.ids.next_id();

        let mut filters = Vec::new();
        filters.push(filter).map_err(|_| Error::BufferTooSmall)?;
        let len = Packet::Unsubscribe(Unsubscribe {
            packet_id,
            dup: false,
            filters,
        })
        .serialize(&mut self.session.tx)?;

        self.unsubscribing
            .push((packet_id, key))
            .map_err(|_| Error::TooManyInFlight)?;
        debug!("unsubscribe {} from {}", packet_id, filter);
        if let Err(e) = self.session.send(len) {
            self.unsubscribing.retain(|(id, _)| *id != packet_id);
            return Err(e);
        }
        let timer = self.session.retry_timer();
        self.session.inflight.insert(
            packet_id,
            ExchangeKind::Unsubscribe,
            &self.session.tx[..len],
            timer,
            &self.session.config,
        )?;
        Ok(packet_id)
    }

    /// Run one round of the session.
    ///
    /// Sends a ping if the link was idle for the keepalive interval,
    /// retransmits overdue exchanges, reads once from the transport waiting at
    /// most `timeout_ms`, and dispatches every complete packet received.
    ///
    /// # Errors
    ///
    /// * [`Error::DeliveryTimeout`] - An exchange ran out of attempts and was
    ///   dropped; the session stays up
    /// * [`Error::KeepaliveTimeout`] - The server stopped answering pings; the
    ///   session was torn down
    /// * [`Error::TransportError`] - The transport failed; the session was
    ///   torn down
    pub fn poll(&mut self, timeout_ms: u32) -> Result<(), Error> {
        self.session.ensure_connected()?;
        self.session.keepalive(&PINGREQ)?;
        if let Some(exchange) = self.session.retry(packet::mark_dup)? {
            self.abandon(&exchange);
            return Err(Error::DeliveryTimeout);
        }
        self.session.receive(timeout_ms)?;
        self.process_frames()
    }

    /// Send DISCONNECT and close the transport. Unfinished exchanges are
    /// dropped.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        if self.session.is_connected() {
            self.session.set_state(State::Disconnecting);
            result = Packet::Disconnect
                .serialize(&mut self.session.tx)
                .and_then(|len| self.session.send(len));
        }
        self.session.close();
        self.unsubscribing.clear();
        result
    }

    fn abandon(&mut self, exchange: &Exchange<T, B>) {
        match exchange.kind {
            ExchangeKind::Subscribe => {
                self.handlers.remove_pending(exchange.packet_id);
            }
            ExchangeKind::Unsubscribe => {
                self.unsubscribing.retain(|(id, _)| *id != exchange.packet_id);
            }
            _ => {}
        }
    }

    fn process_frames(&mut self) -> Result<(), Error> {
        let rx = self.session.take_rx();
        let mut offset = 0;
        let mut result = Ok(());
        while self.connack.is_none() {
            match split_frame(&rx[offset..], packet::frame_len, B) {
                Frame::Complete(len) => {
                    let frame = &rx[offset..offset + len];
                    offset += len;
                    if let Err(e) = self.handle_frame(frame) {
                        if e.is_fatal() {
                            result = Err(e);
                            break;
                        }
                        warn!("dropped packet: {}", e);
                    }
                }
                Frame::Incomplete => break,
                Frame::Discard(len) => {
                    warn!("discarding {} unparseable bytes", len);
                    offset += len;
                    if offset >= rx.len() {
                        break;
                    }
                }
            }
        }
        self.session.restore_rx(rx, offset);
        result
    }

    fn send_packet(&mut self, packet: &Packet<'_>) -> Result<usize, Error> {
        let len = packet.serialize(&mut self.session.tx)?;
        self.session.send(len)?;
        Ok(len)
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<(), Error> {
        let (packet, _) = Packet::deserialize(frame)?;
        trace!("rx {:?}", packet.packet_type());
        match packet {
            Packet::ConnAck(result) => {
                if self.session.state() == State::Connecting {
                    self.connack = Some(result);
                } else {
                    warn!("unexpected CONNACK");
                }
            }
            Packet::Publish(publish) => self.on_publish(frame, &publish)?,
            Packet::PubAck(ack) => {
                self.complete_publish(ack.packet_id, QoS::AtLeastOnce, Stage::Sent);
            }
            Packet::PubRec(ack) => self.on_pubrec(ack)?,
            Packet::PubRel(ack) => self.on_pubrel(ack)?,
            Packet::PubComp(ack) => {
                self.complete_publish(ack.packet_id, QoS::ExactlyOnce, Stage::AwaitingComplete);
            }
            Packet::SubAck(suback) => {
                let Some(exchange) = self.session.inflight.remove(suback.packet_id) else {
                    warn!("SUBACK for unknown packet {}", suback.packet_id);
                    return Ok(());
                };
                if exchange.kind != ExchangeKind::Subscribe {
                    warn!("SUBACK for packet {} which is not a subscription", suback.packet_id);
                    return Ok(());
                }
                let Some(&result) = suback.results.first() else {
                    return Err(Error::MalformedPacket);
                };
                if result.is_granted() {
                    self.handlers.confirm(suback.packet_id);
                } else {
                    warn!("subscription {} rejected", suback.packet_id);
                    self.handlers.remove_pending(suback.packet_id);
                }
                self.session.push_event(Event::Subscribed {
                    packet_id: suback.packet_id,
                    result,
                    topic_id: None,
                });
            }
            Packet::UnsubAck(ack) => {
                if self.session.inflight.remove(ack.packet_id).is_none() {
                    warn!("UNSUBACK for unknown packet {}", ack.packet_id);
                    return Ok(());
                }
                if let Some(index) = self.unsubscribing.iter().position(|(id, _)| *id == ack.packet_id) {
                    let (_, key) = self.unsubscribing.swap_remove(index);
                    self.handlers.remove(&key);
                }
                self.session.push_event(Event::Unsubscribed {
                    packet_id: ack.packet_id,
                });
            }
            Packet::PingResp => self.session.pong(),
            Packet::Connect(_)
            | Packet::Subscribe(_)
            | Packet::Unsubscribe(_)
            | Packet::PingReq
            | Packet::Disconnect => {
                warn!("ignoring server-bound packet {:?}", packet.packet_type());
            }
        }
        Ok(())
    }

    fn complete_publish(&mut self, packet_id: u16, qos: QoS, stage: Stage) {
        let matches = self
            .session
            .inflight
            .find_mut(packet_id)
            .is_some_and(|e| e.kind == ExchangeKind::Publish(qos) && e.stage == stage);
        if matches {
            self.session.inflight.remove(packet_id);
            debug!("publish {} complete", packet_id);
            self.session.push_event(Event::Published { packet_id });
        } else {
            warn!("acknowledgement for unknown packet {}", packet_id);
        }
    }

    fn on_pubrec(&mut self, ack: Ack) -> Result<(), Error> {
        let len = self.send_packet(&Packet::PubRel(Ack::new(ack.packet_id)))?;
        let retry_interval_ms = self.session.config.retry_interval_ms;
        if let Some(exchange) = self.session.inflight.find_mut(ack.packet_id) {
            if exchange.kind == ExchangeKind::Publish(QoS::ExactlyOnce) && exchange.stage == Stage::Sent {
                exchange.advance(Stage::AwaitingComplete, &self.session.tx[..len], retry_interval_ms)?;
            }
        }
        Ok(())
    }

    fn on_publish(&mut self, frame: &[u8], publish: &Publish<'_>) -> Result<(), Error> {
        let id = publish.message.id;
        match publish.message.qos {
            QoS::AtMostOnce => self.deliver(publish),
            QoS::AtLeastOnce => {
                self.deliver(publish);
                self.send_packet(&Packet::PubAck(Ack::new(id)))?;
            }
            QoS::ExactlyOnce => {
                if self.session.awaiting_release.contains(id) {
                    debug!("duplicate QoS 2 publish {}", id);
                } else {
                    self.session.awaiting_release.insert(id, frame)?;
                }
                self.send_packet(&Packet::PubRec(Ack::new(id)))?;
            }
        }
        Ok(())
    }

    fn on_pubrel(&mut self, ack: Ack) -> Result<(), Error> {
        if let Some(stored) = self.session.awaiting_release.take(ack.packet_id) {
            if let Ok((Packet::Publish(publish), _)) = Packet::deserialize(&stored) {
                self.deliver(&publish);
            }
        } else {
            debug!("PUBREL for unknown packet {}", ack.packet_id);
        }
        self.send_packet(&Packet::PubComp(Ack::new(ack.packet_id)))?;
        Ok(())
    }

    fn handler_for(&self, topic_name: &str) -> Option<MessageHandler> {
        let exact = self
            .handlers
            .iter()
            .find(|e| !topic::is_wildcard(&e.key) && e.key.as_str() == topic_name);
        let wildcard = || {
            self.handlers
                .iter()
                .find(|e| topic::is_wildcard(&e.key) && topic::matches(&e.key, topic_name))
        };
        exact
            .or_else(wildcard)
            .map(|e| e.handler)
            .or_else(|| self.handlers.default_handler())
    }

    fn deliver(&self, publish: &Publish<'_>) {
        match self.handler_for(publish.topic) {
            Some(handler) => {
                debug!("deliver {} bytes on {}", publish.message.payload.len(), publish.topic);
                handler(&MessageData {
                    topic: publish.topic,
                    message: publish.message,
                });
            }
            None => debug!("no handler for {}", publish.topic),
        }
    }
}
