//! MQTT-SN 1.2 client session.
//!
//! Same session model as the MQTT client, with topics named by 2-byte
//! identifiers. Full topic names have to be registered with the gateway
//! before they can be published to, either explicitly with
//! [`Client::register`] or implicitly by subscribing to them.

use heapless::{Deque, String, Vec};

use super::packet::{
    self, Decoded, Options, Packet, Publish, Register, ReturnCode, SubAck, Subscribe, TopicAck,
    TopicId, Unsubscribe, Will, WillTopic,
};
use super::registry::TopicRegistry;
use crate::network::application::mqtt::topic;
use crate::network::application::pubsub::session::{Frame, split_frame};
use crate::network::application::pubsub::{
    Config, Error, Event, Exchange, ExchangeKind, HandlerTable, MAX_TOPIC_LEN, Message, QoS,
    Session, Stage, State, SubAckResult,
};
use crate::network::{Connect, Connection, Timer};

const PINGREQ: [u8; 2] = [0x02, 0x16];

/// An inbound publication as seen by a handler.
#[derive(Debug, Clone, Copy)]
pub struct MessageData<'a> {
    /// Topic the message was published to, as it appeared on the wire.
    pub topic: TopicId<'a>,
    /// Registered name of a `Normal` topic id.
    pub topic_name: Option<&'a str>,
    /// The message itself.
    pub message: Message<'a>,
}

/// Callback invoked for every delivered publication.
pub type MessageHandler = fn(&MessageData<'_>);

/// What a handler is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TopicKey {
    Name(String<MAX_TOPIC_LEN>),
    Predefined(u16),
    Short([u8; 2]),
}

impl TopicKey {
    fn from_topic(topic: &TopicId<'_>) -> Result<Self, Error> {
        match topic {
            TopicId::Name(name) => String::try_from(*name)
                .map(TopicKey::Name)
                .map_err(|_| Error::BufferTooSmall),
            TopicId::Predefined(id) => Ok(TopicKey::Predefined(*id)),
            TopicId::Short(name) => Ok(TopicKey::Short(*name)),
            TopicId::Normal(_) => Err(Error::MalformedPacket),
        }
    }
}

fn raw_topic_id(topic: &TopicId<'_>) -> u16 {
    match topic {
        TopicId::Normal(id) | TopicId::Predefined(id) => *id,
        TopicId::Short(name) => u16::from_be_bytes(*name),
        TopicId::Name(_) => 0,
    }
}

/// An MQTT-SN client session.
///
/// # Type Parameters
///
/// * `C` - The connection type implementing [`Connection`], typically a UDP
///   socket bound to the gateway
/// * `T` - The timer type implementing [`Timer`]
/// * `B` - Size of the transmit and receive buffers
/// * `F` - Maximum number of in-flight exchanges
/// * `H` - Maximum number of topic handlers
/// * `R` - Capacity of the topic registry
pub struct Client<
    C,
    T,
    const B: usize = 256,
    const F: usize = 4,
    const H: usize = 5,
    const R: usize = 8,
> {
    session: Session<C, T, B, F>,
    handlers: HandlerTable<TopicKey, MessageHandler, H>,
    registry: TopicRegistry<R>,
    unsubscribing: Vec<(u16, TopicKey), F>,
    connack: Option<ReturnCode>,
    // gateway refusals not yet returned from poll, oldest first
    rejected: Deque<Error, F>,
}

impl<C, T, const B: usize, const F: usize, const H: usize, const R: usize> core::fmt::Debug
    for Client<C, T, B, F, H, R>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("handlers", &self.handlers.len())
            .field("topics", &self.registry.len())
            .finish()
    }
}

impl<C: Connection, T: Timer, const B: usize, const F: usize, const H: usize, const R: usize>
    Client<C, T, B, F, H, R>
{
    /// Wrap an open transport.
    pub fn new(connection: C, timer: T, config: Config) -> Result<Self, Error> {
        Ok(Self {
            session: Session::new(connection, timer, config)?,
            handlers: HandlerTable::new(),
            registry: TopicRegistry::new(config.max_topics),
            unsubscribing: Vec::new(),
            connack: None,
            rejected: Deque::new(),
        })
    }

    /// Open a transport to the gateway at `host:port`, then wrap it.
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

    /// The topic registry of this session.
    pub fn registry(&self) -> &TopicRegistry<R> {
        &self.registry
    }

    /// Oldest unread completion event.
    pub fn next_event(&mut self) -> Option<Event> {
        self.session.next_event()
    }

    /// Replace the transport of a disconnected client, typically with a new
    /// link to the gateway after a failed or lost session closed the old one.
    ///
    /// Fails with [`Error::AlreadyConnected`] while a session is up.
    pub fn set_connection(&mut self, connection: C) -> Result<(), Error> {
        self.session.replace_connection(connection)
    }

    /// Install or clear the handler for publications no topic handler matches.
    pub fn set_default_handler(&mut self, handler: Option<MessageHandler>) {
        self.handlers.set_default(handler);
    }

    /// Send CONNECT and wait for CONNACK, answering the gateway's will
    /// requests on the way.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyConnected`] - A session is already established
    /// * [`Error::ConnectionRefused`] - The gateway answered with a non-zero
    ///   return code
    /// * [`Error::CommandTimeout`] - No CONNACK arrived in time. The transport
    ///   is closed; see [`set_connection`](Self::set_connection)
    /// * [`Error::TransportError`] - The transport failed
    pub fn connect(&mut self, options: &Options<'_>) -> Result<(), Error> {
        if self.session.state() != State::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        let len = Packet::Connect(*options).serialize(&mut self.session.tx)?;
        self.connack = None;
        self.rejected.clear();
        if options.clean_session {
            self.registry.clear();
        }
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
            self.process_frames(options.will)?;
            if let Some(rc) = self.connack.take() {
                if rc != ReturnCode::Accepted {
                    self.session.teardown(Error::ConnectionRefused(rc as u8));
                    return Err(Error::ConnectionRefused(rc as u8));
                }
                self.session.establish(u32::from(options.duration) * 1000);
                return Ok(());
            }
        }
    }

    fn resolve<'t>(&self, topic: TopicId<'t>) -> Result<TopicId<'t>, Error> {
        match topic {
            TopicId::Name(name) => self
                .registry
                .topic_id(name)
                .map(TopicId::Normal)
                .ok_or(Error::TopicNotRegistered),
            TopicId::Normal(id) if !self.registry.is_registered(id) => Err(Error::TopicNotRegistered),
            other => Ok(other),
        }
    }

    /// Publish `message` to `topic`.
    ///
    /// Names and normal ids must have been registered first. Returns the
    /// message identifier, zero for QoS 0.
    pub fn publish(&mut self, topic: TopicId<'_>, message: &Message<'_>) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        let topic = self.resolve(topic)?;
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
        debug!("publish {} ({} bytes)", message.id, message.payload.len());
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

    /// Ask the gateway for a topic id for `name`.
    ///
    /// Returns the REGISTER message identifier; the assigned id is reported
    /// through [`Event::Registered`] and kept in the registry.
    pub fn register(&mut self, name: &str) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        if self.session.inflight.is_full(&self.session.config) {
            return Err(Error::TooManyInFlight);
        }
        let msg_id = self.session.ids.next_id();
        let len = Packet::Register(Register {
            topic_id: 0,
            msg_id,
            topic_name: name,
        })
        .serialize(&mut self.session.tx)?;

        self.registry.begin(name, msg_id)?;
        debug!("register {} as {}", name, msg_id);
        if let Err(e) = self.session.send(len) {
            self.registry.cancel(msg_id);
            return Err(e);
        }
        let timer = self.session.retry_timer();
        self.session.inflight.insert(
            msg_id,
            ExchangeKind::Register,
            &self.session.tx[..len],
            timer,
            &self.session.config,
        )?;
        Ok(msg_id)
    }

    /// Subscribe to a topic name, predefined id or short name and route
    /// matching publications to `handler`.
    ///
    /// A name is bound to the topic id the gateway returns in SUBACK.
    pub fn subscribe(&mut self, topic: TopicId<'_>, qos: QoS, handler: MessageHandler) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        if self.session.inflight.is_full(&self.session.config) {
            return Err(Error::TooManyInFlight);
        }
        if let TopicId::Name(filter) = topic {
            topic::validate_filter(filter)?;
        }
        let key = TopicKey::from_topic(&topic)?;
        let msg_id = self.session.ids.next_id();
        let len = Packet::Subscribe(Subscribe {
            msg_id,
            dup: false,
            qos,
            topic,
        })
        .serialize(&mut self.session.tx)?;

        self.handlers.insert(key, handler, Some(msg_id))?;
        debug!("subscribe {}", msg_id);
        if let Err(e) = self.session.send(len) {
            self.handlers.remove_pending(msg_id);
            return Err(e);
        }
        let timer = self.session.retry_timer();
        self.session.inflight.insert(
            msg_id,
            ExchangeKind::Subscribe,
            &self.session.tx[..len],
            timer,
            &self.session.config,
        )?;
        Ok(msg_id)
    }

    /// Unsubscribe. The handler is removed when UNSUBACK arrives.
    pub fn unsubscribe(&mut self, topic: TopicId<'_>) -> Result<u16, Error> {
        self.session.ensure_connected()?;
        if self.session.inflight.is_full(&self.session.config) {
            return Err(Error::TooManyInFlight);
        }
        let key = TopicKey::from_topic(&topic)?;
        let msg_id = self.session.ids.next_id();
        let len = Packet::Unsubscribe(Unsubscribe { msg_id, topic }).serialize(&mut self.session.tx)?;

        self.unsubscribing
            .push((msg_id, key))
            .map_err(|_| Error::TooManyInFlight)?;
        debug!("unsubscribe {}", msg_id);
        if let Err(e) = self.session.send(len) {
            self.unsubscribing.retain(|(id, _)| *id != msg_id);
            return Err(e);
        }
        let timer = self.session.retry_timer();
        self.session.inflight.insert(
            msg_id,
            ExchangeKind::Unsubscribe,
            &self.session.tx[..len],
            timer,
            &self.session.config,
        )?;
        Ok(msg_id)
    }

    /// Run one round of the session: keepalive, retransmissions, one read of
    /// at most `timeout_ms`, dispatch.
    ///
    /// # Errors
    ///
    /// * [`Error::DeliveryTimeout`] - An exchange ran out of attempts
    /// * [`Error::PublishRejected`] - The gateway refused a publication
    /// * [`Error::RegistrationRejected`] - The gateway refused a registration
    /// * [`Error::KeepaliveTimeout`] / [`Error::TransportError`] - The session
    ///   was torn down
    ///
    /// Each call reports at most one refusal. When several arrive together
    /// the rest are returned by the following calls, oldest first, before
    /// any further I/O.
    pub fn poll(&mut self, timeout_ms: u32) -> Result<(), Error> {
        self.session.ensure_connected()?;
        if let Some(e) = self.rejected.pop_front() {
            return Err(e);
        }
        self.session.keepalive(&PINGREQ)?;
        if let Some(exchange) = self.session.retry(packet::mark_dup)? {
            self.abandon(&exchange);
            return Err(Error::DeliveryTimeout);
        }
        self.session.receive(timeout_ms)?;
        self.process_frames(None)?;
        match self.rejected.pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Send DISCONNECT and close the transport. Unfinished exchanges and
    /// topic registrations are dropped.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        let mut result = Ok(());
        if self.session.is_connected() {
            self.session.set_state(State::Disconnecting);
            result = Packet::Disconnect(None)
                .serialize(&mut self.session.tx)
                .and_then(|len| self.session.send(len));
        }
        self.session.close();
        self.unsubscribing.clear();
        self.registry.clear();
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
            ExchangeKind::Register => self.registry.cancel(exchange.packet_id),
            ExchangeKind::Publish(_) => {}
        }
    }

    fn process_frames(&mut self, will: Option<Will<'_>>) -> Result<(), Error> {
        let rx = self.session.take_rx();
        let mut offset = 0;
        let mut result = Ok(());
        while self.connack.is_none() {
            match split_frame(&rx[offset..], packet::frame_len, B) {
                Frame::Complete(len) => {
                    let frame = &rx[offset..offset + len];
                    offset += len;
                    if let Err(e) = self.handle_frame(frame, will) {
                        if e.is_fatal() {
                            result = Err(e);
                            break;
                        }
                        warn!("dropped packet: {}", e);
                    }
                    // the gateway ended the session; the rest is dropped
                    if self.session.state() == State::Disconnected {
                        break;
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

    fn handle_frame(&mut self, frame: &[u8], will: Option<Will<'_>>) -> Result<(), Error> {
        let packet = match Packet::deserialize(frame)? {
            (Decoded::Packet(packet), _) => packet,
            (Decoded::Connect(_), _) => {
                warn!("ignoring gateway-bound CONNECT");
                return Ok(());
            }
        };
        trace!("rx {:?}", packet.msg_type());
        match packet {
            Packet::ConnAck(rc) => {
                if self.session.state() == State::Connecting {
                    self.connack = Some(rc);
                } else {
                    warn!("unexpected CONNACK");
                }
            }
            Packet::WillTopicReq => match will {
                Some(will) => {
                    self.send_packet(&Packet::WillTopic(WillTopic {
                        qos: will.qos,
                        retained: will.retained,
                        topic: will.topic,
                    }))?;
                }
                None => warn!("WILLTOPICREQ without a will"),
            },
            Packet::WillMsgReq => match will {
                Some(will) => {
                    self.send_packet(&Packet::WillMsg(will.message))?;
                }
                None => warn!("WILLMSGREQ without a will"),
            },
            Packet::Register(register) => {
                let rc = match self.registry.bind(register.topic_name, register.topic_id) {
                    Ok(()) => ReturnCode::Accepted,
                    Err(e) => {
                        warn!("cannot bind {}: {}", register.topic_name, e);
                        ReturnCode::Congestion
                    }
                };
                self.send_packet(&Packet::RegAck(TopicAck {
                    topic_id: register.topic_id,
                    msg_id: register.msg_id,
                    return_code: rc,
                }))?;
            }
            Packet::RegAck(ack) => self.on_regack(ack),
            Packet::Publish(publish) => self.on_publish(frame, &publish)?,
            Packet::PubAck(ack) => self.on_puback(ack),
            Packet::PubRec(msg_id) => self.on_pubrec(msg_id)?,
            Packet::PubRel(msg_id) => self.on_pubrel(msg_id)?,
            Packet::PubComp(msg_id) => self.complete_publish(msg_id, QoS::ExactlyOnce, Stage::AwaitingComplete),
            Packet::SubAck(ack) => self.on_suback(ack),
            Packet::UnsubAck(msg_id) => {
                if self.session.inflight.remove(msg_id).is_none() {
                    warn!("UNSUBACK for unknown message {}", msg_id);
                    return Ok(());
                }
                if let Some(index) = self.unsubscribing.iter().position(|(id, _)| *id == msg_id) {
                    let (_, key) = self.unsubscribing.swap_remove(index);
                    self.handlers.remove(&key);
                }
                self.session.push_event(Event::Unsubscribed { packet_id: msg_id });
            }
            Packet::PingReq(_) => {
                self.send_packet(&Packet::PingResp)?;
            }
            Packet::PingResp => self.session.pong(),
            Packet::Disconnect(_) => {
                warn!("gateway closed the session");
                self.session.close();
            }
            Packet::Connect(_)
            | Packet::WillTopic(_)
            | Packet::WillMsg(_)
            | Packet::Subscribe(_)
            | Packet::Unsubscribe(_) => {
                warn!("ignoring gateway-bound packet {:?}", packet.msg_type());
            }
        }
        Ok(())
    }

    fn reject(&mut self, e: Error) {
        if self.rejected.push_back(e).is_err() {
            warn!("dropping rejection report: {}", e);
        }
    }

    fn on_regack(&mut self, ack: TopicAck) {
        match self.session.inflight.remove(ack.msg_id) {
            Some(exchange) if exchange.kind == ExchangeKind::Register => {}
            _ => {
                warn!("REGACK for unknown message {}", ack.msg_id);
                return;
            }
        }
        match self.registry.confirm(ack.msg_id, ack.topic_id, ack.return_code) {
            Ok(topic_id) => {
                debug!("registered topic id {}", topic_id);
                self.session.push_event(Event::Registered {
                    packet_id: ack.msg_id,
                    topic_id,
                });
            }
            Err(e) => {
                warn!("registration {} failed: {}", ack.msg_id, e);
                self.reject(e);
            }
        }
    }

    fn on_puback(&mut self, ack: TopicAck) {
        if ack.return_code == ReturnCode::Accepted {
            self.complete_publish(ack.msg_id, QoS::AtLeastOnce, Stage::Sent);
            return;
        }
        // a rejection ends QoS 1 and QoS 2 publications alike
        let is_publish = self
            .session
            .inflight
            .find_mut(ack.msg_id)
            .is_some_and(|e| matches!(e.kind, ExchangeKind::Publish(_)));
        if is_publish {
            self.session.inflight.remove(ack.msg_id);
            warn!("publish {} rejected: {:?}", ack.msg_id, ack.return_code);
            self.reject(Error::PublishRejected(ack.return_code as u8));
        }
    }

    fn on_suback(&mut self, ack: SubAck) {
        match self.session.inflight.remove(ack.msg_id) {
            Some(exchange) if exchange.kind == ExchangeKind::Subscribe => {}
            _ => {
                warn!("SUBACK for unknown message {}", ack.msg_id);
                return;
            }
        }
        let result = if ack.return_code == ReturnCode::Accepted {
            let bound = self.handlers.confirm(ack.msg_id).map(|entry| entry.key.clone());
            if let (Some(TopicKey::Name(name)), true) = (bound, ack.topic_id != 0) {
                if let Err(e) = self.registry.bind(&name, ack.topic_id) {
                    warn!("cannot bind {}: {}", name.as_str(), e);
                    self.reject(e);
                }
            }
            SubAckResult::Granted(ack.qos)
        } else {
            warn!("subscription {} rejected: {:?}", ack.msg_id, ack.return_code);
            self.handlers.remove_pending(ack.msg_id);
            SubAckResult::Rejected
        };
        let topic_id = if ack.topic_id != 0 { Some(ack.topic_id) } else { None };
        self.session.push_event(Event::Subscribed {
            packet_id: ack.msg_id,
            result,
            topic_id,
        });
    }

    fn complete_publish(&mut self, msg_id: u16, qos: QoS, stage: Stage) {
        let matches = self
            .session
            .inflight
            .find_mut(msg_id)
            .is_some_and(|e| e.kind == ExchangeKind::Publish(qos) && e.stage == stage);
        if matches {
            self.session.inflight.remove(msg_id);
            debug!("publish {} complete", msg_id);
            self.session.push_event(Event::Published { packet_id: msg_id });
        } else {
            warn!("acknowledgement for unknown message {}", msg_id);
        }
    }

    fn on_pubrec(&mut self, msg_id: u16) -> Result<(), Error> {
        let len = self.send_packet(&Packet::PubRel(msg_id))?;
        let retry_interval_ms = self.session.config.retry_interval_ms;
        if let Some(exchange) = self.session.inflight.find_mut(msg_id) {
            if exchange.kind == ExchangeKind::Publish(QoS::ExactlyOnce) && exchange.stage == Stage::Sent {
                exchange.advance(Stage::AwaitingComplete, &self.session.tx[..len], retry_interval_ms)?;
            }
        }
        Ok(())
    }

    fn on_publish(&mut self, frame: &[u8], publish: &Publish<'_>) -> Result<(), Error> {
        let id = publish.message.id;
        let topic_id = raw_topic_id(&publish.topic);
        if let TopicId::Normal(normal) = publish.topic {
            if !self.registry.is_registered(normal) {
                warn!("publish to unknown topic id {}", normal);
                self.send_packet(&Packet::PubAck(TopicAck {
                    topic_id,
                    msg_id: id,
                    return_code: ReturnCode::InvalidTopicId,
                }))?;
                return Ok(());
            }
        }
        match publish.message.qos {
            QoS::AtMostOnce => self.deliver(publish),
            QoS::AtLeastOnce => {
                self.deliver(publish);
                self.send_packet(&Packet::PubAck(TopicAck {
                    topic_id,
                    msg_id: id,
                    return_code: ReturnCode::Accepted,
                }))?;
            }
            QoS::ExactlyOnce => {
                if self.session.awaiting_release.contains(id) {
                    debug!("duplicate QoS 2 publish {}", id);
                } else {
                    self.session.awaiting_release.insert(id, frame)?;
                }
                self.send_packet(&Packet::PubRec(id))?;
            }
        }
        Ok(())
    }

    fn on_pubrel(&mut self, msg_id: u16) -> Result<(), Error> {
        if let Some(stored) = self.session.awaiting_release.take(msg_id) {
            if let Ok((Decoded::Packet(Packet::Publish(publish)), _)) = Packet::deserialize(&stored) {
                self.deliver(&publish);
            }
        } else {
            debug!("PUBREL for unknown message {}", msg_id);
        }
        self.send_packet(&Packet::PubComp(msg_id))?;
        Ok(())
    }

    fn handler_for(&self, topic: &TopicId<'_>, name: Option<&str>) -> Option<MessageHandler> {
        let exact = self.handlers.iter().find(|e| match (&e.key, topic) {
            (TopicKey::Name(key), _) => !topic::is_wildcard(key) && name == Some(key.as_str()),
            (TopicKey::Predefined(key), TopicId::Predefined(id)) => key == id,
            (TopicKey::Short(key), TopicId::Short(short)) => key == short,
            _ => false,
        });
        // names registered by the gateway for a wildcard subscription
        let wildcard = || {
            let name = name?;
            self.handlers.iter().find(|e| {
                matches!(&e.key, TopicKey::Name(key) if topic::is_wildcard(key) && topic::matches(key, name))
            })
        };
        exact
            .or_else(wildcard)
            .map(|e| e.handler)
            .or_else(|| self.handlers.default_handler())
    }

    fn deliver(&self, publish: &Publish<'_>) {
        let name = match publish.topic {
            TopicId::Normal(id) => self.registry.name(id),
            _ => None,
        };
        match self.handler_for(&publish.topic, name) {
            Some(handler) => {
                debug!("deliver {} bytes", publish.message.payload.len());
                handler(&MessageData {
                    topic: publish.topic,
                    topic_name: name,
                    message: publish.message,
                });
            }
            None => debug!("no handler for topic id {}", raw_topic_id(&publish.topic)),
        }
    }
}
