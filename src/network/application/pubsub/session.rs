//! Session core shared by the MQTT and MQTT-SN clients.
//!
//! The session owns the transport, the timers and every fixed-size table. It
//! knows nothing about packet layouts: the protocol clients encode into
//! the transmit buffer, hand frames over through [`split_frame`], and pass their
//! PINGREQ bytes and duplicate-marking rule in when servicing deadlines.

use heapless::{Deque, Vec};

use super::{
    AwaitingRelease, Config, EVENT_QUEUE_LEN, Error, Exchange, InFlight, PacketIdAllocator,
    SubAckResult,
};
use crate::network::{Connection, Timer, Write};

/// Connection state of a client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// No session. The initial and the final state.
    Disconnected,
    /// CONNECT sent, waiting for CONNACK.
    Connecting,
    /// Session established.
    Connected,
    /// DISCONNECT being sent.
    Disconnecting,
}

/// Completion of an exchange the application started.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// A QoS 1 or 2 publication was acknowledged end to end.
    Published {
        /// Identifier returned by `publish`.
        packet_id: u16,
    },
    /// SUBACK arrived.
    Subscribed {
        /// Identifier returned by `subscribe`.
        packet_id: u16,
        /// Granted QoS or rejection.
        result: SubAckResult,
        /// MQTT-SN only: the topic id assigned by the gateway.
        topic_id: Option<u16>,
    },
    /// UNSUBACK arrived.
    Unsubscribed {
        /// Identifier returned by `unsubscribe`.
        packet_id: u16,
    },
    /// MQTT-SN REGACK accepted a registration.
    Registered {
        /// Identifier returned by `register`.
        packet_id: u16,
        /// The topic id assigned by the gateway.
        topic_id: u16,
    },
}

/// Result of looking for a frame at the front of the receive buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Frame {
    /// A complete frame of this many bytes.
    Complete(usize),
    /// More bytes are needed.
    Incomplete,
    /// This many bytes cannot be parsed and must be dropped. May exceed what
    /// is buffered when the frame is larger than the receive buffer; the
    /// rest is dropped as it arrives.
    Discard(usize),
}

/// Locate the next frame in `buf`.
///
/// `frame_len` is the protocol's header parser; `capacity` is the size of the
/// receive buffer. A frame that can never fit is discarded whole, including
/// the part that has not been received yet.
pub fn split_frame(buf: &[u8], frame_len: fn(&[u8]) -> Result<usize, Error>, capacity: usize) -> Frame {
    if buf.is_empty() {
        return Frame::Incomplete;
    }
    match frame_len(buf) {
        Ok(0) => Frame::Discard(buf.len()),
        Ok(len) if len <= buf.len() => Frame::Complete(len),
        Ok(len) if len > capacity => Frame::Discard(len),
        Ok(_) | Err(Error::TruncatedInput) => {
            if buf.len() >= capacity {
                Frame::Discard(buf.len())
            } else {
                Frame::Incomplete
            }
        }
        Err(_) => Frame::Discard(buf.len()),
    }
}

/// Write all of `bytes`, then flush.
pub(crate) fn write_all<C: Write>(connection: &mut C, bytes: &[u8], timeout_ms: u32) -> Result<(), Error> {
    let mut written = 0;
    while written < bytes.len() {
        match connection.write(&bytes[written..], timeout_ms) {
            Ok(0) | Err(_) => return Err(Error::TransportError),
            Ok(n) => written += n,
        }
    }
    connection.flush().map_err(|_| Error::TransportError)
}

/// Transport, timers, buffers and bookkeeping of one client session.
///
/// `B` is the size of the transmit and receive buffers and of every stored
/// packet, `F` the in-flight capacity.
pub struct Session<C, T, const B: usize, const F: usize> {
    pub(crate) connection: C,
    timer: T,
    keepalive: T,
    ping: T,
    ping_outstanding: bool,
    keep_alive_ms: u32,
    // bytes of an oversized frame still to be dropped on arrival
    skip: usize,
    pub(crate) tx: [u8; B],
    rx: Vec<u8, B>,
    pub(crate) inflight: InFlight<T, B, F>,
    pub(crate) awaiting_release: AwaitingRelease<B, F>,
    pub(crate) ids: PacketIdAllocator,
    pub(crate) config: Config,
    state: State,
    events: Deque<Event, EVENT_QUEUE_LEN>,
}

impl<C, T, const B: usize, const F: usize> core::fmt::Debug for Session<C, T, B, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("keep_alive_ms", &self.keep_alive_ms)
            .field("ping_outstanding", &self.ping_outstanding)
            .field("in_flight", &self.inflight.len())
            .field("awaiting_release", &self.awaiting_release.len())
            .field("buffered", &self.rx.len())
            .field("skipping", &self.skip)
            .finish()
    }
}

impl<C: Connection, T: Timer, const B: usize, const F: usize> Session<C, T, B, F> {
    /// Wrap an open transport. `timer` is cloned for every deadline.
    pub fn new(connection: C, timer: T, config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            connection,
            keepalive: timer.clone(),
            ping: timer.clone(),
            timer,
            ping_outstanding: false,
            keep_alive_ms: 0,
            skip: 0,
            tx: [0; B],
            rx: Vec::new(),
            inflight: InFlight::new(),
            awaiting_release: AwaitingRelease::new(),
            ids: PacketIdAllocator::new(),
            config,
            state: State::Disconnected,
            events: Deque::new(),
        })
    }

    /// Current connection state.
    pub fn state(&self) -> State {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: State) {
        if self.state != state {
            debug!("session state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Whether the session is established.
    pub fn is_connected(&self) -> bool {
        self.state == State::Connected
    }

    /// Fail with `NotConnected` unless established.
    pub fn ensure_connected(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Session configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A fresh clone of the session timer, already started.
    pub fn deadline(&self, duration_ms: u32) -> T {
        let mut timer = self.timer.clone();
        timer.start(duration_ms);
        timer
    }

    /// A fresh clone of the session timer for an in-flight exchange.
    pub(crate) fn retry_timer(&self) -> T {
        self.timer.clone()
    }

    /// Transmit the first `len` bytes of the transmit buffer.
    pub fn send(&mut self, len: usize) -> Result<(), Error> {
        let bytes = self.tx.get(..len).ok_or(Error::BufferTooSmall)?;
        trace!("tx {} bytes", len);
        let result = write_all(&mut self.connection, bytes, self.config.command_timeout_ms);
        self.after_send(result)
    }

    /// Transmit bytes that do not live in the transmit buffer.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        trace!("tx {} bytes", bytes.len());
        let result = write_all(&mut self.connection, bytes, self.config.command_timeout_ms);
        self.after_send(result)
    }

    fn after_send(&mut self, result: Result<(), Error>) -> Result<(), Error> {
        match result {
            Ok(()) => {
                self.keepalive.start(self.keep_alive_ms);
                Ok(())
            }
            Err(e) => {
                self.teardown(e);
                Err(e)
            }
        }
    }

    /// Arm keepalive for a newly established session.
    pub(crate) fn establish(&mut self, keep_alive_ms: u32) {
        self.keep_alive_ms = keep_alive_ms;
        self.ping_outstanding = false;
        self.keepalive.start(keep_alive_ms);
        self.set_state(State::Connected);
        info!("session established, keepalive {} ms", keep_alive_ms);
    }

    /// Send PINGREQ when the link has been idle for the keepalive interval and
    /// fail with `KeepaliveTimeout` when the previous one went unanswered.
    pub fn keepalive(&mut self, pingreq: &[u8]) -> Result<(), Error> {
        if self.keep_alive_ms == 0 || !self.is_connected() {
            return Ok(());
        }
        if self.ping_outstanding {
            if self.ping.expired() {
                self.teardown(Error::KeepaliveTimeout);
                return Err(Error::KeepaliveTimeout);
            }
            return Ok(());
        }
        if self.keepalive.expired() {
            debug!("keepalive expired, sending ping");
            self.send_bytes(pingreq)?;
            self.ping_outstanding = true;
            self.ping.start(self.config.ping_timeout_ms);
        }
        Ok(())
    }

    /// The server answered our ping.
    pub(crate) fn pong(&mut self) {
        self.ping_outstanding = false;
    }

    /// Whether a PINGREQ is waiting for its response.
    pub fn ping_outstanding(&self) -> bool {
        self.ping_outstanding
    }

    /// Retransmit expired exchanges. `mark_dup` sets the protocol's duplicate
    /// flag on a stored packet where one exists.
    ///
    /// Returns the exchange that ran out of attempts, if any.
    pub(crate) fn retry(&mut self, mark_dup: fn(&mut [u8])) -> Result<Option<Exchange<T, B>>, Error> {
        let Self {
            connection,
            inflight,
            keepalive,
            keep_alive_ms,
            config,
            ..
        } = self;
        let config: &Config = config;
        let result = inflight.service(config, |exchange| {
            mark_dup(&mut exchange.packet);
            warn!(
                "retransmitting packet {} (attempt {})",
                exchange.packet_id,
                exchange.attempts.saturating_add(1)
            );
            write_all(connection, &exchange.packet, config.command_timeout_ms)?;
            keepalive.start(*keep_alive_ms);
            Ok(())
        });
        match result {
            Ok(Some(exchange)) => {
                warn!("packet {} gave up after {} attempts", exchange.packet_id, exchange.attempts);
                Ok(Some(exchange))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.teardown(e);
                Err(e)
            }
        }
    }

    /// Read once from the transport into the receive buffer.
    ///
    /// Returns the number of new bytes, zero when the budget elapsed without
    /// data or the buffer is full.
    pub fn receive(&mut self, timeout_ms: u32) -> Result<usize, Error> {
        let start = self.rx.len();
        if start >= B {
            return Ok(0);
        }
        self.rx.resize(B, 0).map_err(|_| Error::BufferTooSmall)?;
        let read = self.connection.read(&mut self.rx[start..], timeout_ms);
        match read {
            Ok(n) => {
                let n = n.min(B - start);
                let skipped = n.min(self.skip);
                if skipped > 0 {
                    self.rx.copy_within(start + skipped..start + n, start);
                    self.skip -= skipped;
                    trace!("dropped {} bytes of an oversized frame", skipped);
                }
                let n = n - skipped;
                self.rx.truncate(start + n);
                if n > 0 {
                    trace!("rx {} bytes", n);
                }
                Ok(n)
            }
            Err(_) => {
                self.rx.truncate(start);
                self.teardown(Error::TransportError);
                Err(Error::TransportError)
            }
        }
    }

    /// Move the receive buffer out so frames can be dispatched while the
    /// session is borrowed mutably.
    pub(crate) fn take_rx(&mut self) -> Vec<u8, B> {
        core::mem::take(&mut self.rx)
    }

    /// Put the receive buffer back, dropping the first `consumed` bytes.
    ///
    /// `consumed` may run past the end of `rx` when an oversized frame was
    /// discarded; the excess is dropped from the next reads.
    pub(crate) fn restore_rx(&mut self, mut rx: Vec<u8, B>, consumed: usize) {
        if self.state == State::Disconnected {
            // torn down while dispatching
            rx.clear();
            self.rx = rx;
            return;
        }
        self.skip += consumed.saturating_sub(rx.len());
        let consumed = consumed.min(rx.len());
        rx.copy_within(consumed.., 0);
        let keep = rx.len() - consumed;
        rx.truncate(keep);
        self.rx = rx;
    }

    /// Queue a completion event, dropping the oldest one when full.
    pub(crate) fn push_event(&mut self, event: Event) {
        if self.events.is_full() {
            self.events.pop_front();
        }
        let _ = self.events.push_back(event);
    }

    /// Oldest unread completion event.
    pub fn next_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Close the transport and forget every exchange.
    pub(crate) fn teardown(&mut self, reason: Error) {
        if self.state != State::Disconnected {
            error!("session torn down: {}", reason);
        }
        let _ = self.connection.close();
        self.inflight.clear();
        self.awaiting_release.clear();
        self.rx.clear();
        self.skip = 0;
        self.ping_outstanding = false;
        self.set_state(State::Disconnected);
    }

    /// Swap in a fresh transport, closing the old one. Only allowed while
    /// disconnected.
    pub(crate) fn replace_connection(&mut self, connection: C) -> Result<(), Error> {
        if self.state != State::Disconnected {
            return Err(Error::AlreadyConnected);
        }
        let _ = self.connection.close();
        self.connection = connection;
        self.rx.clear();
        self.skip = 0;
        Ok(())
    }

    /// Orderly shutdown after DISCONNECT was sent.
    pub(crate) fn close(&mut self) {
        let _ = self.connection.close();
        self.inflight.clear();
        self.awaiting_release.clear();
        self.rx.clear();
        self.skip = 0;
        self.ping_outstanding = false;
        self.set_state(State::Disconnected);
        info!("session closed");
    }
}
