//! Tracking of unacknowledged exchanges.
//!
//! Outbound requests that expect an answer (QoS 1/2 PUBLISH, SUBSCRIBE,
//! UNSUBSCRIBE, REGISTER) live in an [`InFlight`] table together with the
//! exact bytes that were sent, so they can be retransmitted verbatim. Inbound
//! QoS 2 publications waiting for PUBREL live in [`AwaitingRelease`].

use heapless::Vec;

use super::{Config, Error, QoS};
use crate::network::Timer;

/// What an in-flight exchange is waiting to complete.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExchangeKind {
    /// An outbound PUBLISH at QoS 1 or 2.
    Publish(QoS),
    /// A SUBSCRIBE waiting for SUBACK.
    Subscribe,
    /// An UNSUBSCRIBE waiting for UNSUBACK.
    Unsubscribe,
    /// An MQTT-SN REGISTER waiting for REGACK.
    Register,
}

/// Where an exchange is in its handshake.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    /// PUBLISH sent, waiting for PUBACK or PUBREC.
    Sent,
    /// PUBREL sent, waiting for PUBCOMP.
    AwaitingComplete,
    /// Request sent, waiting for its acknowledgement.
    Requested,
}

/// One unacknowledged request.
#[derive(Debug)]
pub struct Exchange<T, const B: usize> {
    /// Identifier correlating request and acknowledgement.
    pub packet_id: u16,
    /// Request type.
    pub kind: ExchangeKind,
    /// Handshake position.
    pub stage: Stage,
    /// Bytes of the packet to retransmit (PUBLISH, then PUBREL once PUBREC
    /// arrived).
    pub packet: Vec<u8, B>,
    /// Transmissions so far, the first one included.
    pub attempts: u8,
    /// Retry countdown.
    pub timer: T,
}

impl<T: Timer, const B: usize> Exchange<T, B> {
    /// Move to `stage`, replacing the stored packet with `packet` (already
    /// sent once by the caller).
    pub fn advance(&mut self, stage: Stage, packet: &[u8], retry_interval_ms: u32) -> Result<(), Error> {
        self.packet = Vec::from_slice(packet).map_err(|_| Error::BufferTooSmall)?;
        self.stage = stage;
        self.attempts = 1;
        self.timer.start(retry_interval_ms);
        Ok(())
    }
}

/// Fixed-capacity table of in-flight exchanges.
///
/// `F` is the compile-time capacity; [`Config::max_in_flight`] can lower it
/// at runtime.
#[derive(Debug)]
pub struct InFlight<T, const B: usize, const F: usize> {
    entries: Vec<Exchange<T, B>, F>,
}

impl<T, const B: usize, const F: usize> Default for InFlight<T, B, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const B: usize, const F: usize> InFlight<T, B, F> {
    /// An empty table.
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Number of exchanges waiting for an answer.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Timer, const B: usize, const F: usize> InFlight<T, B, F> {

    /// Whether another exchange would exceed the table's limits.
    pub fn is_full(&self, config: &Config) -> bool {
        self.entries.len() >= config.max_in_flight.min(F)
    }

    /// Record a request that was just sent once.
    ///
    /// `timer` is a fresh clone of the session's timer; it is started here
    /// with the retry interval.
    pub fn insert(
        &mut self,
        packet_id: u16,
        kind: ExchangeKind,
        packet: &[u8],
        mut timer: T,
        config: &Config,
    ) -> Result<(), Error> {
        if self.is_full(config) {
            return Err(Error::TooManyInFlight);
        }
        let stage = match kind {
            ExchangeKind::Publish(_) => Stage::Sent,
            _ => Stage::Requested,
        };
        let packet = Vec::from_slice(packet).map_err(|_| Error::BufferTooSmall)?;
        timer.start(config.retry_interval_ms);
        self.entries
            .push(Exchange {
                packet_id,
                kind,
                stage,
                packet,
                attempts: 1,
                timer,
            })
            .map_err(|_| Error::TooManyInFlight)
    }

    /// Look up the exchange with this identifier.
    pub fn find_mut(&mut self, packet_id: u16) -> Option<&mut Exchange<T, B>> {
        self.entries.iter_mut().find(|e| e.packet_id == packet_id)
    }

    /// Remove and return the exchange with this identifier.
    pub fn remove(&mut self, packet_id: u16) -> Option<Exchange<T, B>> {
        let index = self.entries.iter().position(|e| e.packet_id == packet_id)?;
        Some(self.entries.swap_remove(index))
    }

    /// Drop every exchange.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Retransmit every exchange whose retry timer expired.
    ///
    /// `resend` receives the exchange and must put its packet on the wire,
    /// marking it as a duplicate where the protocol has a flag for it. An
    /// exchange that already used `max_attempts` transmissions is removed and
    /// returned instead so the caller can report `DeliveryTimeout`; at most one
    /// is returned per call.
    pub fn service<E>(
        &mut self,
        config: &Config,
        mut resend: impl FnMut(&mut Exchange<T, B>) -> Result<(), E>,
    ) -> Result<Option<Exchange<T, B>>, E> {
        let mut index = 0;
        while index < self.entries.len() {
            let exchange = &mut self.entries[index];
            if exchange.timer.expired() {
                if exchange.attempts >= config.max_attempts {
                    return Ok(Some(self.entries.swap_remove(index)));
                }
                resend(exchange)?;
                exchange.attempts = exchange.attempts.saturating_add(1);
                exchange.timer.start(config.retry_interval_ms);
            }
            index += 1;
        }
        Ok(None)
    }
}

/// Inbound QoS 2 publications received but not yet released.
///
/// The raw PUBLISH frame is stored so the message can be delivered when
/// PUBREL arrives, exactly once.
#[derive(Debug)]
pub struct AwaitingRelease<const B: usize, const F: usize> {
    entries: Vec<(u16, Vec<u8, B>), F>,
}

impl<const B: usize, const F: usize> Default for AwaitingRelease<B, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const B: usize, const F: usize> AwaitingRelease<B, F> {
    /// An empty store.
    pub const fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Whether a publication with this identifier is waiting for release.
    pub fn contains(&self, packet_id: u16) -> bool {
        self.entries.iter().any(|(id, _)| *id == packet_id)
    }

    /// Keep `frame` until PUBREL for `packet_id` arrives.
    pub fn insert(&mut self, packet_id: u16, frame: &[u8]) -> Result<(), Error> {
        if self.contains(packet_id) {
            return Ok(());
        }
        let frame = Vec::from_slice(frame).map_err(|_| Error::BufferTooSmall)?;
        self.entries
            .push((packet_id, frame))
            .map_err(|_| Error::TooManyInFlight)
    }

    /// Remove and return the stored frame for `packet_id`.
    pub fn take(&mut self, packet_id: u16) -> Option<Vec<u8, B>> {
        let index = self.entries.iter().position(|(id, _)| *id == packet_id)?;
        Some(self.entries.swap_remove(index).1)
    }

    /// Number of publications waiting for release.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing waits for release.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
