//! Mock transport and clock shared by the integration tests.
//!
//! The connection and the test body share one [`Wire`]: the test pushes the
//! bytes the server would send and inspects every packet the client wrote.
//! Time only moves when a test advances the [`Clock`] or when a read finds no
//! data, in which case the whole read budget is consumed.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use libmqtt::network::error::Error;
use libmqtt::network::{Close, Connect, Connection, Read, Timer, Write};

/// Simulated milliseconds since start.
#[derive(Debug, Clone, Default)]
pub struct Clock(Rc<Cell<u64>>);

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

/// Countdown on a [`Clock`].
#[derive(Debug, Clone)]
pub struct MockTimer {
    clock: Clock,
    deadline: u64,
}

impl MockTimer {
    pub fn new(clock: &Clock) -> Self {
        Self {
            clock: clock.clone(),
            deadline: clock.now(),
        }
    }
}

impl Timer for MockTimer {
    fn start(&mut self, duration_ms: u32) {
        self.deadline = self.clock.now() + u64::from(duration_ms);
    }

    fn expired(&self) -> bool {
        self.clock.now() >= self.deadline
    }

    fn remaining(&self) -> u32 {
        self.deadline.saturating_sub(self.clock.now()) as u32
    }
}

#[derive(Debug)]
struct Wire {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    is_open: bool,
    fail_writes: bool,
}

/// The client's end of the wire.
#[derive(Debug)]
pub struct MockConnection {
    wire: Rc<RefCell<Wire>>,
    clock: Clock,
}

/// The test's end of the wire.
#[derive(Debug, Clone)]
pub struct Peer {
    wire: Rc<RefCell<Wire>>,
}

impl Peer {
    /// Queue bytes for the client to read. Each call is delivered by a
    /// separate read.
    pub fn push(&self, bytes: &[u8]) {
        self.wire.borrow_mut().inbound.push_back(bytes.to_vec());
    }

    /// Every write the client made so far, oldest first.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.wire.borrow().sent.clone()
    }

    /// Drain the writes made so far.
    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.wire.borrow_mut().sent)
    }

    /// The most recent write.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.wire.borrow().sent.last().cloned()
    }

    pub fn is_open(&self) -> bool {
        self.wire.borrow().is_open
    }

    /// Make every following write fail.
    pub fn fail_writes(&self) {
        self.wire.borrow_mut().fail_writes = true;
    }
}

/// A connected pair on `clock`.
pub fn pair(clock: &Clock) -> (MockConnection, Peer) {
    let wire = Rc::new(RefCell::new(Wire {
        inbound: VecDeque::new(),
        sent: Vec::new(),
        is_open: true,
        fail_writes: false,
    }));
    let connection = MockConnection {
        wire: wire.clone(),
        clock: clock.clone(),
    };
    (connection, Peer { wire })
}

impl Read for MockConnection {
    type Error = Error;

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if !wire.is_open {
            return Err(Error::NotOpen);
        }
        let Some(mut chunk) = wire.inbound.pop_front() else {
            self.clock.advance(u64::from(timeout_ms));
            return Ok(0);
        };
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            chunk.drain(..len);
            wire.inbound.push_front(chunk);
        }
        Ok(len)
    }
}

impl Write for MockConnection {
    type Error = Error;

    fn write(&mut self, buf: &[u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
        let mut wire = self.wire.borrow_mut();
        if !wire.is_open {
            return Err(Error::NotOpen);
        }
        if wire.fail_writes {
            return Err(Error::WriteError);
        }
        wire.sent.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for MockConnection {
    type Error = Error;

    fn close(&mut self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().is_open = false;
        Ok(())
    }
}

impl Connection for MockConnection {}

/// Connector handing out one prepared connection.
#[derive(Debug)]
pub struct MockNetwork {
    pending: Option<MockConnection>,
    pub host: Option<(String, u16)>,
}

impl MockNetwork {
    pub fn new(connection: MockConnection) -> Self {
        Self {
            pending: Some(connection),
            host: None,
        }
    }
}

impl Connect for MockNetwork {
    type Connection = MockConnection;
    type Error = Error;

    fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection, Self::Error> {
        if host.is_empty() {
            return Err(Error::InvalidAddress);
        }
        self.host = Some((host.to_string(), port));
        self.pending.take().ok_or(Error::ConnectionRefused)
    }
}
