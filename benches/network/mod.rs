use libmqtt::network::error::Error;
use libmqtt::network::{Close, Connection, Read, Timer, Write};
use std::time::{Duration, Instant};

pub mod application;

/// Replays one inbound frame on every read and swallows every write.
pub struct Loopback {
    pub greeting: Option<Vec<u8>>,
    pub frame: Vec<u8>,
}

impl Read for Loopback {
    type Error = Error;
    fn read(&mut self, buf: &mut [u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
        let bytes = self.greeting.take().unwrap_or_else(|| self.frame.clone());
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}

impl Write for Loopback {
    type Error = Error;
    fn write(&mut self, buf: &[u8], _timeout_ms: u32) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Close for Loopback {
    type Error = Error;
    fn close(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for Loopback {}

#[derive(Clone, Copy)]
pub struct BenchTimer {
    deadline: Instant,
}

impl BenchTimer {
    pub fn new() -> Self {
        Self {
            deadline: Instant::now(),
        }
    }
}

impl Timer for BenchTimer {
    fn start(&mut self, duration_ms: u32) {
        self.deadline = Instant::now() + Duration::from_millis(u64::from(duration_ms));
    }

    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    fn remaining(&self) -> u32 {
        let left = self.deadline.saturating_duration_since(Instant::now());
        u32::try_from(left.as_millis()).unwrap_or(u32::MAX)
    }
}
