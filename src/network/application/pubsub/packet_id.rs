//! Packet identifier allocation.

/// Hands out packet identifiers for one session.
///
/// Identifiers start at 1, increase by one and wrap from 65535 back to 1.
/// Zero is never produced.
///
/// ```rust
/// use libmqtt::network::application::pubsub::PacketIdAllocator;
///
/// let mut ids = PacketIdAllocator::new();
/// assert_eq!(ids.next_id(), 1);
/// assert_eq!(ids.next_id(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PacketIdAllocator {
    last: u16,
}

impl PacketIdAllocator {
    /// A fresh allocator whose first identifier is 1.
    pub const fn new() -> Self {
        Self { last: 0 }
    }

    /// Allocate the next identifier.
    pub fn next_id(&mut self) -> u16 {
        self.last = if self.last == u16::MAX { 1 } else { self.last + 1 };
        self.last
    }

    /// Go back to the initial state.
    pub fn reset(&mut self) {
        self.last = 0;
    }
}
