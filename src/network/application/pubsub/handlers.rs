//! Topic handler table.
//!
//! Handlers are plain function pointers, registered per topic key together
//! with the identifier of the SUBSCRIBE that installed them until the server
//! confirms it.

use heapless::Vec;

use super::Error;

/// One registered handler.
#[derive(Debug, Clone)]
pub struct Entry<K, Hd> {
    /// Topic filter, name or identifier the handler is bound to.
    pub key: K,
    /// Callback.
    pub handler: Hd,
    /// Identifier of the SUBSCRIBE still waiting for its SUBACK.
    pub pending: Option<u16>,
}

/// Fixed-capacity table mapping topic keys to handlers, plus one optional
/// default handler.
#[derive(Debug)]
pub struct HandlerTable<K, Hd, const H: usize> {
    entries: Vec<Entry<K, Hd>, H>,
    default: Option<Hd>,
}

impl<K, Hd, const H: usize> Default for HandlerTable<K, Hd, H>
where
    K: PartialEq,
    Hd: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Hd, const H: usize> HandlerTable<K, Hd, H>
where
    K: PartialEq,
    Hd: Copy,
{
    /// An empty table without a default handler.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            default: None,
        }
    }

    /// Bind `handler` to `key`, replacing an existing binding for the same key.
    pub fn insert(&mut self, key: K, handler: Hd, pending: Option<u16>) -> Result<(), Error> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.key == key) {
            entry.handler = handler;
            entry.pending = pending;
            return Ok(());
        }
        self.entries
            .push(Entry { key, handler, pending })
            .map_err(|_| Error::TooManyHandlers)
    }

    /// Mark the entry installed by SUBSCRIBE `packet_id` as confirmed.
    pub fn confirm(&mut self, packet_id: u16) -> Option<&mut Entry<K, Hd>> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.pending == Some(packet_id))?;
        entry.pending = None;
        Some(entry)
    }

    /// The entry still waiting for SUBACK `packet_id`.
    pub fn pending(&self, packet_id: u16) -> Option<&Entry<K, Hd>> {
        self.entries.iter().find(|e| e.pending == Some(packet_id))
    }

    /// Drop the entry installed by a SUBSCRIBE that was rejected or timed out.
    pub fn remove_pending(&mut self, packet_id: u16) -> Option<Entry<K, Hd>> {
        self.remove_by(|e| e.pending == Some(packet_id))
    }

    /// Drop the first entry matching `predicate`.
    pub fn remove_by(&mut self, predicate: impl Fn(&Entry<K, Hd>) -> bool) -> Option<Entry<K, Hd>> {
        let index = self.entries.iter().position(predicate)?;
        Some(self.entries.remove(index))
    }

    /// Drop the entry for `key`.
    pub fn remove(&mut self, key: &K) -> Option<Entry<K, Hd>> {
        self.remove_by(|e| e.key == *key)
    }

    /// Registered entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry<K, Hd>> {
        self.entries.iter()
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no handler is registered (the default handler aside).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install or clear the handler for messages nothing else matches.
    pub fn set_default(&mut self, handler: Option<Hd>) {
        self.default = handler;
    }

    /// The handler for messages nothing else matches.
    pub fn default_handler(&self) -> Option<Hd> {
        self.default
    }

    /// Forget every binding, the default handler included.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.default = None;
    }
}
