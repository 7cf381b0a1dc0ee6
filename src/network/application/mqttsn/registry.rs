//! Topic name to topic id mapping for one MQTT-SN session.
//!
//! A name gets its id either from a client REGISTER answered by REGACK, from
//! a SUBACK, or from a gateway REGISTER (used when a wildcard subscription
//! matches a topic the client has not seen yet). Predefined ids and short
//! names never go through the registry.

use heapless::{String, Vec};

use super::packet::ReturnCode;
use crate::network::application::pubsub::{Error, MAX_TOPIC_LEN};

#[derive(Debug, Clone)]
struct Entry {
    name: String<MAX_TOPIC_LEN>,
    // zero until the gateway assigned one
    topic_id: u16,
    pending: Option<u16>,
}

/// Fixed-capacity topic registry.
///
/// `R` is the compile-time capacity; the limit given to [`new`](Self::new)
/// can lower it at runtime.
#[derive(Debug)]
pub struct TopicRegistry<const R: usize> {
    entries: Vec<Entry, R>,
    limit: usize,
}

impl<const R: usize> TopicRegistry<R> {
    /// An empty registry holding at most `max_topics` names.
    pub fn new(max_topics: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: max_topics.min(R),
        }
    }

    /// Number of known names, pending registrations included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no name is known.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name.as_str() == name)
    }

    fn push(&mut self, name: &str, topic_id: u16, pending: Option<u16>) -> Result<(), Error> {
        if self.entries.len() >= self.limit {
            return Err(Error::TooManyTopics);
        }
        let name = String::try_from(name).map_err(|_| Error::BufferTooSmall)?;
        self.entries
            .push(Entry {
                name,
                topic_id,
                pending,
            })
            .map_err(|_| Error::TooManyTopics)
    }

    /// Record that REGISTER `msg_id` for `name` was sent.
    pub fn begin(&mut self, name: &str, msg_id: u16) -> Result<(), Error> {
        match self.position(name) {
            Some(index) => {
                self.entries[index].pending = Some(msg_id);
                Ok(())
            }
            None => self.push(name, 0, Some(msg_id)),
        }
    }

    /// Apply the REGACK for `msg_id`.
    ///
    /// On acceptance the name is bound to `topic_id`, which is returned. A
    /// rejection drops the pending registration and fails with
    /// `RegistrationRejected`.
    pub fn confirm(&mut self, msg_id: u16, topic_id: u16, return_code: ReturnCode) -> Result<u16, Error> {
        let index = self
            .entries
            .iter()
            .position(|e| e.pending == Some(msg_id))
            .ok_or(Error::TopicNotRegistered)?;
        if return_code != ReturnCode::Accepted {
            self.cancel(msg_id);
            return Err(Error::RegistrationRejected(return_code as u8));
        }
        let entry = &mut self.entries[index];
        entry.topic_id = topic_id;
        entry.pending = None;
        Ok(topic_id)
    }

    /// Bind `name` to `topic_id` without a request of our own.
    pub fn bind(&mut self, name: &str, topic_id: u16) -> Result<(), Error> {
        match self.position(name) {
            Some(index) => {
                self.entries[index].topic_id = topic_id;
                Ok(())
            }
            None => self.push(name, topic_id, None),
        }
    }

    /// The id bound to `name`.
    pub fn topic_id(&self, name: &str) -> Option<u16> {
        self.position(name)
            .map(|index| self.entries[index].topic_id)
            .filter(|id| *id != 0)
    }

    /// The name bound to `topic_id`.
    pub fn name(&self, topic_id: u16) -> Option<&str> {
        if topic_id == 0 {
            return None;
        }
        self.entries
            .iter()
            .find(|e| e.topic_id == topic_id)
            .map(|e| e.name.as_str())
    }

    /// Whether `topic_id` is bound to a name.
    pub fn is_registered(&self, topic_id: u16) -> bool {
        self.name(topic_id).is_some()
    }

    /// The name of the registration waiting for `msg_id`.
    pub fn pending_name(&self, msg_id: u16) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.pending == Some(msg_id))
            .map(|e| e.name.as_str())
    }

    /// Abandon the registration waiting for `msg_id`. A name that was never
    /// bound is forgotten.
    pub fn cancel(&mut self, msg_id: u16) {
        if let Some(index) = self.entries.iter().position(|e| e.pending == Some(msg_id)) {
            if self.entries[index].topic_id == 0 {
                self.entries.swap_remove(index);
            } else {
                self.entries[index].pending = None;
            }
        }
    }

    /// Forget every name.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
