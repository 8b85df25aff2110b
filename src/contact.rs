//! Contacts: the unit of information stored in the routing table.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Another DHT node: its identifier plus an opaque network address.
///
/// The address is whatever string the transport knows how to dial, typically
/// `host:port`. Contacts are immutable values; the routing table stores
/// copies, never shared mutable state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Contact {
    /// The node's unique identifier.
    pub id: NodeId,
    /// Network endpoint the transport can dial.
    pub address: String,
}

impl Contact {
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contact(\"{}\", \"{}\")", self.id, self.address)
    }
}

impl PartialOrd for Contact {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Contact {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// A contact paired with its precomputed XOR distance to some target.
///
/// Ordering is ascending by distance (ties broken by id), so a collection of
/// records sorts closest-first. Records are ephemeral: they exist only while
/// sorting candidates or driving a lookup frontier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactRecord {
    pub contact: Contact,
    pub distance: NodeId,
}

impl ContactRecord {
    /// Pair a contact with its distance to `target`.
    pub fn towards(contact: Contact, target: &NodeId) -> Self {
        let distance = contact.id.xor(target);
        Self { contact, distance }
    }
}

impl PartialOrd for ContactRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContactRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.contact.id.cmp(&other.contact.id))
    }
}
