//! Node identifiers and the XOR distance metric.
//!
//! Every node and every stored key lives in the same 160-bit identifier
//! space. Closeness between identifiers is measured by XOR: the distance
//! between `a` and `b` is `a ^ b` compared as a big-endian integer. The
//! routing table and the iterative lookup both rank contacts with this
//! metric, while plain bytewise ordering ([`Ord`]) is only used for
//! tie-breaking.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Width of a [`NodeId`] in bytes.
pub const ID_BYTES: usize = 20;

/// Width of a [`NodeId`] in bits; also the number of routing table buckets.
pub const ID_BITS: usize = ID_BYTES * 8;

/// A 160-bit identifier for DHT nodes and stored keys.
///
/// The derived `Ord` compares the raw bytes lexicographically, which for
/// big-endian fixed-width values is exactly numeric ordering. That makes a
/// XOR result directly comparable as a distance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId([u8; ID_BYTES]);

impl NodeId {
    /// Build an identifier from raw bytes, zero-padding when fewer than
    /// [`ID_BYTES`] are supplied and ignoring any excess.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut id = [0u8; ID_BYTES];
        let len = data.len().min(ID_BYTES);
        id[..len].copy_from_slice(&data[..len]);
        Self(id)
    }

    /// Generate a uniformly random identifier.
    pub fn random() -> Self {
        let mut id = [0u8; ID_BYTES];
        rand::thread_rng().fill_bytes(&mut id);
        Self(id)
    }

    /// Decode an identifier from its hex text form.
    ///
    /// Short input is zero-padded on the right and undecodable input yields
    /// the all-zero identifier; this mirrors [`Self::from_bytes`] in never
    /// failing.
    pub fn from_hex(text: &str) -> Self {
        if !text.is_ascii() {
            return Self::from_bytes(&[]);
        }
        let even = &text[..text.len() & !1];
        Self::from_bytes(&hex::decode(even).unwrap_or_default())
    }

    /// Deterministic key-space position for an external key such as a domain
    /// name.
    ///
    /// The key's bytes are packed directly into the fixed identifier width
    /// (truncated or zero-padded). Every node must apply the same transform
    /// so the network agrees on where a key lives.
    pub fn for_key(key: &str) -> Self {
        Self::from_bytes(key.as_bytes())
    }

    /// Bytewise XOR with another identifier; the Kademlia distance metric.
    pub fn xor(&self, other: &NodeId) -> NodeId {
        let mut out = [0u8; ID_BYTES];
        for i in 0..ID_BYTES {
            out[i] = self.0[i] ^ other.0[i];
        }
        NodeId(out)
    }

    /// Index of the highest-order set bit, counting from the most
    /// significant bit of byte 0.
    ///
    /// Used as the routing table bucket index for a XOR distance. The
    /// all-zero identifier (equal ids) returns `ID_BITS - 1`.
    pub fn prefix_len(&self) -> usize {
        for (byte_idx, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                return byte_idx * 8 + byte.leading_zeros() as usize;
            }
        }
        ID_BITS - 1
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self)
    }
}
