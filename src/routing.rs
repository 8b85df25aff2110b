//! The Kademlia routing table.
//!
//! Known peers are clustered into one bucket per possible prefix length of
//! their XOR distance to the local node: bucket `i` holds contacts agreeing
//! with us in the top `i` bits and differing at bit `i`. Each bucket keeps at
//! most [`BUCKET_SIZE`] contacts in recency order, most-recently-confirmed
//! first.
//!
//! The table itself is synchronous. When a bucket is full, [`RoutingTable::update`]
//! does not decide the eviction on its own; it hands back a [`PendingProbe`]
//! naming the least-recently-seen incumbent so the caller can ping it without
//! holding the table lock across network I/O, then settle the bucket with
//! [`RoutingTable::apply_probe_result`].

use std::collections::VecDeque;

use crate::contact::{Contact, ContactRecord};
use crate::id::{NodeId, ID_BITS};

/// Maximum number of contacts per bucket, and the result width of
/// network-wide lookups.
pub const BUCKET_SIZE: usize = 20;

/// A single recency-ordered bucket. Front is most-recently-seen.
#[derive(Debug, Default, Clone)]
struct Bucket {
    contacts: VecDeque<Contact>,
}

/// What [`RoutingTable::update`] did with a contact.
#[derive(Debug)]
enum BucketTouch {
    /// The contact was already present and moved to the front.
    Refreshed,
    /// The bucket had room; the contact was inserted at the front.
    Inserted,
    /// The bucket is full; the least-recently-seen incumbent must prove
    /// liveness before anything changes.
    Full {
        incumbent: Contact,
        newcomer: Contact,
    },
}

impl Bucket {
    fn touch(&mut self, contact: Contact) -> BucketTouch {
        if let Some(pos) = self.contacts.iter().position(|c| c.id == contact.id) {
            let existing = self.contacts.remove(pos).expect("position is in range");
            self.contacts.push_front(existing);
            return BucketTouch::Refreshed;
        }

        if self.contacts.len() < BUCKET_SIZE {
            self.contacts.push_front(contact);
            BucketTouch::Inserted
        } else {
            let incumbent = self
                .contacts
                .back()
                .cloned()
                .expect("full bucket cannot be empty");
            BucketTouch::Full {
                incumbent,
                newcomer: contact,
            }
        }
    }

    fn move_to_front(&mut self, id: &NodeId) {
        if let Some(pos) = self.contacts.iter().position(|c| &c.id == id) {
            let existing = self.contacts.remove(pos).expect("position is in range");
            self.contacts.push_front(existing);
        }
    }

    fn remove(&mut self, id: &NodeId) {
        if let Some(pos) = self.contacts.iter().position(|c| &c.id == id) {
            self.contacts.remove(pos);
        }
    }
}

/// A full-bucket decision deferred to the caller.
///
/// Ping `incumbent`; if it answers, it has re-proven liveness and keeps its
/// slot while `newcomer` is discarded. If it does not, it is evicted and
/// `newcomer` takes the front of the bucket.
#[derive(Clone, Debug)]
pub struct PendingProbe {
    bucket: usize,
    /// Least-recently-seen contact in the full bucket.
    pub incumbent: Contact,
    newcomer: Contact,
}

/// Bucket-organized set of known contacts, keyed by XOR-distance prefix
/// length to the local node.
#[derive(Debug)]
pub struct RoutingTable {
    own: Contact,
    buckets: Vec<Bucket>,
}

impl RoutingTable {
    /// Create an empty table for the given local contact.
    pub fn new(own: Contact) -> Self {
        Self {
            own,
            buckets: vec![Bucket::default(); ID_BITS],
        }
    }

    /// The local node's own contact.
    pub fn own_contact(&self) -> &Contact {
        &self.own
    }

    fn bucket_index(&self, id: &NodeId) -> usize {
        id.xor(&self.own.id).prefix_len()
    }

    /// Refresh membership for a contact.
    ///
    /// Known contacts move to the front of their bucket; unknown ones are
    /// inserted while room remains. A full bucket yields a [`PendingProbe`]
    /// instead of mutating anything: the caller pings the incumbent and
    /// reports back via [`Self::apply_probe_result`]. The local node's own id
    /// is never stored.
    #[must_use = "a pending probe must be resolved or the contact is lost"]
    pub fn update(&mut self, contact: Contact) -> Option<PendingProbe> {
        if contact.id == self.own.id {
            return None;
        }
        let idx = self.bucket_index(&contact.id);
        match self.buckets[idx].touch(contact) {
            BucketTouch::Refreshed | BucketTouch::Inserted => None,
            BucketTouch::Full {
                incumbent,
                newcomer,
            } => Some(PendingProbe {
                bucket: idx,
                incumbent,
                newcomer,
            }),
        }
    }

    /// Settle a full-bucket probe.
    ///
    /// A live incumbent keeps its slot and moves to the front (it has just
    /// proven liveness); the newcomer is discarded. A dead incumbent is
    /// evicted and the newcomer inserted at the front.
    pub fn apply_probe_result(&mut self, probe: PendingProbe, incumbent_alive: bool) {
        let bucket = &mut self.buckets[probe.bucket];
        if incumbent_alive {
            bucket.move_to_front(&probe.incumbent.id);
            return;
        }

        bucket.remove(&probe.incumbent.id);
        let newcomer = probe.newcomer;
        if bucket.contacts.iter().any(|c| c.id == newcomer.id) {
            return;
        }
        if bucket.contacts.len() < BUCKET_SIZE {
            bucket.contacts.push_front(newcomer);
        }
    }

    /// The up-to-`count` known contacts closest to `target`, ascending by
    /// XOR distance to `target`.
    ///
    /// Collection starts in the bucket where a peer at `target` would live
    /// relative to us, then widens symmetrically (`b-1, b+1, b-2, ...`):
    /// buckets adjacent in prefix length are the next-best approximation of
    /// closeness when the home bucket is under-populated.
    pub fn find_closest(&self, target: &NodeId, count: usize) -> Vec<ContactRecord> {
        let home = self.bucket_index(target);
        let mut found: Vec<ContactRecord> = self.buckets[home]
            .contacts
            .iter()
            .map(|c| ContactRecord::towards(c.clone(), target))
            .collect();

        let mut step = 1;
        while (home >= step || home + step < ID_BITS) && found.len() < count {
            if home >= step {
                found.extend(
                    self.buckets[home - step]
                        .contacts
                        .iter()
                        .map(|c| ContactRecord::towards(c.clone(), target)),
                );
            }
            if home + step < ID_BITS {
                found.extend(
                    self.buckets[home + step]
                        .contacts
                        .iter()
                        .map(|c| ContactRecord::towards(c.clone(), target)),
                );
            }
            step += 1;
        }

        found.sort();
        found.truncate(count);
        found
    }

    /// Total number of contacts across all buckets.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.contacts.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|b| b.contacts.is_empty())
    }

    /// Whether a contact with this id is currently stored.
    pub fn contains(&self, id: &NodeId) -> bool {
        let idx = self.bucket_index(id);
        self.buckets[idx].contacts.iter().any(|c| &c.id == id)
    }
}
