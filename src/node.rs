//! The Kademlia node: RPC handlers plus the iterative lookup and
//! replication algorithms.
//!
//! A [`KademliaNode`] owns a routing table and a domain store, and talks to
//! the rest of the overlay through the [`Transport`] trait. The type is
//! generic over the transport so tests can use an in-memory mock while
//! production uses [`crate::net::TcpTransport`].
//!
//! Every successful remote interaction, inbound or outbound, is fed back
//! into the routing table as a liveness signal. Failed calls are not
//! evidence of liveness and leave the table untouched, except that a failed
//! eviction probe is precisely what evicts a stale entry.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::contact::{Contact, ContactRecord};
use crate::id::NodeId;
use crate::protocol::RpcHeader;
use crate::routing::{RoutingTable, BUCKET_SIZE};
use crate::store::DomainStore;

/// Default number of parallel outstanding queries during an iterative
/// lookup (the Kademlia alpha parameter).
pub const DEFAULT_ALPHA: usize = 3;

/// Replication fan-out used when seeding an iterative store, independent of
/// the lookup fan-out.
const STORE_CONCURRENCY: usize = 3;

/// Remote-call capability the node needs from its transport.
///
/// Implementations attach the local [`RpcHeader`] to every outgoing request
/// and surface any connect/timeout/decode problem as an error; the core
/// never distinguishes transport failures beyond "peer unreachable".
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Liveness probe; also used for the bucket eviction decision.
    async fn ping(&self, to: &Contact) -> Result<()>;

    /// Ask a peer for the contacts it knows closest to `target`.
    async fn find_node(&self, to: &Contact, target: NodeId) -> Result<Vec<Contact>>;

    /// Ask a peer for a domain record, or closer candidates if it has none.
    async fn find_value(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
    ) -> Result<(Option<IpAddr>, Vec<Contact>)>;

    /// Ask a peer to persist a domain record.
    async fn store(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
        addr: IpAddr,
    ) -> Result<()>;
}

/// A DHT node: identity, routing table, domain store, and transport.
pub struct KademliaNode<T: Transport> {
    contact: Contact,
    network_id: String,
    routing: Arc<Mutex<RoutingTable>>,
    store: Arc<Mutex<DomainStore>>,
    transport: Arc<T>,
}

impl<T: Transport> Clone for KademliaNode<T> {
    fn clone(&self) -> Self {
        Self {
            contact: self.contact.clone(),
            network_id: self.network_id.clone(),
            routing: self.routing.clone(),
            store: self.store.clone(),
            transport: self.transport.clone(),
        }
    }
}

impl<T: Transport> KademliaNode<T> {
    /// Create a node from its own contact and the overlay's network id.
    ///
    /// The network id must match across all peers of one logical overlay;
    /// requests carrying any other id are rejected.
    pub fn new(contact: Contact, network_id: impl Into<String>, transport: T) -> Self {
        Self {
            routing: Arc::new(Mutex::new(RoutingTable::new(contact.clone()))),
            store: Arc::new(Mutex::new(DomainStore::new())),
            contact,
            network_id: network_id.into(),
            transport: Arc::new(transport),
        }
    }

    /// This node's own contact.
    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    /// The header this node attaches to outgoing RPCs.
    pub fn rpc_header(&self) -> RpcHeader {
        RpcHeader {
            sender: self.contact.clone(),
            network_id: self.network_id.clone(),
        }
    }

    /// Merge a contact into the routing table as a liveness observation.
    ///
    /// If the contact's bucket is full, the least-recently-seen incumbent is
    /// pinged before anything is evicted; the table lock is not held across
    /// that probe.
    pub async fn observe(&self, contact: Contact) {
        if contact.id == self.contact.id {
            return;
        }
        let pending = {
            let mut routing = self.routing.lock().await;
            routing.update(contact)
        };
        let Some(probe) = pending else { return };

        let alive = match self.transport.ping(&probe.incumbent).await {
            Ok(()) => true,
            Err(err) => {
                debug!(incumbent = %probe.incumbent, "eviction probe failed: {err:#}");
                false
            }
        };
        let mut routing = self.routing.lock().await;
        routing.apply_probe_result(probe, alive);
    }

    fn check_network(&self, header: &RpcHeader) -> Result<()> {
        if header.network_id != self.network_id {
            bail!(
                "expected network id {:?}, got {:?}",
                self.network_id,
                header.network_id
            );
        }
        Ok(())
    }

    /// Validate an inbound header and merge its sender into the table.
    ///
    /// A network id mismatch is a protocol error: the call is rejected and
    /// the sender is not recorded.
    async fn admit(&self, header: &RpcHeader) -> Result<()> {
        self.check_network(header)?;
        self.observe(header.sender.clone()).await;
        Ok(())
    }

    /// Handle an inbound ping.
    pub async fn handle_ping(&self, header: &RpcHeader) -> Result<RpcHeader> {
        self.admit(header).await?;
        debug!(from = %header.sender, "ping");
        Ok(self.rpc_header())
    }

    /// Handle an inbound find-node: answer with our own closest contacts.
    pub async fn handle_find_node(
        &self,
        header: &RpcHeader,
        target: NodeId,
    ) -> Result<Vec<Contact>> {
        self.admit(header).await?;
        let routing = self.routing.lock().await;
        Ok(routing
            .find_closest(&target, BUCKET_SIZE)
            .into_iter()
            .map(|record| record.contact)
            .collect())
    }

    /// Handle an inbound store: unconditional local upsert.
    pub async fn handle_store(
        &self,
        header: &RpcHeader,
        domain: &str,
        record_type: &str,
        addr: IpAddr,
    ) -> Result<RpcHeader> {
        self.admit(header).await?;
        let mut store = self.store.lock().await;
        store.store_record(domain, record_type, addr);
        Ok(self.rpc_header())
    }

    /// Handle an inbound find-value: the local record if we hold it,
    /// otherwise the contacts closest to the domain's key-space position so
    /// the caller can continue the search elsewhere.
    pub async fn handle_find_value(
        &self,
        header: &RpcHeader,
        domain: &str,
        record_type: &str,
    ) -> Result<(Option<IpAddr>, Vec<Contact>)> {
        self.admit(header).await?;
        if let Some(addr) = self.store.lock().await.retrieve(domain, record_type) {
            return Ok((Some(addr), Vec::new()));
        }
        let target = NodeId::for_key(domain);
        let routing = self.routing.lock().await;
        let closer = routing
            .find_closest(&target, BUCKET_SIZE)
            .into_iter()
            .map(|record| record.contact)
            .collect();
        Ok((None, closer))
    }

    /// Locate the up-to-[`BUCKET_SIZE`] nodes closest to `target`
    /// network-wide, with at most `alpha` queries outstanding at a time.
    ///
    /// Fan-out/fan-in: each outstanding find-node call runs as its own task
    /// and reports on a single channel; only this flow touches the frontier,
    /// the seen-set, and the accumulator. Closest candidates are queried
    /// first, each contact at most once. The search converges when no call
    /// is outstanding and no unvisited frontier entry remains.
    pub async fn iterative_find_node(&self, target: NodeId, alpha: usize) -> Vec<ContactRecord> {
        let alpha = alpha.max(1);
        let (tx, mut rx) = mpsc::channel::<(Contact, Result<Vec<Contact>>)>(alpha);

        // Frontier of not-yet-queried contacts, closest to target first.
        let mut frontier: BinaryHeap<Reverse<ContactRecord>> = BinaryHeap::new();
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut found: Vec<ContactRecord> = Vec::new();

        let seeds = {
            let routing = self.routing.lock().await;
            routing.find_closest(&target, alpha)
        };
        for record in seeds {
            seen.insert(record.contact.id);
            frontier.push(Reverse(record.clone()));
            found.push(record);
        }

        let mut pending = 0usize;
        while pending < alpha && self.dispatch_query(&mut frontier, target, &tx) {
            pending += 1;
        }

        while pending > 0 {
            let Some((queried, outcome)) = rx.recv().await else {
                break;
            };
            pending -= 1;

            match outcome {
                Ok(contacts) => {
                    self.observe(queried).await;
                    for contact in contacts {
                        if seen.insert(contact.id) {
                            let record = ContactRecord::towards(contact, &target);
                            frontier.push(Reverse(record.clone()));
                            found.push(record);
                        }
                    }
                }
                Err(err) => {
                    debug!(peer = %queried, "find-node query failed: {err:#}");
                }
            }

            while pending < alpha && self.dispatch_query(&mut frontier, target, &tx) {
                pending += 1;
            }
        }

        found.sort();
        found.truncate(BUCKET_SIZE);
        found
    }

    /// Pop the closest unvisited frontier entry and spawn a find-node call
    /// against it. Returns false when the frontier holds no queryable
    /// contact. Our own contact can surface in peer replies; it stays in the
    /// result set but is never queried.
    fn dispatch_query(
        &self,
        frontier: &mut BinaryHeap<Reverse<ContactRecord>>,
        target: NodeId,
        tx: &mpsc::Sender<(Contact, Result<Vec<Contact>>)>,
    ) -> bool {
        while let Some(Reverse(record)) = frontier.pop() {
            if record.contact.id == self.contact.id {
                continue;
            }
            let transport = self.transport.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = transport.find_node(&record.contact, target).await;
                let _ = tx.send((record.contact, outcome)).await;
            });
            return true;
        }
        false
    }

    /// Store a domain record locally and replicate it to the nodes closest
    /// to the domain's key-space position.
    ///
    /// Replication is best-effort: a replica that cannot be reached is
    /// logged and skipped, never failing the operation or the remaining
    /// replicas.
    pub async fn iterative_store(&self, domain: &str, record_type: &str, addr: IpAddr) {
        {
            let mut store = self.store.lock().await;
            store.store_record(domain, record_type, addr);
        }

        let target = NodeId::for_key(domain);
        let closest = self.iterative_find_node(target, STORE_CONCURRENCY).await;
        for record in closest
            .into_iter()
            .filter(|record| record.contact.id != self.contact.id)
            .take(STORE_CONCURRENCY)
        {
            match self
                .transport
                .store(&record.contact, domain, record_type, addr)
                .await
            {
                Ok(()) => self.observe(record.contact).await,
                Err(err) => {
                    warn!(domain, peer = %record.contact, "store replication failed: {err:#}");
                }
            }
        }
    }

    /// Resolve a domain record, consulting the nodes closest to the
    /// domain's key-space position when it is not held locally.
    ///
    /// `None` means nobody we could reach holds the record; that is the
    /// normal miss path, not an error.
    pub async fn iterative_find_value(&self, domain: &str, record_type: &str) -> Option<IpAddr> {
        if let Some(addr) = self.store.lock().await.retrieve(domain, record_type) {
            return Some(addr);
        }

        let target = NodeId::for_key(domain);
        for record in self.iterative_find_node(target, DEFAULT_ALPHA).await {
            if record.contact.id == self.contact.id {
                continue;
            }
            match self
                .transport
                .find_value(&record.contact, domain, record_type)
                .await
            {
                Ok((Some(addr), _)) => {
                    self.observe(record.contact).await;
                    return Some(addr);
                }
                Ok((None, _)) => self.observe(record.contact).await,
                Err(err) => {
                    debug!(domain, peer = %record.contact, "find-value query failed: {err:#}");
                }
            }
        }
        None
    }

    /// Number of contacts currently in the routing table.
    pub async fn known_peers(&self) -> usize {
        self.routing.lock().await.len()
    }
}
