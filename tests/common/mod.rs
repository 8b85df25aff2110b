use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use kaddns::{Contact, KademliaNode, NodeId, RpcHeader, Transport};

pub const TEST_NETWORK: &str = "test";

/// All nodes sharing one in-memory "network".
#[derive(Default)]
pub struct Registry {
    peers: RwLock<HashMap<NodeId, KademliaNode<MockTransport>>>,
}

impl Registry {
    pub async fn register(&self, node: &KademliaNode<MockTransport>) {
        let mut peers = self.peers.write().await;
        peers.insert(node.contact().id, node.clone());
    }

    pub async fn get(&self, id: &NodeId) -> Option<KademliaNode<MockTransport>> {
        let peers = self.peers.read().await;
        peers.get(id).cloned()
    }
}

/// In-memory transport: calls are dispatched straight into the target
/// node's handlers. Unregistered peers are unreachable, and failures can be
/// injected per peer id.
#[derive(Clone)]
pub struct MockTransport {
    registry: Arc<Registry>,
    self_contact: Contact,
    failures: Arc<Mutex<HashSet<NodeId>>>,
    store_calls: Arc<Mutex<Vec<(NodeId, String, String, IpAddr)>>>,
    ping_calls: Arc<Mutex<Vec<NodeId>>>,
}

impl MockTransport {
    pub fn new(registry: Arc<Registry>, self_contact: Contact) -> Self {
        Self {
            registry,
            self_contact,
            failures: Arc::new(Mutex::new(HashSet::new())),
            store_calls: Arc::new(Mutex::new(Vec::new())),
            ping_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn header(&self) -> RpcHeader {
        RpcHeader {
            sender: self.self_contact.clone(),
            network_id: TEST_NETWORK.to_owned(),
        }
    }

    pub async fn set_failure(&self, node: NodeId, fail: bool) {
        let mut failures = self.failures.lock().await;
        if fail {
            failures.insert(node);
        } else {
            failures.remove(&node);
        }
    }

    pub async fn store_calls(&self) -> Vec<(NodeId, String, String, IpAddr)> {
        self.store_calls.lock().await.clone()
    }

    pub async fn ping_calls(&self) -> Vec<NodeId> {
        self.ping_calls.lock().await.clone()
    }

    async fn should_fail(&self, node: &NodeId) -> bool {
        self.failures.lock().await.contains(node)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn ping(&self, to: &Contact) -> Result<()> {
        self.ping_calls.lock().await.push(to.id);
        if self.should_fail(&to.id).await {
            return Err(anyhow!("injected network failure"));
        }
        match self.registry.get(&to.id).await {
            Some(peer) => {
                peer.handle_ping(&self.header()).await?;
                Ok(())
            }
            None => Err(anyhow!("peer not reachable")),
        }
    }

    async fn find_node(&self, to: &Contact, target: NodeId) -> Result<Vec<Contact>> {
        if self.should_fail(&to.id).await {
            return Err(anyhow!("injected network failure"));
        }
        let peer = self
            .registry
            .get(&to.id)
            .await
            .ok_or_else(|| anyhow!("peer not reachable"))?;
        peer.handle_find_node(&self.header(), target).await
    }

    async fn find_value(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
    ) -> Result<(Option<IpAddr>, Vec<Contact>)> {
        if self.should_fail(&to.id).await {
            return Err(anyhow!("injected network failure"));
        }
        let peer = self
            .registry
            .get(&to.id)
            .await
            .ok_or_else(|| anyhow!("peer not reachable"))?;
        peer.handle_find_value(&self.header(), domain, record_type)
            .await
    }

    async fn store(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
        addr: IpAddr,
    ) -> Result<()> {
        if self.should_fail(&to.id).await {
            return Err(anyhow!("injected network failure"));
        }
        self.store_calls.lock().await.push((
            to.id,
            domain.to_owned(),
            record_type.to_owned(),
            addr,
        ));
        let peer = self
            .registry
            .get(&to.id)
            .await
            .ok_or_else(|| anyhow!("peer not reachable"))?;
        peer.handle_store(&self.header(), domain, record_type, addr)
            .await?;
        Ok(())
    }
}

pub struct TestNode {
    pub node: KademliaNode<MockTransport>,
    pub transport: MockTransport,
}

impl TestNode {
    pub async fn new(registry: &Arc<Registry>, id: NodeId) -> Self {
        let contact = Contact::new(id, format!("node-{id}"));
        let transport = MockTransport::new(registry.clone(), contact.clone());
        let node = KademliaNode::new(contact, TEST_NETWORK, transport.clone());
        registry.register(&node).await;
        Self { node, transport }
    }

    pub fn contact(&self) -> Contact {
        self.node.contact().clone()
    }

    pub fn header(&self) -> RpcHeader {
        self.node.rpc_header()
    }
}

#[allow(dead_code)]
pub fn make_node_id(index: u32) -> NodeId {
    let mut bytes = [0u8; kaddns::ID_BYTES];
    bytes[..4].copy_from_slice(&index.to_be_bytes());
    NodeId::from_bytes(&bytes)
}

#[allow(dead_code)]
pub fn make_contact(index: u32) -> Contact {
    Contact::new(make_node_id(index), format!("node-{index}"))
}
