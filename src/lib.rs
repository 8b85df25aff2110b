//! # kaddns
//!
//! A peer-to-peer distributed hash table node implementing the Kademlia
//! protocol, with a thin domain-name-to-IP store as the stored value type.
//! Nodes are identified by a 160-bit key, distance is the bitwise XOR of
//! keys, and each node keeps a routing table clustering known peers by
//! distance so that any node can be located in O(log n) network hops.
//!
//! The crate is split into modules that can be reused independently:
//!
//! - [`id`]: the [`NodeId`] identifier, XOR distance, and prefix lengths.
//! - [`contact`]: [`Contact`] records, the unit stored in the routing table.
//! - [`routing`]: the k-bucket [`RoutingTable`] with ping-before-evict
//!   membership and nearest-neighbour queries.
//! - [`store`]: the [`DomainStore`] mapping (domain, record type) to an
//!   address.
//! - [`node`]: the [`KademliaNode`] state machine — RPC handlers and the
//!   iterative lookup/replication algorithms — over the [`Transport`] seam.
//! - [`protocol`]: the serde wire messages exchanged between peers.
//! - [`framing`]: length-prefixed frames for carrying RPCs over a byte
//!   stream.
//! - [`net`]: the [`TcpTransport`] client side.
//! - [`server`]: the accept loop hosting the RPC handlers.
//!
//! ## Getting started
//!
//! Build a [`TcpTransport`] and a [`KademliaNode`], serve inbound calls, and
//! drive lookups from your application:
//!
//! ```no_run
//! use anyhow::Result;
//! use tokio::net::TcpListener;
//! use kaddns::{Contact, KademliaNode, NodeId, TcpTransport};
//!
//! # async fn launch() -> Result<()> {
//! let contact = Contact::new(NodeId::random(), "127.0.0.1:8000");
//! let transport = TcpTransport::new(contact.clone(), "mainnet");
//! let node = KademliaNode::new(contact.clone(), "mainnet", transport);
//!
//! let listener = TcpListener::bind(&contact.address).await?;
//! tokio::spawn(kaddns::serve(node.clone(), listener));
//!
//! let peer = Contact::new(NodeId::from_hex("ff"), "127.0.0.1:8001");
//! node.observe(peer).await;
//! let closest = node.iterative_find_node(NodeId::random(), 3).await;
//! # let _ = closest;
//! # Ok(())
//! # }
//! ```

pub mod contact;
pub mod framing;
pub mod id;
pub mod net;
pub mod node;
pub mod protocol;
pub mod routing;
pub mod server;
pub mod store;

pub use contact::{Contact, ContactRecord};
pub use id::{NodeId, ID_BITS, ID_BYTES};
pub use net::TcpTransport;
pub use node::{KademliaNode, Transport, DEFAULT_ALPHA};
pub use protocol::RpcHeader;
pub use routing::{RoutingTable, BUCKET_SIZE};
pub use server::{handle_connection, serve};
pub use store::DomainStore;
