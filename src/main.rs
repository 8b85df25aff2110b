//! DHT node binary.
//!
//! Starts a node on the given bind address, optionally joins an existing
//! overlay through one or more bootstrap peers, and then serves RPCs. A
//! bootstrap peer is written as `IP:PORT/HEXID`.
//!
//! ```bash
//! kaddns --bind 127.0.0.1:8000
//! kaddns --bind 127.0.0.1:8001 \
//!     --bootstrap 127.0.0.1:8000/0123456789abcdef0123456789abcdef01234567
//! ```

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use kaddns::{Contact, KademliaNode, NodeId, TcpTransport, DEFAULT_ALPHA};

#[derive(Clone, Debug)]
struct BootstrapPeer {
    addr: SocketAddr,
    id: NodeId,
}

impl FromStr for BootstrapPeer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr_part, id_part) = s
            .rsplit_once('/')
            .context("bootstrap peer must include an id (format: IP:PORT/HEXID)")?;
        let addr: SocketAddr = addr_part.parse().context("invalid socket address")?;
        Ok(BootstrapPeer {
            addr,
            id: NodeId::from_hex(id_part),
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "kaddns")]
#[command(author, version, about = "Kademlia DHT node with a domain record store")]
struct Args {
    /// Address to listen on for inbound RPCs.
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,

    /// Overlay network id; must match across all peers of one overlay.
    #[arg(short, long, default_value = "kaddns")]
    network: String,

    /// Peers to join through, as IP:PORT/HEXID.
    #[arg(short = 'B', long = "bootstrap", value_name = "PEER")]
    bootstrap: Vec<BootstrapPeer>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    let local_addr = listener.local_addr()?;

    let contact = Contact::new(NodeId::random(), local_addr.to_string());
    info!(id = %contact.id, addr = %local_addr, network = %args.network, "node starting");

    let transport = TcpTransport::new(contact.clone(), args.network.clone());
    let node = KademliaNode::new(contact.clone(), args.network, transport);

    let server = tokio::spawn(kaddns::serve(node.clone(), listener));

    // Join the overlay: observe each bootstrap peer, then look up our own
    // id so the buckets nearest to us get populated.
    for peer in &args.bootstrap {
        node.observe(Contact::new(peer.id, peer.addr.to_string()))
            .await;
    }
    if !args.bootstrap.is_empty() {
        let found = node.iterative_find_node(contact.id, DEFAULT_ALPHA).await;
        if found.is_empty() {
            warn!("bootstrap lookup found no peers");
        } else {
            info!(peers = node.known_peers().await, "joined overlay");
        }
    }

    server.await?
}
