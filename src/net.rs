//! TCP transport: request/response RPC over length-prefixed JSON frames.
//!
//! Each call dials the peer, writes one request frame, reads one response
//! frame, and hangs up. Connect, I/O, and decode problems are all surfaced
//! as plain errors; every call is bounded by a configurable timeout and a
//! timed-out call is indistinguishable from any other failure.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::contact::Contact;
use crate::framing::{read_frame, write_frame};
use crate::id::NodeId;
use crate::node::Transport;
use crate::protocol::{
    FindNodeRequest, FindValueRequest, PingRequest, Request, Response, RpcHeader, StoreRequest,
};

/// Default bound on a single remote call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// [`Transport`] implementation over plain TCP.
pub struct TcpTransport {
    header: RpcHeader,
    call_timeout: Duration,
}

impl TcpTransport {
    /// Create a transport that stamps `self_contact` and `network_id` onto
    /// every outgoing request.
    pub fn new(self_contact: Contact, network_id: impl Into<String>) -> Self {
        Self {
            header: RpcHeader {
                sender: self_contact,
                network_id: network_id.into(),
            },
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    fn header(&self) -> RpcHeader {
        self.header.clone()
    }

    /// One request/response exchange against `to`, bounded by the call
    /// timeout.
    async fn exchange(&self, to: &Contact, request: Request) -> Result<Response> {
        let call = async {
            let mut stream = TcpStream::connect(&to.address)
                .await
                .with_context(|| format!("connecting to {}", to.address))?;
            write_frame(&mut stream, &serde_json::to_vec(&request)?).await?;
            let reply = read_frame(&mut stream)
                .await?
                .with_context(|| format!("{} closed the connection before replying", to.address))?;
            anyhow::Ok(serde_json::from_slice::<Response>(&reply)?)
        };
        let response = timeout(self.call_timeout, call)
            .await
            .map_err(|_| anyhow!("call to {} timed out", to.address))??;

        if let Response::Error(fault) = response {
            bail!("{} rejected the call: {}", to.address, fault.message);
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn ping(&self, to: &Contact) -> Result<()> {
        let request = Request::Ping(PingRequest {
            header: self.header(),
        });
        match self.exchange(to, request).await? {
            Response::Pong(_) => Ok(()),
            other => bail!("unexpected reply to ping: {other:?}"),
        }
    }

    async fn find_node(&self, to: &Contact, target: NodeId) -> Result<Vec<Contact>> {
        let request = Request::FindNode(FindNodeRequest {
            header: self.header(),
            target,
        });
        match self.exchange(to, request).await? {
            Response::Nodes(reply) => Ok(reply.contacts),
            other => bail!("unexpected reply to find-node: {other:?}"),
        }
    }

    async fn find_value(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
    ) -> Result<(Option<IpAddr>, Vec<Contact>)> {
        let request = Request::FindValue(FindValueRequest {
            header: self.header(),
            domain: domain.to_owned(),
            record_type: record_type.to_owned(),
        });
        match self.exchange(to, request).await? {
            Response::Value(reply) => Ok((reply.addr, reply.contacts)),
            other => bail!("unexpected reply to find-value: {other:?}"),
        }
    }

    async fn store(
        &self,
        to: &Contact,
        domain: &str,
        record_type: &str,
        addr: IpAddr,
    ) -> Result<()> {
        let request = Request::Store(StoreRequest {
            header: self.header(),
            domain: domain.to_owned(),
            record_type: record_type.to_owned(),
            addr,
        });
        match self.exchange(to, request).await? {
            Response::Stored(_) => Ok(()),
            other => bail!("unexpected reply to store: {other:?}"),
        }
    }
}
