//! Wire message definitions.
//!
//! Every request and response carries an [`RpcHeader`] naming the sender and
//! the overlay network it believes it is talking to. Dispatch is a closed
//! set of four methods; [`Request`] and [`Response`] are the envelopes that
//! actually travel over a connection, with [`Response::Error`] reporting a
//! rejected call (such as a network id mismatch) back to the caller.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::id::NodeId;

/// Common header on every RPC message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcHeader {
    /// Contact information of the message's sender.
    pub sender: Contact,
    /// Namespace tag partitioning independent overlays on one transport.
    pub network_id: String,
}

/// Liveness/identity exchange.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PingRequest {
    pub header: RpcHeader,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub header: RpcHeader,
}

/// Ask a peer for the contacts it knows closest to `target`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindNodeRequest {
    pub header: RpcHeader,
    pub target: NodeId,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindNodeResponse {
    pub header: RpcHeader,
    pub contacts: Vec<Contact>,
}

/// Ask a peer to persist a domain record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreRequest {
    pub header: RpcHeader,
    pub domain: String,
    pub record_type: String,
    pub addr: IpAddr,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreResponse {
    pub header: RpcHeader,
}

/// Ask a peer for a domain record, or for closer nodes if it has none.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindValueRequest {
    pub header: RpcHeader,
    pub domain: String,
    pub record_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FindValueResponse {
    pub header: RpcHeader,
    /// The record, if this peer holds it.
    pub addr: Option<IpAddr>,
    /// Closer candidates for continuing the search elsewhere.
    pub contacts: Vec<Contact>,
}

/// A rejected call, reported back to the caller instead of a reply.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcFault {
    pub header: RpcHeader,
    pub message: String,
}

/// The closed set of inbound RPC methods.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Request {
    Ping(PingRequest),
    FindNode(FindNodeRequest),
    Store(StoreRequest),
    FindValue(FindValueRequest),
}

impl Request {
    pub fn header(&self) -> &RpcHeader {
        match self {
            Request::Ping(r) => &r.header,
            Request::FindNode(r) => &r.header,
            Request::Store(r) => &r.header,
            Request::FindValue(r) => &r.header,
        }
    }
}

/// Replies matching [`Request`] variant for variant, plus [`Response::Error`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Response {
    Pong(PingResponse),
    Nodes(FindNodeResponse),
    Stored(StoreResponse),
    Value(FindValueResponse),
    Error(RpcFault),
}
