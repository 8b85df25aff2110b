//! Serving inbound RPCs.
//!
//! One request/response exchange per connection, mirroring the client side
//! in [`crate::net`]. A rejected call (network id mismatch) is reported back
//! to the caller as a [`Response::Error`] frame rather than silently
//! dropping the connection.

use anyhow::Result;
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;

use crate::framing::{read_frame, write_frame};
use crate::node::{KademliaNode, Transport};
use crate::protocol::{
    FindNodeResponse, FindValueResponse, PingResponse, Request, Response, RpcFault, StoreResponse,
};

/// Accept connections forever, handling each on its own task.
pub async fn serve<T: Transport>(node: KademliaNode<T>, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let node = node.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(node, stream).await {
                debug!(%peer, "connection handler failed: {err:#}");
            }
        });
    }
}

/// Read one request frame, dispatch it, write one response frame.
pub async fn handle_connection<T: Transport>(
    node: KademliaNode<T>,
    mut stream: TcpStream,
) -> Result<()> {
    let Some(bytes) = read_frame(&mut stream).await? else {
        return Ok(());
    };
    let request: Request = serde_json::from_slice(&bytes)?;
    let response = dispatch(&node, request).await;
    write_frame(&mut stream, &serde_json::to_vec(&response)?).await?;
    Ok(())
}

/// Route a request to the matching node handler.
///
/// Handler errors become [`Response::Error`] faults carrying our header, so
/// the caller learns why it was rejected.
async fn dispatch<T: Transport>(node: &KademliaNode<T>, request: Request) -> Response {
    let outcome = match request {
        Request::Ping(req) => node
            .handle_ping(&req.header)
            .await
            .map(|header| Response::Pong(PingResponse { header })),
        Request::FindNode(req) => node
            .handle_find_node(&req.header, req.target)
            .await
            .map(|contacts| {
                Response::Nodes(FindNodeResponse {
                    header: node.rpc_header(),
                    contacts,
                })
            }),
        Request::Store(req) => node
            .handle_store(&req.header, &req.domain, &req.record_type, req.addr)
            .await
            .map(|header| Response::Stored(StoreResponse { header })),
        Request::FindValue(req) => node
            .handle_find_value(&req.header, &req.domain, &req.record_type)
            .await
            .map(|(addr, contacts)| {
                Response::Value(FindValueResponse {
                    header: node.rpc_header(),
                    addr,
                    contacts,
                })
            }),
    };

    outcome.unwrap_or_else(|err| {
        Response::Error(RpcFault {
            header: node.rpc_header(),
            message: format!("{err:#}"),
        })
    })
}
