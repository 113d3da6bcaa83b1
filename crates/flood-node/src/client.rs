//! Outbound RPC client.
//!
//! One exchange per call: connect, send a request line, read the response
//! line. The whole exchange runs under a single timeout so a stuck peer can
//! never wedge a fan-out task or a distributor worker.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

use flood_proto::{InstanceAddress, Request, Response};

use crate::error::{NodeError, Result};

/// Send `request` to `addr` and await the single response line.
///
/// # Errors
///
/// Returns [`NodeError::Timeout`] if the exchange does not complete within
/// `timeout`, [`NodeError::Connect`] if the peer is unreachable, or
/// [`NodeError::ConnectionClosed`] if it hangs up before replying.
pub async fn send_request(
    addr: InstanceAddress,
    request: &Request,
    timeout: Duration,
) -> Result<Response> {
    let line = request.to_json()?;
    tokio::time::timeout(timeout, exchange(addr, line))
        .await
        .map_err(|_| NodeError::Timeout(addr))?
}

async fn exchange(addr: InstanceAddress, line: String) -> Result<Response> {
    let stream = TcpStream::connect(addr.socket_addr())
        .await
        .map_err(|e| NodeError::Connect(addr, e))?;
    let mut framed = Framed::new(stream, LinesCodec::new());

    framed.send(line).await?;

    match framed.next().await {
        Some(reply) => Ok(Response::from_json(&reply?)?),
        None => Err(NodeError::ConnectionClosed(addr)),
    }
}
