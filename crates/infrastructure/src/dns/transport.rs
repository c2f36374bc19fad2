//! UDP exchange with an upstream resolver.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prismdns_domain::DomainError;
use tokio::net::UdpSocket;
use tracing::debug;

use super::overlay::OverlayNetwork;

/// Maximum UDP DNS response size with EDNS(0).
const MAX_UDP_RESPONSE_SIZE: usize = 4096;

/// One request/response round trip over a fresh ephemeral-port
/// socket, bounded by `timeout` on both legs.
pub async fn udp_exchange(
    payload: &[u8],
    endpoint: SocketAddr,
    timeout: Duration,
) -> Result<Vec<u8>, DomainError> {
    let bind_addr: SocketAddr = if endpoint.is_ipv4() {
        ([0, 0, 0, 0], 0).into()
    } else {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(bind_addr).await.map_err(|e| DomainError::Transport {
        server: endpoint.to_string(),
        detail: format!("failed to bind socket: {e}"),
    })?;

    socket.connect(endpoint).await.map_err(|e| DomainError::Transport {
        server: endpoint.to_string(),
        detail: format!("failed to connect: {e}"),
    })?;

    tokio::time::timeout(timeout, socket.send(payload))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: endpoint.to_string(),
        })?
        .map_err(|e| DomainError::Transport {
            server: endpoint.to_string(),
            detail: format!("send failed: {e}"),
        })?;

    let mut recv_buf = vec![0u8; MAX_UDP_RESPONSE_SIZE];
    let received = tokio::time::timeout(timeout, socket.recv(&mut recv_buf))
        .await
        .map_err(|_| DomainError::TransportTimeout {
            server: endpoint.to_string(),
        })?
        .map_err(|e| DomainError::Transport {
            server: endpoint.to_string(),
            detail: format!("recv failed: {e}"),
        })?;

    recv_buf.truncate(received);
    debug!(server = %endpoint, bytes = received, "UDP exchange complete");
    Ok(recv_buf)
}

/// How an upstream endpoint is reached: the OS network stack, or a
/// dial through the overlay for subnet-routed resolvers. Overlay
/// dialing is selected per request, only for overlay clients.
#[derive(Clone)]
pub enum DialPath {
    Os,
    Overlay(Arc<dyn OverlayNetwork>),
}

impl DialPath {
    pub async fn exchange(
        &self,
        payload: &[u8],
        endpoint: SocketAddr,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        match self {
            DialPath::Os => udp_exchange(payload, endpoint, timeout).await,
            DialPath::Overlay(overlay) => overlay.exchange(payload, endpoint, timeout).await,
        }
    }
}
