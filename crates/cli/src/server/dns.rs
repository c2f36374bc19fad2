//! UDP listener glue: reuse-port worker sockets, one task per
//! datagram, bounded drain on shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use prismdns_infrastructure::dns::QueryHandler;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Grace period for in-flight requests after the listener stops
/// accepting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const RECV_BUFFER_SIZE: usize = 8 * 1024 * 1024;
const SEND_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// Binds one reuse-port socket per worker and spawns the receive
/// loops. Bind errors surface here, before the process goes resident.
pub fn spawn(
    bind_addr: &str,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
) -> anyhow::Result<JoinHandle<()>> {
    let socket_addr: SocketAddr = bind_addr.parse()?;
    let domain = if socket_addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let mut sockets = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        sockets.push(create_udp_socket(domain, socket_addr)?);
    }

    info!(bind_address = %socket_addr, num_workers, "Starting DNS server with SO_REUSEPORT");

    let task = tokio::spawn(async move {
        let mut workers: JoinSet<()> = JoinSet::new();

        for (worker_id, socket) in sockets.into_iter().enumerate() {
            let handler = handler.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move {
                run_udp_worker(Arc::new(socket), handler, shutdown, worker_id).await;
            });
        }

        while workers.join_next().await.is_some() {}
    });

    Ok(task)
}

async fn run_udp_worker(
    socket: Arc<UdpSocket>,
    handler: Arc<QueryHandler>,
    shutdown: CancellationToken,
    worker_id: usize,
) {
    let mut recv_buf = [0u8; 4096];
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            result = socket.recv_from(&mut recv_buf) => {
                let (n, from) = match result {
                    Ok(x) => x,
                    Err(e) => {
                        error!(worker = worker_id, error = %e, "UDP recv error");
                        continue;
                    }
                };

                let payload = recv_buf[..n].to_vec();
                let handler = handler.clone();
                let socket = socket.clone();
                in_flight.spawn(async move {
                    if let Some(response) = handler.handle(&payload, from.ip()).await {
                        let _ = socket.send_to(&response, from).await;
                    }
                });

                // Reap finished request tasks without blocking the loop.
                while in_flight.try_join_next().is_some() {}
            }
        }
    }

    let drain = async {
        while in_flight.join_next().await.is_some() {}
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(
            worker = worker_id,
            "Shutdown grace period elapsed with requests still in flight"
        );
    }
}

fn create_udp_socket(domain: Domain, socket_addr: SocketAddr) -> anyhow::Result<UdpSocket> {
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if socket_addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_recv_buffer_size(RECV_BUFFER_SIZE)?;
    socket.set_send_buffer_size(SEND_BUFFER_SIZE)?;
    socket.bind(&socket_addr.into())?;
    socket.set_nonblocking(true)?;
    let std_socket: std::net::UdpSocket = socket.into();
    Ok(UdpSocket::from_std(std_socket)?)
}
