//! Port for the overlay network library.
//!
//! The VPN overlay itself (tunnel setup, authentication, peer state)
//! lives outside this crate; the server only needs three things from
//! it, expressed here as a trait so embedders can hand in whatever
//! backend they run. Tests use in-process fakes.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use prismdns_domain::DomainError;

#[async_trait]
pub trait OverlayNetwork: Send + Sync {
    /// DNS suffix of the overlay's own system names, without a
    /// leading dot (for example `mesh.internal`). Queries under this
    /// suffix are answered from the overlay's host table.
    fn dns_suffix(&self) -> &str;

    /// Resolves an overlay hostname to its overlay address.
    async fn lookup_host(&self, host: &str) -> Option<IpAddr>;

    /// One DNS round trip dialed through the overlay, honoring the
    /// per-endpoint deadline. Used to reach resolvers behind
    /// advertised subnet routes.
    async fn exchange(
        &self,
        payload: &[u8],
        endpoint: SocketAddr,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError>;
}
