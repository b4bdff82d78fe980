//! TCP listener over a port range.
//!
//! # Responsibilities
//! - Bind the first free port of the configured range
//! - Apply `SO_REUSEADDR` and the configured accept backlog
//! - Accept incoming TCP connections
//! - Optionally resolve peer names with reverse DNS

use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::PortRange;
use crate::error::ConnectorError;

/// A bound TCP listener.
pub struct Listener {
    /// The underlying TCP listener.
    inner: TcpListener,
    /// Reverse DNS resolver, present when name lookup is enabled.
    resolver: Option<TokioAsyncResolver>,
}

impl Listener {
    /// Bind to `host` on the first free port of `ports`.
    ///
    /// `host` is an IP literal or a name resolved through the system
    /// resolver; every resolved address is tried for each port. Fails with
    /// [`ConnectorError::Bind`] when no port of the range can be bound; the
    /// error carries the last failure.
    pub async fn bind(
        host: &str,
        ports: PortRange,
        backlog: u32,
        perform_name_lookup: bool,
    ) -> Result<Self, ConnectorError> {
        let bind_error = |source| ConnectorError::Bind {
            address: format!("{}:{}", host, ports),
            source,
        };
        let ips = resolve_host(host).await.map_err(bind_error)?;

        let mut last_error = None;
        for port in ports.ports() {
            for ip in &ips {
                let addr = SocketAddr::new(*ip, port);
                match bind_one(addr, backlog) {
                    Ok(inner) => {
                        let local_addr = inner.local_addr()?;
                        tracing::info!(address = %local_addr, backlog, "Listener bound");
                        return Ok(Self {
                            inner,
                            resolver: if perform_name_lookup { make_resolver() } else { None },
                        });
                    }
                    Err(e) => {
                        tracing::debug!(address = %addr, error = %e, "Port unavailable");
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(bind_error(last_error.unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "empty port range")
        })))
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner.accept().await?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Resolver to use for peer names, if lookup is enabled.
    pub fn resolver(&self) -> Option<TokioAsyncResolver> {
        self.resolver.clone()
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }
}

/// Addresses to bind for `host`, IPv4 first.
async fn resolve_host(host: &str) -> std::io::Result<Vec<IpAddr>> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }

    let mut ips: Vec<IpAddr> = Vec::new();
    for addr in tokio::net::lookup_host((host, 0)).await? {
        if !ips.contains(&addr.ip()) {
            ips.push(addr.ip());
        }
    }
    ips.sort_by_key(|ip| ip.is_ipv6());
    if ips.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses for host '{}'", host),
        ));
    }
    tracing::debug!(host, addresses = ?ips, "Resolved bind host");
    Ok(ips)
}

fn bind_one(addr: SocketAddr, backlog: u32) -> std::io::Result<TcpListener> {
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

fn make_resolver() -> Option<TokioAsyncResolver> {
    match TokioAsyncResolver::tokio_from_system_conf() {
        Ok(resolver) => Some(resolver),
        Err(e) => {
            tracing::warn!(error = %e, "Reverse DNS unavailable, using peer addresses");
            None
        }
    }
}

/// Reverse-resolve a peer address, returning `None` on any failure.
pub async fn lookup_peer_name(resolver: &TokioAsyncResolver, ip: IpAddr) -> Option<String> {
    match resolver.reverse_lookup(ip).await {
        Ok(lookup) => lookup
            .iter()
            .next()
            .map(|name| name.to_string().trim_end_matches('.').to_string()),
        Err(e) => {
            tracing::trace!(ip = %ip, error = %e, "Reverse lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn binds_ephemeral_port() {
        let listener = Listener::bind("127.0.0.1", PortRange::single(0), 16, false)
            .await
            .unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);
        assert!(listener.resolver().is_none());
    }

    #[tokio::test]
    async fn taken_port_is_bind_error() {
        let first = Listener::bind("127.0.0.1", PortRange::single(0), 16, false)
            .await
            .unwrap();
        let taken = first.local_addr().unwrap().port();

        // A listening socket keeps the port even with SO_REUSEADDR set.
        let err = Listener::bind("127.0.0.1", PortRange::single(taken), 16, false)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::Bind { .. }));
    }

    #[tokio::test]
    async fn binds_host_name() {
        let listener = Listener::bind("localhost", PortRange::single(0), 16, false)
            .await
            .unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }

    #[tokio::test]
    async fn rejects_bad_host() {
        let err = Listener::bind("not an ip", PortRange::single(0), 16, false)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("not an ip"));
    }
}
