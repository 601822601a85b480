use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::net::lookup_host;

use crate::util::timeout_with_context;

/// Resolves `host` to the IPv4 socket addresses for `port`, deduplicated in resolver order.
pub async fn resolve_ipv4(host: &str, port: u16, timeout_dur: Duration) -> Result<Vec<SocketAddr>> {
    if host.is_empty() {
        bail!("request did not name an origin host");
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return literal_ipv4(ip, port, host);
    }

    let lookup = lookup_host((host, port));
    let addrs = timeout_with_context(
        timeout_dur,
        lookup,
        format!("resolving DNS for {host}:{port}"),
    )
    .await?;
    let ipv4 = ipv4_only(addrs);
    if ipv4.is_empty() {
        bail!("DNS lookup for {host}:{port} returned no IPv4 addresses");
    }
    Ok(ipv4)
}

fn literal_ipv4(ip: IpAddr, port: u16, host: &str) -> Result<Vec<SocketAddr>> {
    match ip {
        IpAddr::V4(_) => Ok(vec![SocketAddr::new(ip, port)]),
        IpAddr::V6(_) => bail!("origin {host} is an IPv6 literal; only IPv4 origins are supported"),
    }
}

fn ipv4_only(addrs: impl IntoIterator<Item = SocketAddr>) -> Vec<SocketAddr> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for addr in addrs {
        if addr.is_ipv4() && seen.insert(addr) {
            unique.push(addr);
        }
    }
    unique
}
