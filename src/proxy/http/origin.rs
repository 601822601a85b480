use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::proxy::request::Request;
use crate::proxy::resolver::resolve_ipv4;
use crate::proxy::session_error::{OriginStage, OriginUnavailable};
use crate::proxy::target::ResolvedTarget;
use crate::proxy::upstream::connect_to_addrs;
use crate::settings::Settings;
use crate::util::timeout_with_context;

use super::codec::OriginResponse;

/// Fetches a resource from its origin over a fresh connection that the origin closes when the
/// response is complete.
#[derive(Debug, Clone)]
pub struct OriginClient {
    port: u16,
    connect_timeout: Duration,
    response_timeout: Duration,
    permits: Arc<Semaphore>,
}

#[derive(Debug)]
pub struct OriginExchange {
    pub addr: SocketAddr,
    pub response: OriginResponse,
}

impl OriginClient {
    pub fn new(
        port: u16,
        connect_timeout: Duration,
        response_timeout: Duration,
        max_connections: usize,
    ) -> Self {
        Self {
            port,
            connect_timeout,
            response_timeout,
            permits: Arc::new(Semaphore::new(max_connections)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.origin_port,
            settings.upstream_connect_timeout(),
            settings.upstream_timeout(),
            settings.max_origin_connections,
        )
    }

    pub async fn fetch(
        &self,
        request: &Request,
        target: &ResolvedTarget,
    ) -> Result<OriginExchange, OriginUnavailable> {
        let host = target.hostname.as_str();
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|err| OriginUnavailable::new(host, OriginStage::Connect, err))?;

        let addrs = resolve_ipv4(host, self.port, self.connect_timeout)
            .await
            .map_err(|err| OriginUnavailable::new(host, OriginStage::Resolve, err))?;
        info!(host, "connecting to origin");
        let (mut stream, addr) = connect_to_addrs(&addrs, self.connect_timeout)
            .await
            .map_err(|err| OriginUnavailable::new(host, OriginStage::Connect, err))?;

        let outbound = build_origin_request(request, target);
        debug!(host, request = %outbound.trim_end(), "forwarding request to origin");
        timeout_with_context(
            self.response_timeout,
            stream.write_all(outbound.as_bytes()),
            format!("sending request to {addr}"),
        )
        .await
        .map_err(|err| OriginUnavailable::new(host, OriginStage::Send, err))?;

        let mut raw = Vec::new();
        timeout_with_context(
            self.response_timeout,
            stream.read_to_end(&mut raw),
            format!("reading response from {addr}"),
        )
        .await
        .map_err(|err| OriginUnavailable::new(host, OriginStage::Receive, err))?;

        let response = OriginResponse::from_raw(Bytes::from(raw));
        info!(
            host,
            upstream = %addr,
            status_line = %response.status_line,
            bytes = response.len(),
            "origin response received"
        );
        Ok(OriginExchange { addr, response })
    }
}

/// Request line plus a single Host header; client headers are not forwarded.
pub(crate) fn build_origin_request(request: &Request, target: &ResolvedTarget) -> String {
    format!(
        "{}\r\nHost: {}\r\n\r\n",
        request.origin_request_line(&target.resource_path),
        target.hostname
    )
}
