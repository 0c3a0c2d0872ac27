//! Outbound interface discovery.

use anyhow::{Context, Result};
use std::net::{IpAddr, UdpSocket};

use super::RealRuntime;

/// Any routable address works; UDP connect sends no packets.
const PROBE_ADDR: &str = "8.8.8.8:80";

impl RealRuntime {
    #[tracing::instrument(skip(self))]
    pub(crate) fn outbound_ip_impl(&self) -> Result<IpAddr> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("Failed to bind probe socket")?;
        socket
            .connect(PROBE_ADDR)
            .context("Failed to route probe socket")?;
        let addr = socket
            .local_addr()
            .context("Failed to read local address")?;
        Ok(addr.ip())
    }
}
