use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use thiserror::Error;
use tracing::{debug, info};

use crate::{ClientId, SERVER_CLIENT_ID};

/// Probe target used when the server itself is reached over loopback.
const FALLBACK_ROUTE: (&str, u16) = ("192.0.2.1", 9);
/// Discard port; the probe never sends anything.
const PROBE_PORT: u16 = 9;

#[derive(Debug, Error)]
pub enum AddressResolutionFailure {
    #[error("cannot route towards {target}: {source}")]
    Route {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("local address {0} is not a usable IPv4 address")]
    Unusable(IpAddr),
}

fn route_source(target: (&str, u16)) -> Result<Ipv4Addr, AddressResolutionFailure> {
    let route_err = |source| AddressResolutionFailure::Route {
        target: format!("{}:{}", target.0, target.1),
        source,
    };
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(route_err)?;
    socket.connect(target).map_err(route_err)?;
    match socket.local_addr().map_err(route_err)?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Ok(ip),
        other => Err(AddressResolutionFailure::Unusable(other)),
    }
}

/// Local IPv4 address of the interface that routes towards `server`.
///
/// Connecting a UDP socket only selects a route; no packet leaves the host.
/// A loopback server falls back to the default route.
pub fn local_ipv4(server: &str) -> Result<Ipv4Addr, AddressResolutionFailure> {
    match route_source((server, PROBE_PORT)) {
        Ok(ip) => Ok(ip),
        Err(AddressResolutionFailure::Unusable(ip)) if ip.is_loopback() => {
            route_source(FALLBACK_ROUTE)
        }
        Err(err) => Err(err),
    }
}

/// Last octet of the local IPv4 address, or [`SERVER_CLIENT_ID`] when none is usable.
pub fn derive_client_id(server: &str) -> ClientId {
    match local_ipv4(server) {
        Ok(ip) => {
            let id = ip.octets()[3];
            info!(%ip, client_id = id, "client id derived");
            id
        }
        Err(err) => {
            debug!(%err, "address resolution failed, using sentinel id");
            SERVER_CLIENT_ID
        }
    }
}
