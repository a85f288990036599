use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Address of the interface used for outbound traffic.
///
/// Connecting a UDP socket sends no packets; it only makes the kernel pick
/// a route and source address.
pub fn external_ip() -> std::io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9))?;
    let ip = socket.local_addr()?.ip();
    if ip.is_unspecified() || ip.is_loopback() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "no routable interface",
        ));
    }
    Ok(ip)
}

/// Build the base URL of a peer. Registered addresses without a port get
/// `default_port`.
pub fn peer_base_url(addr: &str, default_port: u16) -> String {
    if addr.parse::<std::net::SocketAddr>().is_ok() || has_port(addr) {
        format!("http://{}", addr)
    } else {
        format!("http://{}:{}", addr, default_port)
    }
}

fn has_port(addr: &str) -> bool {
    // hostname:port; bare IPv6 addresses are handled by the SocketAddr parse
    addr.parse::<IpAddr>().is_err()
        && addr
            .rsplit_once(':')
            .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_base_url() {
        assert_eq!(peer_base_url("10.0.0.5", 8080), "http://10.0.0.5:8080");
        assert_eq!(peer_base_url("10.0.0.5:9000", 8080), "http://10.0.0.5:9000");
        assert_eq!(peer_base_url("monitor-2:9000", 8080), "http://monitor-2:9000");
        assert_eq!(peer_base_url("monitor-2", 8080), "http://monitor-2:8080");
    }
}
