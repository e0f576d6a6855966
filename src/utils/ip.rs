use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// True for anything that is not a routable public address: loopback,
/// private ranges, link-local (cloud metadata lives there), carrier-grade
/// NAT, unspecified, broadcast and multicast.
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_private_v4(&v4),
            None => is_private_v6(v6),
        },
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || a == 0
        // 100.64.0.0/10
        || (a == 100 && (b & 0xc0) == 64)
}

fn is_private_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn private_and_local_ipv4() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"169.254.169.254".parse().unwrap()));
        assert!(is_private_or_local(&"100.100.100.200".parse().unwrap()));
        assert!(is_private_or_local(&"0.0.0.0".parse().unwrap()));
        assert!(is_private_or_local(&"255.255.255.255".parse().unwrap()));

        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"100.128.0.1".parse().unwrap()));
    }

    #[test]
    fn private_and_local_ipv6() {
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"::".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(is_private_or_local(&"::ffff:127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::ffff:169.254.169.254".parse().unwrap()));

        assert!(!is_private_or_local(&"2001:4860:4860::8888".parse().unwrap()));
        assert!(!is_private_or_local(&"::ffff:8.8.8.8".parse().unwrap()));
    }
}
