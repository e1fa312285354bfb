//! Address helpers for host and switch identities

use std::net::Ipv4Addr;

/// Split an `a.b.c.d/len` string into address and prefix length
///
/// A missing prefix is rejected: every host is declared with an explicit
/// network size.
pub fn parse_cidr(value: &str) -> Result<(Ipv4Addr, u8), String> {
    let (addr, prefix) = value
        .split_once('/')
        .ok_or_else(|| format!("Missing prefix length in '{}'", value))?;

    let ip = addr
        .parse::<Ipv4Addr>()
        .map_err(|_| format!("Invalid IPv4 address '{}'", addr))?;
    let prefix_len = prefix
        .parse::<u8>()
        .map_err(|_| format!("Invalid prefix length '{}'", prefix))?;

    if prefix_len > 32 {
        return Err(format!("Prefix length {} exceeds 32", prefix_len));
    }

    Ok((ip, prefix_len))
}

/// Check if a string is a colon separated 48-bit MAC address
pub fn is_valid_mac(mac: &str) -> bool {
    let octets: Vec<&str> = mac.split(':').collect();
    octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Derive a datapath id from the digits in a switch name
///
/// `s1` -> `0000000000000001`, `s10` -> `000000000000000a`. Returns `None`
/// when the name carries no number.
pub fn dpid_from_name(name: &str) -> Option<String> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let number = digits.parse::<u64>().ok()?;
    Some(format!("{:016x}", number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr() {
        assert_eq!(parse_cidr("10.0.0.1/24"), Ok((Ipv4Addr::new(10, 0, 0, 1), 24)));
        assert!(parse_cidr("10.0.0.1").is_err());
        assert!(parse_cidr("10.0.0.256/24").is_err());
        assert!(parse_cidr("10.0.0.1/33").is_err());
        assert!(parse_cidr("10.0.0.1/x").is_err());
    }

    #[test]
    fn test_mac_validation() {
        assert!(is_valid_mac("00:00:00:00:00:01"));
        assert!(is_valid_mac("aa:BB:cc:dd:ee:ff"));
        assert!(!is_valid_mac("00:00:00:00:00"));
        assert!(!is_valid_mac("00:00:00:00:00:0g"));
        assert!(!is_valid_mac("000:00:00:00:00:01"));
    }

    #[test]
    fn test_dpid_from_name() {
        assert_eq!(dpid_from_name("s1").as_deref(), Some("0000000000000001"));
        assert_eq!(dpid_from_name("s10").as_deref(), Some("000000000000000a"));
        assert_eq!(dpid_from_name("core"), None);
    }
}
