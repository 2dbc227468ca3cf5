//! Overlay network (Tailscale) address lookup on the remote host

use std::net::Ipv4Addr;

/// Remote command printing the host's overlay IPv4 addresses, one per line
pub const OVERLAY_ADDRESS_COMMAND: &str = "tailscale ip -4 2>/dev/null";

/// First valid IPv4 address in the command output
pub fn parse_overlay_address(stdout: &str) -> Option<Ipv4Addr> {
    stdout
        .lines()
        .map(str::trim)
        .find_map(|line| line.parse::<Ipv4Addr>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_first_address() {
        let out = "100.64.1.50\n100.64.1.51\n";
        assert_eq!(
            parse_overlay_address(out),
            Some(Ipv4Addr::new(100, 64, 1, 50))
        );
    }

    #[test]
    fn test_parse_skips_noise() {
        let out = "  \nnot an ip\n 100.101.102.103 \n";
        assert_eq!(
            parse_overlay_address(out),
            Some(Ipv4Addr::new(100, 101, 102, 103))
        );
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(parse_overlay_address(""), None);
        assert_eq!(parse_overlay_address("fd7a:115c::1\n"), None);
    }
}
