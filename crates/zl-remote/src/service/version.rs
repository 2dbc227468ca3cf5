//! Service version parsing and the web-client version gate

/// First release whose web mode can serve browser clients
const MIN_SUPPORTED: (u64, u64) = (0, 43);

/// Extract `<major>.<minor>.<patch>` from `--version` output such as
/// `"zellij 0.43.1"`. Returns `None` when no dotted version is present.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .split_whitespace()
        .map(|word| word.trim_start_matches('v'))
        .find(|word| {
            let mut parts = word.split('.');
            parts.clone().count() >= 2 && parts.all(|p| !p.is_empty() && p.parse::<u64>().is_ok())
        })
        .map(str::to_string)
}

/// Whether `version` is new enough for the web client.
///
/// Unparseable input is treated as unsupported.
pub fn is_version_supported(version: &str) -> bool {
    let mut parts = version.trim().split('.').map(|p| p.parse::<u64>());
    match (parts.next(), parts.next()) {
        (Some(Ok(major)), Some(Ok(minor))) => (major, minor) >= MIN_SUPPORTED,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_gate() {
        assert!(!is_version_supported("0.42.9"));
        assert!(is_version_supported("0.43.0"));
        assert!(is_version_supported("0.44.2"));
        assert!(is_version_supported("1.0.0"));
    }

    #[test]
    fn test_version_gate_unparseable() {
        assert!(!is_version_supported(""));
        assert!(!is_version_supported("latest"));
        assert!(!is_version_supported("1"));
        assert!(!is_version_supported("x.43.0"));
    }

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("zellij 0.43.1\n").as_deref(), Some("0.43.1"));
        assert_eq!(parse_version("zellij v0.40.0").as_deref(), Some("0.40.0"));
        assert_eq!(parse_version("zellij").as_deref(), None);
        assert_eq!(parse_version("").as_deref(), None);
    }
}
