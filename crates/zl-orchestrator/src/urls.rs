//! URLs handed to the terminal surface

/// Candidate URL probed by direct-mode connects.
///
/// An empty `remote_session` yields the server root.
pub fn direct_url(host: &str, port: u16, remote_session: &str) -> String {
    if remote_session.is_empty() {
        format!("https://{}:{}", host, port)
    } else {
        format!("https://{}:{}/{}", host, port, remote_session)
    }
}

/// Final URL of a bootstrapped session, carrying the auth token
pub fn session_url(host: &str, port: u16, remote_session: &str, token: &str) -> String {
    format!(
        "http://{}:{}/{}?token={}",
        host, port, remote_session, token
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_url() {
        assert_eq!(direct_url("devbox", 8082, "work"), "https://devbox:8082/work");
        assert_eq!(direct_url("devbox", 8082, ""), "https://devbox:8082");
    }

    #[test]
    fn test_session_url() {
        assert_eq!(
            session_url("100.64.1.50", 8082, "work", "40cfd772"),
            "http://100.64.1.50:8082/work?token=40cfd772"
        );
    }
}
