//! Auth token extraction from `web --create-token` output

use std::sync::OnceLock;

use regex::Regex;

use zl_core::config::TokenParser;
use zl_core::error::ServiceError;

/// Bare output shorter than this is not accepted as a token
const MIN_BARE_TOKEN_LEN: usize = 20;

fn ansi_regex() -> &'static Regex {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    ANSI.get_or_init(|| Regex::new(r"\x1b\[[;\d]*m").expect("ANSI regex should compile"))
}

fn labelled_regex() -> &'static Regex {
    static LABELLED: OnceLock<Regex> = OnceLock::new();
    LABELLED.get_or_init(|| {
        Regex::new(r"token_\d+:\s*([a-f0-9\-]+)").expect("labelled token regex should compile")
    })
}

fn uuid_regex() -> &'static Regex {
    static UUID: OnceLock<Regex> = OnceLock::new();
    UUID.get_or_init(|| {
        Regex::new(r"[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}")
            .expect("UUID regex should compile")
    })
}

/// Remove SGR escape sequences (`ESC [ ... m`)
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Extract the auth token from command output using `parser`
pub fn extract_token(output: &str, parser: TokenParser) -> Result<String, ServiceError> {
    match parser {
        TokenParser::Strict => extract_strict(output),
        TokenParser::Legacy => extract_legacy(output),
    }
}

fn extract_strict(output: &str) -> Result<String, ServiceError> {
    let clean = strip_ansi(output);

    if let Some(token) = labelled_regex()
        .captures(&clean)
        .and_then(|caps| caps.get(1))
    {
        return Ok(token.as_str().to_string());
    }

    if let Some(found) = uuid_regex().find(&clean) {
        return Ok(found.as_str().to_string());
    }

    let trimmed = clean.trim();
    if trimmed.len() > MIN_BARE_TOKEN_LEN {
        return Ok(trimmed.to_string());
    }

    Err(ServiceError::StartupFailed(format!(
        "Failed to parse auth token from output: {}",
        clean
    )))
}

fn extract_legacy(output: &str) -> Result<String, ServiceError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::StartupFailed(
            "Token creation produced no output".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "40cfd772-e052-43a0-8acf-e64b1b8825fb";

    #[test]
    fn test_patterns_compile() {
        assert!(ansi_regex().is_match("\x1b[1;32m"));
        assert!(labelled_regex().is_match("token_1: abc"));
        assert!(uuid_regex().is_match("40cfd772-e052-43a0-8acf-e64b1b8825fb"));
    }

    #[test]
    fn test_labelled_token() {
        let output = format!("Created token successfully\n\ntoken_1: {}", TOKEN);
        assert_eq!(extract_token(&output, TokenParser::Strict).unwrap(), TOKEN);
    }

    #[test]
    fn test_labelled_token_with_ansi() {
        let output = format!("\x1b[1;32mCreated token successfully\x1b[0m\n\ntoken_12: \x1b[1m{}\x1b[0m\n", TOKEN);
        assert_eq!(extract_token(&output, TokenParser::Strict).unwrap(), TOKEN);
    }

    #[test]
    fn test_bare_uuid() {
        assert_eq!(extract_token(TOKEN, TokenParser::Strict).unwrap(), TOKEN);
        let noisy = format!("your token is {} keep it safe", TOKEN);
        assert_eq!(extract_token(&noisy, TokenParser::Strict).unwrap(), TOKEN);
    }

    #[test]
    fn test_long_bare_output() {
        let output = "  abcdefghijklmnopqrstuvwxyz0123  \n";
        assert_eq!(
            extract_token(output, TokenParser::Strict).unwrap(),
            "abcdefghijklmnopqrstuvwxyz0123"
        );
    }

    #[test]
    fn test_strict_rejects_short_and_empty() {
        assert!(matches!(
            extract_token("", TokenParser::Strict),
            Err(ServiceError::StartupFailed(_))
        ));
        assert!(matches!(
            extract_token("error: nope", TokenParser::Strict),
            Err(ServiceError::StartupFailed(_))
        ));
    }

    #[test]
    fn test_legacy_parser() {
        assert_eq!(extract_token(" abc \n", TokenParser::Legacy).unwrap(), "abc");
        assert!(extract_token("  \n", TokenParser::Legacy).is_err());
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[31mred\x1b[0m plain"), "red plain");
    }
}
