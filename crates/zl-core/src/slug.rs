//! Remote-session name derivation

use crate::types::SessionId;

/// Turn a user-entered name into a remote-session identifier.
///
/// Lowercases ASCII letters, keeps ASCII digits, and collapses every other
/// run of characters into a single hyphen. Leading and trailing hyphens are
/// trimmed. Input that slugifies to nothing yields [`synthesize`]'s output,
/// so the result is never empty.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        synthesize()
    } else {
        slug
    }
}

/// Fresh identifier built from a random id fragment, e.g. `session-1a2b3c4d`
pub fn synthesize() -> String {
    format!("session-{}", SessionId::generate().short())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("My Session!"), "my-session");
        assert_eq!(slugify("work"), "work");
        assert_eq!(slugify("Dev Box 2"), "dev-box-2");
    }

    #[test]
    fn test_slugify_trims_and_collapses() {
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("a__b..c"), "a-b-c");
    }

    #[test]
    fn test_slugify_is_deterministic() {
        assert_eq!(slugify("Proj / API"), slugify("Proj / API"));
    }

    #[test]
    fn test_slugify_empty_falls_back() {
        for input in ["", "   ", "!!!", "ñ"] {
            let slug = slugify(input);
            assert!(slug.starts_with("session-"), "{input:?} -> {slug}");
            assert_eq!(slug.len(), "session-".len() + 8);
        }
    }

    #[test]
    fn test_synthesize_is_fresh() {
        assert_ne!(synthesize(), synthesize());
    }
}
