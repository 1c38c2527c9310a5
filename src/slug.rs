//! Slug rules for public link paths.
//!
//! A slug is 3-50 characters of `[a-z0-9-]`, with no leading, trailing or
//! doubled hyphen. Slugs are immutable once a link is created.

use crate::error::{Error, Result};

pub const MIN_SLUG_LEN: usize = 3;
pub const MAX_SLUG_LEN: usize = 50;

pub fn is_valid_slug(slug: &str) -> bool {
    if slug.len() < MIN_SLUG_LEN || slug.len() > MAX_SLUG_LEN {
        return false;
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return false;
    }
    !(slug.starts_with('-') || slug.ends_with('-') || slug.contains("--"))
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "invalid slug '{slug}': use {MIN_SLUG_LEN}-{MAX_SLUG_LEN} lowercase letters, digits or single hyphens"
        )))
    }
}

/// Lowercase, map every other character to `-`, collapse runs, strip edges.
pub fn sanitize_slug(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.trim().to_lowercase().chars() {
        let ch = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    out.trim_matches('-').to_string()
}

/// Derive a slug from free text (e.g. a link title).
pub fn generate_slug(input: &str) -> Result<String> {
    if input.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "input must be a non-empty string".to_string(),
        ));
    }

    let slug = sanitize_slug(input);
    if slug.len() < MIN_SLUG_LEN {
        return Err(Error::InvalidArgument(format!(
            "slug must be at least {MIN_SLUG_LEN} characters long"
        )));
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(Error::InvalidArgument(format!(
            "slug must be no more than {MAX_SLUG_LEN} characters long"
        )));
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_slugs() {
        for slug in ["hello-world", "my-awesome-link", "test123", "a-b-c", "abc"] {
            assert!(is_valid_slug(slug), "{slug} should be valid");
        }
        assert!(is_valid_slug(&"a".repeat(50)));
    }

    #[test]
    fn invalid_slugs() {
        let too_long = "a".repeat(51);
        for slug in [
            "",
            "ab",
            too_long.as_str(),
            "Hello-World",
            "hello_world",
            "hello@world",
            "-hello",
            "hello-",
            "hello--world",
        ] {
            assert!(!is_valid_slug(slug), "{slug} should be invalid");
        }
        assert!(matches!(validate_slug("ab"), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_slug("HELLO"), "hello");
        assert_eq!(sanitize_slug("hello world"), "hello-world");
        assert_eq!(sanitize_slug("hello@world!"), "hello-world");
        assert_eq!(sanitize_slug("hello---world"), "hello-world");
        assert_eq!(sanitize_slug("-hello-world-"), "hello-world");
        assert_eq!(sanitize_slug(""), "");
    }

    #[test]
    fn generate() {
        assert_eq!(generate_slug("My Awesome Link").unwrap(), "my-awesome-link");
        assert_eq!(generate_slug("Hello@World!").unwrap(), "hello-world");
        assert_eq!(generate_slug("abc").unwrap(), "abc");
        assert_eq!(generate_slug(&"a".repeat(50)).unwrap(), "a".repeat(50));

        let empty = generate_slug("").unwrap_err().to_string();
        assert!(empty.contains("non-empty"));
        let short = generate_slug("ab").unwrap_err().to_string();
        assert!(short.contains("at least 3"));
        let long = generate_slug(&"a".repeat(51)).unwrap_err().to_string();
        assert!(long.contains("no more than 50"));
    }
}
