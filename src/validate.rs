//! Input validation shared by the store, adapters and both front ends.

use url::Url;
use uuid::Uuid;

use crate::error::{Error, Result};

const MAX_TAG_LEN: usize = 32;
const MAX_LABEL_LEN: usize = 200;

/// Tags (task kinds, completion methods) are `[a-z0-9_]{1,32}`.
pub fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= MAX_TAG_LEN
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

pub fn validate_tag(field: &str, tag: &str) -> Result<()> {
    if is_valid_tag(tag) {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "{field} '{tag}' must match [a-z0-9_] and be 1-{MAX_TAG_LEN} characters"
        )))
    }
}

/// Parse an absolute http(s) URL.
pub fn parse_web_url(field: &str, raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|err| Error::InvalidArgument(format!("invalid {field} URL '{raw}': {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidArgument(format!(
            "{field} URL must use http or https, got '{other}'"
        ))),
    }
}

pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!("missing {field}")));
    }
    if trimmed.chars().count() > MAX_LABEL_LEN {
        return Err(Error::InvalidArgument(format!(
            "{field} must be at most {MAX_LABEL_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// Parse an id that must be a UUID; anything else is a validation failure.
pub fn parse_id(field: &str, raw: &str) -> Result<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidArgument(format!("missing {field}")));
    }
    Uuid::parse_str(raw).map_err(|_| Error::InvalidArgument(format!("{field} is not a valid id: '{raw}'")))
}

/// `#rgb` or `#rrggbb`.
pub fn validate_brand_color(color: &str) -> Result<()> {
    let hex = color.strip_prefix('#').unwrap_or("");
    let ok = matches!(hex.len(), 3 | 6) && hex.bytes().all(|b| b.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!(
            "brand color '{color}' must be a hex color like #1a2b3c"
        )))
    }
}
