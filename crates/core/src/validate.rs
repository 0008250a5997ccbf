//! Small input checks shared by the request types of every domain crate.

use crate::error::{DomainError, DomainResult};

/// Reject blank strings; returns the trimmed value.
pub fn non_blank(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_string())
}

/// Enforce an inclusive character-count range.
pub fn char_len(field: &str, value: &str, min: usize, max: usize) -> DomainResult<()> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(DomainError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

/// Enforce a maximum character count on an optional field.
pub fn max_len(field: &str, value: Option<&str>, max: usize) -> DomainResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(DomainError::validation(format!(
            "{field} must be at most {max} characters"
        ))),
        _ => Ok(()),
    }
}

/// Canonical form used for storage and lookup of email addresses.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn email(field: &str, value: &str) -> DomainResult<String> {
    let normalized = normalize_email(value);
    let valid = match normalized.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !normalized.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("{field} must be a valid email address")));
    }
    Ok(normalized)
}

/// Absolute http(s) URL with a host.
///
/// Embedded whitespace or control characters are rejected outright; the URL
/// parser would otherwise silently strip tabs and newlines.
pub fn url(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    let invalid = || DomainError::validation(format!("{field} must be an http(s) URL"));
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid());
    }
    let parsed = url::Url::parse(trimmed).map_err(|_| invalid())?;
    let has_host = parsed.host_str().is_some_and(|h| !h.is_empty());
    if !matches!(parsed.scheme(), "http" | "https") || !has_host {
        return Err(invalid());
    }
    Ok(trimmed.to_string())
}
