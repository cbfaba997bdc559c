//! Tag name validation.
//!
//! Tag names map directly onto files under `tags/`, so `/` separates
//! directories. Valid names:
//! - Must be non-empty and relative (no leading `/`)
//! - Must not contain whitespace, control characters, or `\`
//! - Must not contain empty components (`//`, trailing `/`)
//! - No component may start with `.` (this also rules out `.` and `..`)

use crate::error::{RefError, Result};

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidTagName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a tag name, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use lineage_refs::names::validate_tag_name;
///
/// assert!(validate_tag_name("c2rust/latest").is_ok());
/// assert!(validate_tag_name("").is_err());
/// assert!(validate_tag_name("../escape").is_err());
/// ```
pub fn validate_tag_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "tag name must not be empty"));
    }

    if let Some(ch) = name
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || *c == '\\')
    {
        return Err(invalid(name, format!("contains forbidden character: {ch:?}")));
    }

    if name.starts_with('/') {
        return Err(invalid(name, "must be relative"));
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err(invalid(name, "path components must not be empty"));
        }
        if component.starts_with('.') {
            return Err(invalid(
                name,
                format!("component must not start with '.': {component:?}"),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_names() {
        for name in ["latest", "run-3/transpiled", "a_b.c", "2025-01-01"] {
            assert!(validate_tag_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn invalid_names() {
        for name in [
            "",
            "/abs",
            "a//b",
            "trailing/",
            "..",
            "a/../b",
            ".hidden",
            "dir/.x",
            "with space",
            "tab\there",
            "back\\slash",
            "nul\0",
        ] {
            assert!(
                matches!(
                    validate_tag_name(name),
                    Err(RefError::InvalidTagName { .. })
                ),
                "{name:?}"
            );
        }
    }
}
