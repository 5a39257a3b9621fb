pub mod delivery;
pub mod product;
pub mod reorder;
pub mod role;
pub mod supplier;
pub mod user;

use thiserror::Error;

/// A request payload broke a field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        ValidationError(message.into())
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn require_email(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ValidationError::new("email must be a valid address")),
    }
}

/// Blank optional text is stored as absent.
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_local_part_and_dotted_domain() {
        assert!(require_email("sales@acme.io").is_ok());
        assert!(require_email("  ops@north.example.com ").is_ok());
        assert!(require_email("acme.io").is_err());
        assert!(require_email("@acme.io").is_err());
        assert!(require_email("sales@localhost").is_err());
    }

    #[test]
    fn blank_text_becomes_none() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(Some(" Dock 4 ")), Some("Dock 4".to_string()));
        assert_eq!(non_blank(None), None);
    }
}
