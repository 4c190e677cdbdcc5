//! UUID utilities
//!
//! Canonical records are keyed by opaque v4 UUIDs stored as text.

use uuid::Uuid;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse UUID from string
pub fn parse(s: &str) -> crate::Result<Uuid> {
    Ok(Uuid::parse_str(s)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_parse() {
        let id = generate();
        assert_eq!(parse(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("doi:10.1/x").is_err());
    }
}
