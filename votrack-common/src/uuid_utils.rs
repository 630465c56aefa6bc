//! UUID utilities

use uuid::Uuid;

use crate::{Error, Result};

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Parse a UUID supplied by a client
pub fn parse(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).map_err(|_| Error::InvalidInput(format!("Invalid id: {}", s)))
}

/// Parse a UUID read back from the database
pub fn from_db(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid stored id '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_garbage_as_invalid_input() {
        assert!(matches!(parse("not-a-uuid"), Err(Error::InvalidInput(_))));
        let id = generate();
        assert_eq!(parse(&format!(" {} ", id)).unwrap(), id);
    }
}
