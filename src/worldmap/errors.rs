use thiserror::Error;

/// Errors that can arise while validating or mutating the world map.
#[derive(Debug, Error)]
pub enum WorldMapError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, document reads, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON document parse errors at the load boundary.
    #[error("document error: {0}")]
    Document(#[from] serde_json::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// Malformed or out-of-range input, detected before any mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate edge, duplicate keyboard shortcut, or duplicate identifier.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An edge or spawn reference points at a location that does not exist.
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    /// Spawn-rate sum over active entries would exceed 1.0.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Operation blocked by game state (occupying player, dependent records).
    #[error("business rule: {0}")]
    BusinessRule(String),
}

impl WorldMapError {
    /// True when the error was detected before any write happened, meaning the
    /// stores are guaranteed untouched.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            WorldMapError::Validation(_)
                | WorldMapError::Conflict(_)
                | WorldMapError::ReferentialIntegrity(_)
                | WorldMapError::ConstraintViolation(_)
                | WorldMapError::BusinessRule(_)
        )
    }
}
