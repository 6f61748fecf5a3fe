//! Input validation shared by the graph service and the config load boundary.
//!
//! Location ids end up in store keys, index keys, and exported JSON, so the
//! accepted alphabet is deliberately narrow: lowercase ascii letters, digits,
//! and underscores, starting with a letter. Display names are free-form
//! (production worlds use Japanese names) and only length-checked.

use std::collections::HashSet;

/// Location id validation errors with helpful messages.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    #[error("id is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("id is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("id must start with a lowercase letter")]
    BadLeadingChar,

    #[error("id contains invalid characters: {chars}")]
    InvalidCharacters { chars: String },

    #[error("id is a reserved name")]
    Reserved,
}

pub const ID_MIN_LENGTH: usize = 2;
pub const ID_MAX_LENGTH: usize = 64;
pub const NAME_MAX_LENGTH: usize = 120;

/// Ids that collide with key-prefix machinery or CLI keywords.
fn reserved_ids() -> HashSet<&'static str> {
    ["all", "none", "new", "world"].into_iter().collect()
}

/// Check a location id against the store-key alphabet.
pub fn validate_location_id(id: &str) -> Result<(), IdError> {
    if id.len() < ID_MIN_LENGTH {
        return Err(IdError::TooShort { min: ID_MIN_LENGTH });
    }
    if id.len() > ID_MAX_LENGTH {
        return Err(IdError::TooLong { max: ID_MAX_LENGTH });
    }
    let first = id.chars().next().unwrap_or(' ');
    if !first.is_ascii_lowercase() {
        return Err(IdError::BadLeadingChar);
    }
    let bad: String = id
        .chars()
        .filter(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
        .collect();
    if !bad.is_empty() {
        return Err(IdError::InvalidCharacters { chars: bad });
    }
    if reserved_ids().contains(id) {
        return Err(IdError::Reserved);
    }
    Ok(())
}

/// Display names are free-form but bounded, so admin screens and logs stay
/// sane.
pub fn validate_display_name(name: &str) -> Result<(), IdError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IdError::TooShort { min: 1 });
    }
    if trimmed.chars().count() > NAME_MAX_LENGTH {
        return Err(IdError::TooLong {
            max: NAME_MAX_LENGTH,
        });
    }
    Ok(())
}

/// Spawn rates are probabilities.
pub fn spawn_rate_in_bounds(rate: f64) -> bool {
    rate.is_finite() && (0.0..=1.0).contains(&rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_ids() {
        assert!(validate_location_id("road_1").is_ok());
        assert!(validate_location_id("mosscap_cave").is_ok());
        assert!(validate_location_id("t2").is_ok());
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(
            validate_location_id("r"),
            Err(IdError::TooShort { .. })
        ));
        assert!(matches!(
            validate_location_id("1road"),
            Err(IdError::BadLeadingChar)
        ));
        assert!(matches!(
            validate_location_id("Road-1"),
            Err(IdError::BadLeadingChar)
        ));
        assert!(matches!(
            validate_location_id("road:1"),
            Err(IdError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_location_id("world"),
            Err(IdError::Reserved)
        ));
        let long = "a".repeat(ID_MAX_LENGTH + 1);
        assert!(matches!(
            validate_location_id(&long),
            Err(IdError::TooLong { .. })
        ));
    }

    #[test]
    fn display_names_allow_unicode() {
        assert!(validate_display_name("古代洞窟").is_ok());
        assert!(validate_display_name("  ").is_err());
    }

    #[test]
    fn spawn_rate_bounds() {
        assert!(spawn_rate_in_bounds(0.0));
        assert!(spawn_rate_in_bounds(1.0));
        assert!(!spawn_rate_in_bounds(-0.1));
        assert!(!spawn_rate_in_bounds(1.1));
        assert!(!spawn_rate_in_bounds(f64::NAN));
    }
}
