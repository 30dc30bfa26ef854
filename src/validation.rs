/// Input validation for request payloads
///
/// Column names coming from clients end up in SQL text (they cannot be bound
/// as parameters), so every identifier is checked here before use.
use crate::error::{Result, SharplineError};

/// Maximum features in one pattern
pub const MAX_PATTERN_FEATURES: usize = 8;

/// Validate a column/feature identifier: `[a-z_][a-z0-9_]*`, at most 63 bytes
///
/// # Arguments
/// * `name` - Identifier to validate
/// * `field_name` - Name of the field for error messages
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err` if invalid
pub fn validate_identifier(name: &str, field_name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_');
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if !first_ok || !rest_ok || name.len() > 63 {
        return Err(SharplineError::Validation(format!(
            "{} is not a valid column name: {:?}",
            field_name, name
        )));
    }

    Ok(())
}

/// Validate a user id (non-empty, no whitespace)
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(SharplineError::Validation("userId is required".to_string()));
    }

    if user_id.chars().any(char::is_whitespace) {
        return Err(SharplineError::Validation(format!(
            "userId contains whitespace: {:?}",
            user_id
        )));
    }

    Ok(())
}

/// Validate the ordered feature list of a pattern
pub fn validate_features(features: &[String]) -> Result<()> {
    if features.is_empty() {
        return Err(SharplineError::Validation(
            "features must not be empty".to_string(),
        ));
    }

    if features.len() > MAX_PATTERN_FEATURES {
        return Err(SharplineError::Validation(format!(
            "at most {} features allowed, got {}",
            MAX_PATTERN_FEATURES,
            features.len()
        )));
    }

    for (i, f) in features.iter().enumerate() {
        validate_identifier(f, "feature")?;
        if features[..i].contains(f) {
            return Err(SharplineError::Validation(format!(
                "feature listed twice: {}",
                f
            )));
        }
    }

    Ok(())
}

/// Validate an American odds price (|price| >= 100)
pub fn validate_american_odds(price: i32, field_name: &str) -> Result<()> {
    if price.unsigned_abs() < 100 {
        return Err(SharplineError::Validation(format!(
            "{} is not valid American odds: {}",
            field_name, price
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("home_era", "f").is_ok());
        assert!(validate_identifier("_x1", "f").is_ok());
        assert!(validate_identifier("", "f").is_err());
        assert!(validate_identifier("1abc", "f").is_err());
        assert!(validate_identifier("Home_ERA", "f").is_err());
        assert!(validate_identifier("era; drop table x", "f").is_err());
        assert!(validate_identifier("a\"b", "f").is_err());
        assert!(validate_identifier(&"a".repeat(64), "f").is_err());
    }

    #[test]
    fn test_validate_user_id() {
        assert!(validate_user_id("0b7c-11").is_ok());
        assert!(validate_user_id("  ").is_err());
        assert!(validate_user_id("a b").is_err());
    }

    #[test]
    fn test_validate_features() {
        assert!(validate_features(&["home_era".into(), "primary_streak".into()]).is_ok());
        assert!(validate_features(&[]).is_err());
        assert!(validate_features(&["home_era".into(), "home_era".into()]).is_err());
        let too_many: Vec<String> = (0..9).map(|i| format!("f{}", i)).collect();
        assert!(validate_features(&too_many).is_err());
    }

    #[test]
    fn test_validate_american_odds() {
        assert!(validate_american_odds(-110, "price").is_ok());
        assert!(validate_american_odds(100, "price").is_ok());
        assert!(validate_american_odds(50, "price").is_err());
        assert!(validate_american_odds(i32::MIN, "price").is_ok());
    }
}
