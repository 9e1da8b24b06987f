//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time, providing immediate feedback for invalid values.

use crate::config;

/// Validate a tenant id.
pub fn validate_tenant(s: &str) -> Result<String, String> {
    config::validate_id("tenant", s).map_err(|e| e.to_string())
}

/// Validate a product id.
pub fn validate_product(s: &str) -> Result<String, String> {
    config::validate_id("product", s).map_err(|e| e.to_string())
}

/// Validate a user id.
pub fn validate_user(s: &str) -> Result<String, String> {
    config::validate_id("user", s).map_err(|e| e.to_string())
}

/// Validate a display name: non-empty after trimming.
pub fn validate_name(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}
