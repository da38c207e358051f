//! Field-level validation for inbound wire events.
//!
//! Mirrors the shape of a typical form-validation module: small, free
//! functions registered on struct fields via `#[validate(custom(...))]`.
//! Bounds here are conservative, documented choices rather than
//! protocol-mandated limits.

use std::borrow::Cow;

use validator::ValidationError;

pub fn username(username: &str) -> Result<(), ValidationError> {
    let len = username.len();

    if len == 0 || len > 64 {
        return Err(ValidationError::new("length").with_message(Cow::Borrowed(
            "Must be between 1 and 64 characters long.",
        )));
    }

    Ok(())
}

pub fn user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.is_empty() || user_id.len() > 128 {
        return Err(ValidationError::new("length")
            .with_message(Cow::Borrowed("Must be between 1 and 128 characters long.")));
    }

    Ok(())
}
