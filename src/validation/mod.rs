use std::fmt;

use bigdecimal::BigDecimal;

/// Platform bounds for a bill amount, in currency units.
pub const MIN_AMOUNT: u32 = 50;
pub const MAX_AMOUNT: u32 = 5000;

pub const LISTING_TITLE_MAX_LEN: usize = 140;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Strip control characters and collapse runs of whitespace.
pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Sanitize and bound-check a listing title, returning the cleaned value.
/// An empty title is allowed; it is free text.
pub fn validate_listing_title(title: &str) -> Result<String, ValidationError> {
    let title = sanitize_string(title);
    validate_max_len("listing_title", &title, LISTING_TITLE_MAX_LEN)?;
    Ok(title)
}

pub fn amount_in_bounds(amount: &BigDecimal) -> bool {
    amount >= &BigDecimal::from(MIN_AMOUNT) && amount <= &BigDecimal::from(MAX_AMOUNT)
}

pub fn validate_qr_url(url: &str) -> Result<String, ValidationError> {
    let url = url.trim();
    validate_required("qr_url", url)?;
    Ok(url.to_string())
}
