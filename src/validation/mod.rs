use bigdecimal::BigDecimal;
use std::fmt;

pub const DISPLAY_NAME_MAX_LEN: usize = 120;
pub const PRODUCE_TYPE_MAX_LEN: usize = 64;
pub const REJECTION_REASON_MAX_LEN: usize = 500;
pub const PHONE_MIN_DIGITS: usize = 9;
pub const PHONE_MAX_DIGITS: usize = 15;

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
    if value.chars().count() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Accepts `+2547XXXXXXXX`, `07XXXXXXXX` and similar; separators are ignored.
pub fn validate_phone(phone: &str) -> ValidationResult {
    let phone = sanitize_string(phone);
    validate_required("phone", &phone)?;

    let digits = phone.strip_prefix('+').unwrap_or(&phone);
    if !digits
        .chars()
        .all(|ch| ch.is_ascii_digit() || ch == ' ' || ch == '-')
    {
        return Err(ValidationError::new(
            "phone",
            "must contain only digits, spaces, dashes and a leading '+'",
        ));
    }

    let count = digits.chars().filter(|ch| ch.is_ascii_digit()).count();
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&count) {
        return Err(ValidationError::new(
            "phone",
            format!(
                "must have between {} and {} digits",
                PHONE_MIN_DIGITS, PHONE_MAX_DIGITS
            ),
        ));
    }

    Ok(())
}

pub fn validate_produce_type(produce_type: &str) -> ValidationResult {
    let produce_type = sanitize_string(produce_type);
    validate_required("produce_type", &produce_type)?;
    validate_max_len("produce_type", &produce_type, PRODUCE_TYPE_MAX_LEN)
}

pub fn validate_positive(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

pub fn validate_percentage(field: &'static str, pct: &BigDecimal) -> ValidationResult {
    if pct < &BigDecimal::from(0) || pct > &BigDecimal::from(100) {
        return Err(ValidationError::new(field, "must be between 0 and 100"));
    }

    Ok(())
}
