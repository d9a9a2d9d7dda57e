//! # Validation Module
//!
//! Input validation for everything that arrives in a request body.
//!
//! ## Where Validation Happens
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractor                                               │
//! │  └── JSON shape and types (serde)                                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Field rules: lengths, ranges, character sets                      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Repository (inside the db transaction)                       │
//! │  ├── Referenced rows exist and are active                              │
//! │  └── Stock is sufficient for sale lines                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite                                                       │
//! │  └── UNIQUE / FOREIGN KEY / CHECK constraints                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Datelike, NaiveDate};

use crate::error::ValidationError;
use crate::{MAX_DOCUMENT_YEAR, MAX_LINE_QUANTITY, MAX_TRANSACTION_LINES, MIN_DOCUMENT_YEAR};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Shared rule for business codes (item code, account code, barcode).
fn validate_code(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ValidationError::invalid(
            field,
            "must contain only letters, numbers, hyphens, dots, and underscores",
        ));
    }

    Ok(())
}

/// Validates an item code.
///
/// ```rust
/// use stockbook_core::validation::validate_item_code;
///
/// assert!(validate_item_code("COKE-330").is_ok());
/// assert!(validate_item_code("").is_err());
/// assert!(validate_item_code("has space").is_err());
/// ```
pub fn validate_item_code(code: &str) -> ValidationResult<()> {
    validate_code("code", code, 50)
}

pub fn validate_account_code(code: &str) -> ValidationResult<()> {
    validate_code("code", code, 20)
}

/// Barcodes are digits for EAN/UPC but internal labels use letters too.
pub fn validate_barcode(code: &str) -> ValidationResult<()> {
    validate_code("barcode", code, 64)
}

/// Validates a display name (items, partners, categories, accounts, tasks).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::required("name"));
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a search query and returns it trimmed.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a setting key: lowercase snake_case.
pub fn validate_setting_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::required("key"));
    }

    if key.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "key".to_string(),
            max: 64,
        });
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(ValidationError::invalid(
            "key",
            "must be lowercase letters, digits, and underscores",
        ));
    }

    Ok(())
}

/// Validates the file name of a backup snapshot.
///
/// Only bare names produced by the backup writer are accepted, so a restore
/// request can never point outside the backup directory.
///
/// ```rust
/// use stockbook_core::validation::validate_backup_file_name;
///
/// assert!(validate_backup_file_name("stockbook-20261019-101500.db").is_ok());
/// assert!(validate_backup_file_name("../stockbook.db").is_err());
/// assert!(validate_backup_file_name("notes.txt").is_err());
/// ```
pub fn validate_backup_file_name(name: &str) -> ValidationResult<()> {
    if name.is_empty() {
        return Err(ValidationError::required("fileName"));
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ValidationError::invalid(
            "fileName",
            "must not contain path separators",
        ));
    }

    if !name.starts_with(crate::BACKUP_FILE_PREFIX) || !name.ends_with(".db") {
        return Err(ValidationError::invalid(
            "fileName",
            "is not a stockbook backup",
        ));
    }

    Ok(())
}

pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
    {
        return Err(ValidationError::invalid(
            "username",
            "must contain only letters, numbers, dots, and underscores",
        ));
    }

    Ok(())
}

pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.len() < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }

    Ok(())
}

/// Optional free-text fields (note, memo, address).
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_LINE_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Manual adjustments can go either way but never zero.
pub fn validate_adjustment_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::invalid("delta", "must not be zero"));
    }

    if delta.abs() > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_LINE_QUANTITY,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed.
///
/// ```rust
/// use stockbook_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents("unitPrice", 1099).is_ok());
/// assert!(validate_price_cents("unitPrice", 0).is_ok());
/// assert!(validate_price_cents("unitPrice", -100).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }

    Ok(())
}

pub fn validate_amount_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }

    Ok(())
}

pub fn validate_min_stock_level(level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "minStockLevel".to_string(),
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points (0% to 100%).
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "taxRate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Scheduled task interval: one minute to thirty days.
pub fn validate_interval_minutes(minutes: i64) -> ValidationResult<()> {
    if !(1..=43_200).contains(&minutes) {
        return Err(ValidationError::OutOfRange {
            field: "intervalMinutes".to_string(),
            min: 1,
            max: 43_200,
        });
    }

    Ok(())
}

/// Document dates (transactions, vouchers) stay within four-digit years so
/// due dates and references can be derived from them.
pub fn validate_document_date(field: &str, date: NaiveDate) -> ValidationResult<()> {
    let year = date.year();
    if !(MIN_DOCUMENT_YEAR..=MAX_DOCUMENT_YEAR).contains(&year) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: MIN_DOCUMENT_YEAR as i64,
            max: MAX_DOCUMENT_YEAR as i64,
        });
    }

    Ok(())
}

pub fn validate_line_count(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::required("lines"));
    }

    if lines > MAX_TRANSACTION_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_TRANSACTION_LINES as i64,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_item_code() {
        assert!(validate_item_code("COKE-330").is_ok());
        assert!(validate_item_code("ABC_123.v2").is_ok());
        assert!(validate_item_code("  ").is_err());
        assert!(validate_item_code(&"A".repeat(51)).is_err());
        assert!(validate_item_code("COKE 330").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Coca-Cola 330ml").is_ok());
        assert!(matches!(
            validate_name(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_name(&"x".repeat(201)).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_LINE_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_LINE_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_adjustment_delta() {
        assert!(validate_adjustment_delta(-5).is_ok());
        assert!(validate_adjustment_delta(5).is_ok());
        assert!(validate_adjustment_delta(0).is_err());
    }

    #[test]
    fn test_validate_prices_and_amounts() {
        assert!(validate_price_cents("unitPrice", 0).is_ok());
        assert!(validate_price_cents("unitPrice", -1).is_err());
        assert!(validate_amount_cents("amount", 1).is_ok());
        assert!(validate_amount_cents("amount", 0).is_err());
    }

    #[test]
    fn test_validate_setting_key() {
        assert!(validate_setting_key("company_info").is_ok());
        assert!(validate_setting_key("Company").is_err());
        assert!(validate_setting_key("").is_err());
    }

    #[test]
    fn test_validate_backup_file_name() {
        assert!(validate_backup_file_name("stockbook-20260101-000000.db").is_ok());
        assert!(validate_backup_file_name("sub/stockbook-20260101-000000.db").is_err());
        assert!(validate_backup_file_name("..\\stockbook.db").is_err());
        assert!(validate_backup_file_name("other.db").is_err());
    }

    #[test]
    fn test_validate_credentials() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_interval_and_lines() {
        assert!(validate_interval_minutes(60).is_ok());
        assert!(validate_interval_minutes(0).is_err());
        assert!(validate_line_count(0).is_err());
        assert!(validate_line_count(3).is_ok());
        assert!(validate_line_count(MAX_TRANSACTION_LINES + 1).is_err());
    }

    #[test]
    fn test_validate_document_date() {
        let ok = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap();
        assert!(validate_document_date("transactionDate", ok).is_ok());

        let far: NaiveDate = serde_json::from_str("\"+262142-12-31\"").unwrap();
        assert!(matches!(
            validate_document_date("transactionDate", far),
            Err(ValidationError::OutOfRange { .. })
        ));
        let early = NaiveDate::from_ymd_opt(1899, 12, 31).unwrap();
        assert!(validate_document_date("voucherDate", early).is_err());
    }
}
