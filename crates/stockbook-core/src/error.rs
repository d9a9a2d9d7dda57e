//! # Error Types
//!
//! Domain-specific error types for stockbook-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  stockbook-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  stockbook-db errors (separate crate)                                  │
//! │  └── DbError          - Persistence failures, constraint violations    │
//! │                                                                         │
//! │  stockbook-server errors (app)                                         │
//! │  └── ApiError         - What the browser sees (code + message)         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → HTTP         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::TransactionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations.
///
/// Every variant carries enough context (ids, codes, amounts) for the UI to
/// show a useful toast without a second lookup.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale line asks for more units than the inventory holds.
    ///
    /// ## When This Occurs
    /// ```text
    /// Inventory(COKE) = 3
    ///      │
    ///      ▼
    /// Sale line: COKE × 5
    ///      │
    ///      ▼
    /// InsufficientStock { code: "COKE", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole transaction rolled back, nothing persisted
    /// ```
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// The partner exists but has been deactivated.
    #[error("Partner {0} is inactive")]
    InactivePartner(i64),

    /// The item exists but has been deactivated.
    #[error("Item {0} is inactive")]
    InactiveItem(String),

    /// The account exists but has been deactivated.
    #[error("Account {0} is inactive")]
    InactiveAccount(String),

    /// A status transition that the state machine does not allow.
    #[error("Transaction {transaction_id} is {status}, cannot {action}")]
    InvalidStatus {
        transaction_id: i64,
        status: TransactionStatus,
        action: String,
    },

    /// A voucher whose debit and credit sides disagree.
    #[error("Voucher is unbalanced: debit {debit_cents}, credit {credit_cents}")]
    Unbalanced { debit_cents: i64, credit_cents: i64 },

    /// Setting a category parent would close a loop in the hierarchy.
    #[error("Category {category_id} cannot have parent {parent_id}: cycle detected")]
    CategoryCycle { category_id: i64, parent_id: i64 },

    /// An amount calculation left the i64 range.
    #[error("Amount overflow while computing {0}")]
    AmountOverflow(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (bad characters, bad file name, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::InvalidFormat`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            code: "COKE-330".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for COKE-330: available 3, requested 5"
        );

        let err = CoreError::InvalidStatus {
            transaction_id: 7,
            status: TransactionStatus::Canceled,
            action: "cancel".to_string(),
        };
        assert_eq!(err.to_string(), "Transaction 7 is canceled, cannot cancel");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("code").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: code is required");
    }
}
