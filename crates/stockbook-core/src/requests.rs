//! # Request DTOs
//!
//! Input shapes accepted by the REST API. Each carries a `validate()` that
//! applies the field rules from [`crate::validation`]; checks that need the
//! database (existence, activity, stock) happen in the repositories.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{AccountKind, PartnerKind, PaymentMethod, PaymentStatus, TaskKind, TransactionKind};
use crate::validation::*;

// =============================================================================
// Catalogue
// =============================================================================

/// Maps a present field to `Some`, keeping an explicit `null` as `Some(None)`.
/// Combined with `#[serde(default)]`, an absent field stays `None`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub unit_price_cents: i64,
    #[serde(default)]
    pub cost_price_cents: i64,
    #[serde(default)]
    pub min_stock_level: i64,
}

impl NewItem {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_item_code(&self.code)?;
        validate_name(&self.name)?;
        validate_optional_text("unit", self.unit.as_deref(), 20)?;
        validate_price_cents("unitPriceCents", self.unit_price_cents)?;
        validate_price_cents("costPriceCents", self.cost_price_cents)?;
        validate_min_stock_level(self.min_stock_level)
    }
}

/// Partial update: absent fields keep their value. The code is immutable.
///
/// `categoryId` is three-way: absent keeps the category, `null` clears it,
/// a number moves the item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub category_id: Option<Option<i64>>,
    pub unit: Option<String>,
    pub unit_price_cents: Option<i64>,
    pub cost_price_cents: Option<i64>,
    pub min_stock_level: Option<i64>,
    pub is_active: Option<bool>,
}

impl ItemUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_optional_text("unit", self.unit.as_deref(), 20)?;
        if let Some(cents) = self.unit_price_cents {
            validate_price_cents("unitPriceCents", cents)?;
        }
        if let Some(cents) = self.cost_price_cents {
            validate_price_cents("costPriceCents", cents)?;
        }
        if let Some(level) = self.min_stock_level {
            validate_min_stock_level(level)?;
        }
        Ok(())
    }
}

/// Used for both create and full update of a category.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

impl CategoryInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewBarcode {
    pub code: String,
}

impl NewBarcode {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_barcode(&self.code)
    }
}

/// Used for both create and full update of a partner.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PartnerInput {
    pub name: String,
    pub kind: PartnerKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Ignored on create.
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl PartnerInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_optional_text("phone", self.phone.as_deref(), 40)?;
        validate_optional_text("address", self.address.as_deref(), 500)?;
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ValidationError::invalid("email", "must contain '@'"));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AdjustInventoryRequest {
    /// Signed change; negative removes stock.
    pub delta: i64,
}

impl AdjustInventoryRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_adjustment_delta(self.delta)
    }
}

// =============================================================================
// Transactions
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub item_id: i64,
    pub quantity: i64,
    /// Falls back to the item's selling price (sale) or cost price (purchase).
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub kind: TransactionKind,
    pub partner_id: i64,
    /// Defaults to today (UTC).
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub transaction_date: Option<NaiveDate>,
    pub lines: Vec<LineRequest>,
    #[serde(default)]
    pub note: Option<String>,
    /// Overrides `accounting.auto_post_vouchers` for this request.
    #[serde(default)]
    pub post_voucher: Option<bool>,
}

impl TransactionRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_line_count(self.lines.len())?;
        for line in &self.lines {
            validate_quantity(line.quantity)?;
            if let Some(cents) = line.unit_price_cents {
                validate_price_cents("unitPriceCents", cents)?;
            }
        }
        if let Some(date) = self.transaction_date {
            validate_document_date("transactionDate", date)?;
        }
        validate_optional_text("note", self.note.as_deref(), 1000)
    }
}

// =============================================================================
// Accounting
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub kind: AccountKind,
}

impl NewAccount {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_account_code(&self.code)?;
        validate_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VoucherLineRequest {
    pub account_id: i64,
    #[serde(default)]
    pub debit_cents: i64,
    #[serde(default)]
    pub credit_cents: i64,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct VoucherRequest {
    pub description: String,
    #[serde(default)]
    #[ts(as = "Option<String>")]
    pub voucher_date: Option<NaiveDate>,
    pub lines: Vec<VoucherLineRequest>,
}

impl VoucherRequest {
    /// Field rules plus the balance rule, which needs no database.
    pub fn validate(&self) -> CoreResult<()> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::required("description").into());
        }
        validate_optional_text("description", Some(&self.description), 500)?;
        if let Some(date) = self.voucher_date {
            validate_document_date("voucherDate", date)?;
        }
        if self.lines.len() < 2 {
            return Err(ValidationError::OutOfRange {
                field: "lines".to_string(),
                min: 2,
                max: crate::MAX_TRANSACTION_LINES as i64,
            }
            .into());
        }
        for line in &self.lines {
            validate_optional_text("memo", line.memo.as_deref(), 200)?;
        }
        let sides: Vec<(i64, i64)> = self
            .lines
            .iter()
            .map(|l| (l.debit_cents, l.credit_cents))
            .collect();
        crate::posting::check_balanced(&sides)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default)]
    pub transaction_id: Option<i64>,
    #[serde(default)]
    pub voucher_id: Option<i64>,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentRequest {
    pub fn validate(&self) -> CoreResult<()> {
        validate_amount_cents("amountCents", self.amount_cents)?;
        validate_optional_text("reference", self.reference.as_deref(), 100)?;
        match (self.transaction_id, self.voucher_id) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(CoreError::Validation(ValidationError::invalid(
                "target",
                "exactly one of transactionId or voucherId is required",
            ))),
        }
    }
}

// =============================================================================
// Scheduling
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewScheduledTask {
    pub name: String,
    pub kind: TaskKind,
    pub interval_minutes: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl NewScheduledTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_interval_minutes(self.interval_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(lines: Vec<LineRequest>) -> TransactionRequest {
        TransactionRequest {
            kind: TransactionKind::Sale,
            partner_id: 1,
            transaction_date: None,
            lines,
            note: None,
            post_voucher: None,
        }
    }

    #[test]
    fn test_transaction_request_requires_lines() {
        assert!(sale(vec![]).validate().is_err());
        let ok = sale(vec![LineRequest {
            item_id: 1,
            quantity: 2,
            unit_price_cents: None,
        }]);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_transaction_request_rejects_bad_line() {
        let bad_qty = sale(vec![LineRequest {
            item_id: 1,
            quantity: 0,
            unit_price_cents: None,
        }]);
        assert!(bad_qty.validate().is_err());

        let bad_price = sale(vec![LineRequest {
            item_id: 1,
            quantity: 1,
            unit_price_cents: Some(-1),
        }]);
        assert!(bad_price.validate().is_err());
    }

    #[test]
    fn test_payment_request_needs_one_target() {
        let mut req = PaymentRequest {
            transaction_id: Some(1),
            voucher_id: None,
            method: PaymentMethod::Cash,
            amount_cents: 500,
            status: PaymentStatus::Completed,
            reference: None,
        };
        assert!(req.validate().is_ok());

        req.voucher_id = Some(2);
        assert!(req.validate().is_err());

        req.transaction_id = None;
        req.voucher_id = None;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_voucher_request_must_balance() {
        let line = |account_id, debit_cents, credit_cents| VoucherLineRequest {
            account_id,
            debit_cents,
            credit_cents,
            memo: None,
        };
        let balanced = VoucherRequest {
            description: "Owner contribution".to_string(),
            voucher_date: None,
            lines: vec![line(1, 10_000, 0), line(8, 0, 10_000)],
        };
        assert!(balanced.validate().is_ok());

        let unbalanced = VoucherRequest {
            lines: vec![line(1, 10_000, 0), line(8, 0, 9_000)],
            ..balanced
        };
        assert!(matches!(
            unbalanced.validate(),
            Err(CoreError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = r#"{"kind":"purchase","partnerId":3,"lines":[{"itemId":9,"quantity":10}]}"#;
        let req: TransactionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.partner_id, 3);
        assert_eq!(req.lines[0].item_id, 9);
        assert!(req.post_voucher.is_none());
    }

    #[test]
    fn test_item_update_category_is_three_way() {
        let keep: ItemUpdate = serde_json::from_str(r#"{"name":"Tea"}"#).unwrap();
        assert_eq!(keep.category_id, None);

        let clear: ItemUpdate = serde_json::from_str(r#"{"categoryId":null}"#).unwrap();
        assert_eq!(clear.category_id, Some(None));

        let move_to: ItemUpdate = serde_json::from_str(r#"{"categoryId":4}"#).unwrap();
        assert_eq!(move_to.category_id, Some(Some(4)));
    }
}
