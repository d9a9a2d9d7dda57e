//! # Posting Math
//!
//! Pure calculations behind a posting: line amounts, transaction totals, and
//! the voucher lines that record a transaction, its reversal, or a payment.
//!
//! ## Voucher Shapes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale                          Purchase                                 │
//! │  ────                          ────────                                 │
//! │  Dr receivable   total         Dr inventory        subtotal             │
//! │     Cr revenue      subtotal   Dr tax receivable   tax                  │
//! │     Cr tax payable  tax           Cr payable          total             │
//! │                                                                         │
//! │  Sale settlement               Purchase settlement                      │
//! │  Dr cash|bank    amount        Dr payable          amount               │
//! │     Cr receivable   amount        Cr cash|bank        amount            │
//! │                                                                         │
//! │  Reversal: every line with debit and credit swapped                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Zero-amount lines are dropped, so a tax-free sale yields two lines.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{PaymentMethod, TaxRate, TransactionKind};

// =============================================================================
// Transaction totals
// =============================================================================

/// A priced line before it is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub item_id: i64,
    pub quantity: i64,
    pub unit_price: Money,
    pub amount: Money,
}

impl PricedLine {
    /// Prices one line, failing on overflow.
    pub fn new(item_id: i64, quantity: i64, unit_price: Money) -> CoreResult<Self> {
        let amount = unit_price
            .checked_mul_quantity(quantity)
            .ok_or_else(|| CoreError::AmountOverflow(format!("line amount for item {}", item_id)))?;
        Ok(PricedLine {
            item_id,
            quantity,
            unit_price,
            amount,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}

/// Sums line amounts and applies the flat tax rule to the subtotal.
///
/// ```rust
/// use stockbook_core::money::Money;
/// use stockbook_core::posting::{compute_totals, PricedLine};
/// use stockbook_core::types::TaxRate;
///
/// let lines = [
///     PricedLine::new(1, 2, Money::from_cents(250)).unwrap(),
///     PricedLine::new(2, 1, Money::from_cents(500)).unwrap(),
/// ];
/// let totals = compute_totals(&lines, TaxRate::from_bps(1000)).unwrap();
/// assert_eq!(totals.subtotal.cents(), 1000);
/// assert_eq!(totals.tax.cents(), 100);
/// assert_eq!(totals.total.cents(), 1100);
/// ```
pub fn compute_totals(lines: &[PricedLine], rate: TaxRate) -> CoreResult<Totals> {
    let subtotal = lines.iter().try_fold(Money::zero(), |acc, line| {
        acc.checked_add(line.amount)
            .ok_or_else(|| CoreError::AmountOverflow("subtotal".to_string()))
    })?;
    let tax = subtotal.calculate_tax(rate);
    let total = subtotal
        .checked_add(tax)
        .ok_or_else(|| CoreError::AmountOverflow("total".to_string()))?;

    Ok(Totals {
        subtotal,
        tax,
        total,
    })
}

// =============================================================================
// Voucher lines
// =============================================================================

/// Account codes used by automatic postings.
///
/// Stored as the `posting_accounts` setting; defaults match the chart of
/// accounts seeded by the first migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PostingAccounts {
    pub cash: String,
    pub bank: String,
    pub receivable: String,
    pub inventory: String,
    pub tax_receivable: String,
    pub payable: String,
    pub tax_payable: String,
    pub revenue: String,
}

impl Default for PostingAccounts {
    fn default() -> Self {
        PostingAccounts {
            cash: "1000".to_string(),
            bank: "1010".to_string(),
            receivable: "1100".to_string(),
            inventory: "1200".to_string(),
            tax_receivable: "1300".to_string(),
            payable: "2000".to_string(),
            tax_payable: "2100".to_string(),
            revenue: "4000".to_string(),
        }
    }
}

impl PostingAccounts {
    pub fn for_method(&self, method: PaymentMethod) -> &str {
        match method {
            PaymentMethod::Cash => &self.cash,
            PaymentMethod::Bank => &self.bank,
        }
    }

    /// Every code, for resolving them to ids in one pass.
    pub fn codes(&self) -> [&str; 8] {
        [
            &self.cash,
            &self.bank,
            &self.receivable,
            &self.inventory,
            &self.tax_receivable,
            &self.payable,
            &self.tax_payable,
            &self.revenue,
        ]
    }
}

/// One side of a voucher before account codes are resolved to ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingLine {
    pub account_code: String,
    pub debit: Money,
    pub credit: Money,
    pub memo: Option<String>,
}

impl PostingLine {
    fn debit(code: &str, amount: Money) -> Self {
        PostingLine {
            account_code: code.to_string(),
            debit: amount,
            credit: Money::zero(),
            memo: None,
        }
    }

    fn credit(code: &str, amount: Money) -> Self {
        PostingLine {
            account_code: code.to_string(),
            debit: Money::zero(),
            credit: amount,
            memo: None,
        }
    }

    fn is_empty(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }
}

/// Voucher lines recording a completed transaction.
pub fn transaction_voucher(
    kind: TransactionKind,
    totals: &Totals,
    accounts: &PostingAccounts,
) -> Vec<PostingLine> {
    let lines = match kind {
        TransactionKind::Sale => vec![
            PostingLine::debit(&accounts.receivable, totals.total),
            PostingLine::credit(&accounts.revenue, totals.subtotal),
            PostingLine::credit(&accounts.tax_payable, totals.tax),
        ],
        TransactionKind::Purchase => vec![
            PostingLine::debit(&accounts.inventory, totals.subtotal),
            PostingLine::debit(&accounts.tax_receivable, totals.tax),
            PostingLine::credit(&accounts.payable, totals.total),
        ],
    };
    lines.into_iter().filter(|l| !l.is_empty()).collect()
}

/// Voucher lines recording a completed payment against a transaction.
pub fn settlement_voucher(
    kind: TransactionKind,
    method: PaymentMethod,
    amount: Money,
    accounts: &PostingAccounts,
) -> Vec<PostingLine> {
    let money_account = accounts.for_method(method);
    match kind {
        TransactionKind::Sale => vec![
            PostingLine::debit(money_account, amount),
            PostingLine::credit(&accounts.receivable, amount),
        ],
        TransactionKind::Purchase => vec![
            PostingLine::debit(&accounts.payable, amount),
            PostingLine::credit(money_account, amount),
        ],
    }
}

/// Swaps debit and credit on every line.
pub fn reverse(lines: &[PostingLine]) -> Vec<PostingLine> {
    lines
        .iter()
        .map(|l| PostingLine {
            account_code: l.account_code.clone(),
            debit: l.credit,
            credit: l.debit,
            memo: l.memo.clone(),
        })
        .collect()
}

/// Checks `(debit, credit)` pairs: each line has exactly one non-zero,
/// non-negative side, and both sides sum to the same positive amount.
pub fn check_balanced(sides: &[(i64, i64)]) -> CoreResult<()> {
    let mut debit: i64 = 0;
    let mut credit: i64 = 0;

    for &(d, c) in sides {
        if d < 0 || c < 0 || (d == 0) == (c == 0) {
            return Err(CoreError::Validation(crate::error::ValidationError::invalid(
                "lines",
                "each line needs exactly one positive side",
            )));
        }
        debit = debit
            .checked_add(d)
            .ok_or_else(|| CoreError::AmountOverflow("voucher debit".to_string()))?;
        credit = credit
            .checked_add(c)
            .ok_or_else(|| CoreError::AmountOverflow("voucher credit".to_string()))?;
    }

    if debit != credit || debit == 0 {
        return Err(CoreError::Unbalanced {
            debit_cents: debit,
            credit_cents: credit,
        });
    }

    Ok(())
}

/// [`check_balanced`] over resolved posting lines.
pub fn check_posting_balanced(lines: &[PostingLine]) -> CoreResult<()> {
    let sides: Vec<(i64, i64)> = lines
        .iter()
        .map(|l| (l.debit.cents(), l.credit.cents()))
        .collect();
    check_balanced(&sides)
}
