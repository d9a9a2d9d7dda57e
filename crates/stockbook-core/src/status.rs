//! # Transaction Status Machine
//!
//! The only place a [`TransactionStatus`] changes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │            PostingSucceeded                                             │
//! │  pending ────────────────────► completed ◄──┐                           │
//! │     │                             │  ▲      │ Reconcile(paid ≥ total)   │
//! │     │ Cancel                      │  │      │                           │
//! │     │               Reconcile     ▼  │      │                           │
//! │     │            ┌──────────► unpaid / partial                          │
//! │     ▼            │                 │                                    │
//! │  canceled ◄──────┴─────────────────┘  Cancel                            │
//! │  (terminal)                                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reconcile maps the completed-payment sum onto a status:
//! `paid == 0 → unpaid`, `0 < paid < total → partial`, `paid ≥ total → completed`.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TransactionStatus;

/// Named events that may move a transaction between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTrigger {
    /// Every line was posted to the inventory ledger.
    PostingSucceeded,
    /// The caller explicitly cancels.
    Cancel,
    /// Payment reconciliation with the completed-payment sum.
    Reconcile { paid: Money, total: Money },
}

impl StatusTrigger {
    /// Verb used in invalid-status error messages.
    pub const fn action(&self) -> &'static str {
        match self {
            StatusTrigger::PostingSucceeded => "complete posting",
            StatusTrigger::Cancel => "cancel",
            StatusTrigger::Reconcile { .. } => "reconcile",
        }
    }
}

impl TransactionStatus {
    /// Applies `trigger`, returning the next status.
    ///
    /// `transaction_id` only feeds the error message.
    ///
    /// ```rust
    /// use stockbook_core::status::StatusTrigger;
    /// use stockbook_core::TransactionStatus;
    ///
    /// let next = TransactionStatus::Pending
    ///     .apply(1, StatusTrigger::PostingSucceeded)
    ///     .unwrap();
    /// assert_eq!(next, TransactionStatus::Completed);
    /// assert!(TransactionStatus::Canceled.apply(1, StatusTrigger::Cancel).is_err());
    /// ```
    pub fn apply(self, transaction_id: i64, trigger: StatusTrigger) -> CoreResult<TransactionStatus> {
        use TransactionStatus::*;

        let next = match (self, trigger) {
            (Pending, StatusTrigger::PostingSucceeded) => Some(Completed),
            (Pending | Completed | Partial | Unpaid, StatusTrigger::Cancel) => Some(Canceled),
            (Completed | Partial | Unpaid, StatusTrigger::Reconcile { paid, total }) => {
                Some(settlement_status(paid, total))
            }
            _ => None,
        };

        next.ok_or_else(|| CoreError::InvalidStatus {
            transaction_id,
            status: self,
            action: trigger.action().to_string(),
        })
    }

    /// Whether the transaction's postings are live (not pending, not canceled).
    pub const fn is_posted(&self) -> bool {
        !matches!(self, TransactionStatus::Pending | TransactionStatus::Canceled)
    }
}

fn settlement_status(paid: Money, total: Money) -> TransactionStatus {
    // A zero-total transaction is settled by definition.
    if paid >= total {
        TransactionStatus::Completed
    } else if paid.cents() <= 0 {
        TransactionStatus::Unpaid
    } else {
        TransactionStatus::Partial
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TransactionStatus::*;

    fn reconcile(paid: i64, total: i64) -> StatusTrigger {
        StatusTrigger::Reconcile {
            paid: Money::from_cents(paid),
            total: Money::from_cents(total),
        }
    }

    #[test]
    fn test_posting_completes_pending_only() {
        assert_eq!(Pending.apply(1, StatusTrigger::PostingSucceeded).unwrap(), Completed);
        for status in [Completed, Canceled, Partial, Unpaid] {
            assert!(status.apply(1, StatusTrigger::PostingSucceeded).is_err());
        }
    }

    #[test]
    fn test_cancel_from_every_live_status() {
        for status in [Pending, Completed, Partial, Unpaid] {
            assert_eq!(status.apply(1, StatusTrigger::Cancel).unwrap(), Canceled);
        }
    }

    #[test]
    fn test_canceled_is_terminal() {
        for trigger in [StatusTrigger::PostingSucceeded, StatusTrigger::Cancel, reconcile(100, 100)] {
            let err = Canceled.apply(9, trigger).unwrap_err();
            assert!(matches!(
                err,
                CoreError::InvalidStatus { transaction_id: 9, status: Canceled, .. }
            ));
        }
    }

    #[test]
    fn test_reconcile_thresholds() {
        assert_eq!(Completed.apply(1, reconcile(0, 1000)).unwrap(), Unpaid);
        assert_eq!(Completed.apply(1, reconcile(400, 1000)).unwrap(), Partial);
        assert_eq!(Partial.apply(1, reconcile(1000, 1000)).unwrap(), Completed);
        assert_eq!(Unpaid.apply(1, reconcile(1200, 1000)).unwrap(), Completed);
    }

    #[test]
    fn test_reconcile_refused_while_pending() {
        assert!(Pending.apply(1, reconcile(0, 1000)).is_err());
    }

    #[test]
    fn test_is_posted() {
        assert!(!Pending.is_posted());
        assert!(!Canceled.is_posted());
        assert!(Completed.is_posted());
        assert!(Unpaid.is_posted());
    }
}
