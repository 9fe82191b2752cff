//! Pure order state transition rules.
//!
//! ```text
//! pending_payment ──> pending_verification ──> completed
//!        │                     │
//!        ├──> cancelled <──────┤        (buyer/operator, or payment rejected)
//!        └──> expired   <──────┘        (expiry window elapsed)
//! ```
//!
//! `completed`, `cancelled`, and `expired` are terminal. Callers guard
//! terminality; these functions only answer "where does this input lead".

use crate::types::{OrderState, PaymentStatus};

/// Resolves the state a canonical payment status drives an open order into.
///
/// Returns `None` when the status implies no change (a `pending` report for
/// an order already awaiting verification re-affirms, it does not move).
#[must_use]
pub const fn state_for_payment(current: OrderState, status: PaymentStatus) -> Option<OrderState> {
    match (status, current) {
        (PaymentStatus::Confirmed, _) => Some(OrderState::Completed),
        (PaymentStatus::Rejected, _) => Some(OrderState::Cancelled),
        (PaymentStatus::Pending, OrderState::PendingPayment) => {
            Some(OrderState::PendingVerification)
        }
        (PaymentStatus::Pending, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmed_completes() {
        assert_eq!(
            state_for_payment(OrderState::PendingPayment, PaymentStatus::Confirmed),
            Some(OrderState::Completed)
        );
        assert_eq!(
            state_for_payment(OrderState::PendingVerification, PaymentStatus::Confirmed),
            Some(OrderState::Completed)
        );
    }

    #[test]
    fn rejected_cancels() {
        assert_eq!(
            state_for_payment(OrderState::PendingVerification, PaymentStatus::Rejected),
            Some(OrderState::Cancelled)
        );
    }

    #[test]
    fn pending_moves_forward_at_most_once() {
        assert_eq!(
            state_for_payment(OrderState::PendingPayment, PaymentStatus::Pending),
            Some(OrderState::PendingVerification)
        );
        assert_eq!(
            state_for_payment(OrderState::PendingVerification, PaymentStatus::Pending),
            None
        );
    }
}
