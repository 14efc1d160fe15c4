//! Payment records.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::order::PaymentStatus;

/// One gateway payment attempt for an order.
///
/// Mutated to Completed or Failed by the saga, never deleted; the raw
/// processor response is kept verbatim for reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    /// Gateway processor name, e.g. "VNPAY".
    pub processor: String,
    pub amount: Money,
    pub status: PaymentStatus,
    pub processor_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment record.
    pub fn new(id: PaymentId, order_id: OrderId, processor: impl Into<String>, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_id,
            processor: processor.into(),
            amount,
            status: PaymentStatus::Pending,
            processor_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Records the gateway's success response.
    pub fn mark_completed(&mut self, processor_response: impl Into<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Completed;
        self.processor_response = Some(processor_response.into());
        self.updated_at = now;
    }

    /// Records the gateway's failure response.
    pub fn mark_failed(&mut self, processor_response: impl Into<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Failed;
        self.processor_response = Some(processor_response.into());
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_payment_is_pending() {
        let payment = Payment::new(
            PaymentId::new(),
            OrderId::new(),
            "VNPAY",
            Money::from_minor(500_000),
        );
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(payment.processor_response.is_none());
    }

    #[test]
    fn mark_failed_keeps_raw_response() {
        let mut payment = Payment::new(
            PaymentId::new(),
            OrderId::new(),
            "VNPAY",
            Money::from_minor(500_000),
        );
        payment.mark_failed("code=24 cancelled by user", Utc::now());
        assert_eq!(payment.status, PaymentStatus::Failed);
        assert_eq!(
            payment.processor_response.as_deref(),
            Some("code=24 cancelled by user")
        );
    }
}
