//! The staged-write unit of work.

use chrono::{DateTime, Utc};
use common::{CouponId, ProductId};
use domain::{Order, OrderShippingMethod, Payment, ShippingHistory, UserCoupon};

/// One staged write, applied at commit time.
///
/// Counter mutations are relative deltas rather than absolute values so that
/// concurrent sagas touching the same product or coupon compose; the store
/// rejects a commit whose resulting counter would be negative.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    /// Replace the order row (status fields, note, timestamps).
    UpdateOrder(Order),

    /// Replace the payment row.
    UpdatePayment(Payment),

    /// Adjust a product's stock counter by a delta and stamp its update time.
    AdjustStock {
        product_id: ProductId,
        delta: i64,
        at: DateTime<Utc>,
    },

    /// Adjust a coupon's usage counter by a delta.
    AdjustCouponUsage { coupon_id: CouponId, delta: i64 },

    /// Replace the user-coupon redemption row.
    UpdateUserCoupon(UserCoupon),

    /// Replace the order-shipping-method row.
    UpdateShippingMethod(OrderShippingMethod),

    /// Append one shipment history event. History rows are never mutated.
    AppendShippingHistory(ShippingHistory),
}

/// An ordered collection of staged writes committed atomically.
///
/// Components stage into a shared batch; only the saga driver commits.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<StagedWrite>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an order update.
    pub fn update_order(&mut self, order: Order) {
        self.writes.push(StagedWrite::UpdateOrder(order));
    }

    /// Stages a payment update.
    pub fn update_payment(&mut self, payment: Payment) {
        self.writes.push(StagedWrite::UpdatePayment(payment));
    }

    /// Stages a relative stock adjustment.
    pub fn adjust_stock(&mut self, product_id: ProductId, delta: i64, at: DateTime<Utc>) {
        self.writes.push(StagedWrite::AdjustStock {
            product_id,
            delta,
            at,
        });
    }

    /// Stages a relative coupon-usage adjustment.
    pub fn adjust_coupon_usage(&mut self, coupon_id: CouponId, delta: i64) {
        self.writes
            .push(StagedWrite::AdjustCouponUsage { coupon_id, delta });
    }

    /// Stages a user-coupon update.
    pub fn update_user_coupon(&mut self, user_coupon: UserCoupon) {
        self.writes.push(StagedWrite::UpdateUserCoupon(user_coupon));
    }

    /// Stages a shipping-method update.
    pub fn update_shipping_method(&mut self, method: OrderShippingMethod) {
        self.writes.push(StagedWrite::UpdateShippingMethod(method));
    }

    /// Stages a new shipment history event.
    pub fn append_shipping_history(&mut self, event: ShippingHistory) {
        self.writes.push(StagedWrite::AppendShippingHistory(event));
    }

    /// Returns the number of staged writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterates the staged writes in staging order.
    pub fn iter(&self) -> impl Iterator<Item = &StagedWrite> {
        self.writes.iter()
    }

    /// Consumes the batch, yielding the staged writes in staging order.
    pub fn into_writes(self) -> Vec<StagedWrite> {
        self.writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, OrderId, UserId};

    #[test]
    fn new_batch_is_empty() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn staging_preserves_order() {
        let mut batch = WriteBatch::new();
        let product_id = ProductId::new();
        let order = Order::new(
            OrderId::new(),
            Some(UserId::new()),
            Money::from_minor(1000),
            Money::zero(),
            Money::zero(),
        );

        batch.adjust_stock(product_id, 2, Utc::now());
        batch.update_order(order);

        assert_eq!(batch.len(), 2);
        let writes = batch.into_writes();
        assert!(matches!(writes[0], StagedWrite::AdjustStock { delta: 2, .. }));
        assert!(matches!(writes[1], StagedWrite::UpdateOrder(_)));
    }
}
