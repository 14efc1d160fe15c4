//! Catalog entities touched by compensation: products and coupons.

use chrono::{DateTime, Utc};
use common::{CouponId, Money, OrderId, ProductId, UserCouponId, UserId};
use serde::{Deserialize, Serialize};

/// A product with its shared stock counter.
///
/// `stock_quantity` is decremented at checkout when units are reserved and
/// restored by compensation when an order fails. It must never go negative;
/// the ledger enforces that at commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock_quantity: i64,
    /// Package weight in grams, if measured. Falls back to the shipment profile.
    pub weight_grams: Option<u32>,
    /// Package dimensions in centimeters, if measured.
    pub dimensions_cm: Option<(u32, u32, u32)>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product with the given stock level.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money, stock_quantity: i64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            stock_quantity,
            weight_grams: None,
            dimensions_cm: None,
            updated_at: Utc::now(),
        }
    }
}

/// A coupon definition with a global usage counter and cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub discount: Money,
    /// Times redeemed so far. Never negative; the ledger enforces that.
    pub current_usage: u32,
    pub usage_limit: u32,
}

impl Coupon {
    /// Creates a coupon with zero redemptions.
    pub fn new(id: CouponId, code: impl Into<String>, discount: Money, usage_limit: u32) -> Self {
        Self {
            id,
            code: code.into(),
            discount,
            current_usage: 0,
            usage_limit,
        }
    }
}

/// A per-user coupon redemption record.
///
/// `used_date` and `order_id` are set together when the coupon is redeemed
/// for an order; both `None` means the coupon is available again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCoupon {
    pub id: UserCouponId,
    pub coupon_id: CouponId,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub used_date: Option<DateTime<Utc>>,
}

impl UserCoupon {
    /// Creates an unredeemed record.
    pub fn new(id: UserCouponId, coupon_id: CouponId, user_id: UserId) -> Self {
        Self {
            id,
            coupon_id,
            user_id,
            order_id: None,
            used_date: None,
        }
    }

    /// Marks the coupon redeemed for an order.
    pub fn redeem(&mut self, order_id: OrderId, now: DateTime<Utc>) {
        self.order_id = Some(order_id);
        self.used_date = Some(now);
    }

    /// Returns true if this record was redeemed for the given order.
    pub fn is_used_for(&self, order_id: OrderId) -> bool {
        self.used_date.is_some() && self.order_id == Some(order_id)
    }

    /// Clears the redemption, making the coupon available again.
    pub fn release(&mut self) {
        self.order_id = None;
        self.used_date = None;
    }
}
