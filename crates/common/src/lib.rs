//! Shared identifier and value types used across the fulfillment workspace.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{
    CouponId, OrderId, PaymentId, ProductId, ShippingMethodId, UserCouponId, UserId,
};
