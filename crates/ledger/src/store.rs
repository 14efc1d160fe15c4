use async_trait::async_trait;
use common::{CouponId, OrderId, ProductId, UserId};
use domain::{Address, Coupon, Order, OrderItem, OrderShippingMethod, Payment, Product, UserCoupon};
use tokio_util::sync::CancellationToken;

use crate::{Result, WriteBatch};

/// Core trait for ledger store implementations.
///
/// Loads return current committed state; all mutation goes through staged
/// writes in a [`WriteBatch`] applied by a single [`Ledger::commit`]. All
/// implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Loads an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order's line items.
    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>>;

    /// Loads a product by id.
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads a coupon definition by id.
    async fn coupon(&self, id: CouponId) -> Result<Option<Coupon>>;

    /// Loads the user-coupon rows redeemed against an order
    /// (those with `used_date` set and a matching order id).
    async fn used_coupons_for_order(&self, order_id: OrderId) -> Result<Vec<UserCoupon>>;

    /// Loads an order's payment records, oldest first.
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;

    /// Loads an order's shipping-method rows.
    async fn shipping_methods_for_order(&self, order_id: OrderId)
    -> Result<Vec<OrderShippingMethod>>;

    /// Loads a user's default delivery address.
    async fn default_address(&self, user_id: UserId) -> Result<Option<Address>>;

    /// Applies every staged write atomically: either all succeed or none do.
    ///
    /// Fails with [`crate::LedgerError::NegativeStock`] or
    /// [`crate::LedgerError::NegativeCouponUsage`] when a relative adjustment
    /// would leave a counter negative. The cancellation token is consulted
    /// only before the transaction starts; an in-flight commit always runs to
    /// completion.
    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<()>;
}
