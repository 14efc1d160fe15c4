use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{CouponId, OrderId, ProductId, ShippingMethodId, UserCouponId, UserId};
use domain::{Address, Coupon, Order, OrderItem, OrderShippingMethod, Payment, Product, UserCoupon};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{
    LedgerError, Result,
    batch::{StagedWrite, WriteBatch},
    store::Ledger,
};

#[derive(Debug, Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    items: Vec<OrderItem>,
    products: HashMap<ProductId, Product>,
    coupons: HashMap<CouponId, Coupon>,
    user_coupons: HashMap<UserCouponId, UserCoupon>,
    payments: Vec<Payment>,
    shipping_methods: HashMap<ShippingMethodId, OrderShippingMethod>,
    shipping_history: Vec<domain::ShippingHistory>,
    addresses: HashMap<UserId, Address>,
    commit_count: usize,
}

/// In-memory ledger implementation for testing.
///
/// Provides the same commit semantics as the PostgreSQL implementation:
/// staged writes apply atomically and counter adjustments that would go
/// negative reject the whole batch.
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<State>>,
}

impl InMemoryLedger {
    /// Creates a new empty in-memory ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an order row.
    pub async fn insert_order(&self, order: Order) {
        self.state.write().await.orders.insert(order.id, order);
    }

    /// Seeds an order item row.
    pub async fn insert_item(&self, item: OrderItem) {
        self.state.write().await.items.push(item);
    }

    /// Seeds a product row.
    pub async fn insert_product(&self, product: Product) {
        self.state.write().await.products.insert(product.id, product);
    }

    /// Seeds a coupon row.
    pub async fn insert_coupon(&self, coupon: Coupon) {
        self.state.write().await.coupons.insert(coupon.id, coupon);
    }

    /// Seeds a user-coupon row.
    pub async fn insert_user_coupon(&self, user_coupon: UserCoupon) {
        self.state
            .write()
            .await
            .user_coupons
            .insert(user_coupon.id, user_coupon);
    }

    /// Seeds a payment row.
    pub async fn insert_payment(&self, payment: Payment) {
        self.state.write().await.payments.push(payment);
    }

    /// Seeds a shipping-method row.
    pub async fn insert_shipping_method(&self, method: OrderShippingMethod) {
        self.state
            .write()
            .await
            .shipping_methods
            .insert(method.id, method);
    }

    /// Seeds a user's default address.
    pub async fn insert_address(&self, user_id: UserId, address: Address) {
        self.state.write().await.addresses.insert(user_id, address);
    }

    /// Returns the number of commits applied so far.
    pub async fn commit_count(&self) -> usize {
        self.state.read().await.commit_count
    }

    /// Returns the number of shipment history rows.
    pub async fn shipping_history_count(&self) -> usize {
        self.state.read().await.shipping_history.len()
    }

    /// Returns the shipment history rows recorded for an order.
    pub async fn shipping_history_for_order(
        &self,
        order_id: OrderId,
    ) -> Vec<domain::ShippingHistory> {
        self.state
            .read()
            .await
            .shipping_history
            .iter()
            .filter(|h| h.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Loads a user-coupon row by id.
    pub async fn user_coupon(&self, id: UserCouponId) -> Option<UserCoupon> {
        self.state.read().await.user_coupons.get(&id).cloned()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .state
            .read()
            .await
            .items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn coupon(&self, id: CouponId) -> Result<Option<Coupon>> {
        Ok(self.state.read().await.coupons.get(&id).cloned())
    }

    async fn used_coupons_for_order(&self, order_id: OrderId) -> Result<Vec<UserCoupon>> {
        Ok(self
            .state
            .read()
            .await
            .user_coupons
            .values()
            .filter(|uc| uc.is_used_for(order_id))
            .cloned()
            .collect())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<_> = state
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn shipping_methods_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderShippingMethod>> {
        let state = self.state.read().await;
        let mut methods: Vec<_> = state
            .shipping_methods
            .values()
            .filter(|m| m.order_id == order_id)
            .cloned()
            .collect();
        methods.sort_by_key(|m| m.id.as_uuid());
        Ok(methods)
    }

    async fn default_address(&self, user_id: UserId) -> Result<Option<Address>> {
        Ok(self.state.read().await.addresses.get(&user_id).cloned())
    }

    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }

        let mut state = self.state.write().await;

        // Validate counter adjustments against the resulting values before
        // touching anything, so a rejected batch leaves no partial writes.
        let mut stock_deltas: HashMap<ProductId, i64> = HashMap::new();
        let mut usage_deltas: HashMap<CouponId, i64> = HashMap::new();
        for write in batch.iter() {
            match write {
                StagedWrite::AdjustStock { product_id, delta, .. } => {
                    *stock_deltas.entry(*product_id).or_default() += delta;
                }
                StagedWrite::AdjustCouponUsage { coupon_id, delta } => {
                    *usage_deltas.entry(*coupon_id).or_default() += delta;
                }
                _ => {}
            }
        }
        for (product_id, delta) in &stock_deltas {
            let product = state
                .products
                .get(product_id)
                .ok_or(LedgerError::ProductNotFound(*product_id))?;
            if product.stock_quantity + delta < 0 {
                return Err(LedgerError::NegativeStock {
                    product_id: *product_id,
                    delta: *delta,
                });
            }
        }
        for (coupon_id, delta) in &usage_deltas {
            let coupon = state
                .coupons
                .get(coupon_id)
                .ok_or(LedgerError::CouponNotFound(*coupon_id))?;
            if coupon.current_usage as i64 + delta < 0 {
                return Err(LedgerError::NegativeCouponUsage {
                    coupon_id: *coupon_id,
                    delta: *delta,
                });
            }
        }

        for write in batch.into_writes() {
            match write {
                StagedWrite::UpdateOrder(order) => {
                    state.orders.insert(order.id, order);
                }
                StagedWrite::UpdatePayment(payment) => {
                    if let Some(existing) =
                        state.payments.iter_mut().find(|p| p.id == payment.id)
                    {
                        *existing = payment;
                    } else {
                        state.payments.push(payment);
                    }
                }
                StagedWrite::AdjustStock { product_id, delta, at } => {
                    // Presence was validated above.
                    if let Some(product) = state.products.get_mut(&product_id) {
                        product.stock_quantity += delta;
                        product.updated_at = at;
                    }
                }
                StagedWrite::AdjustCouponUsage { coupon_id, delta } => {
                    if let Some(coupon) = state.coupons.get_mut(&coupon_id) {
                        coupon.current_usage = (coupon.current_usage as i64 + delta) as u32;
                    }
                }
                StagedWrite::UpdateUserCoupon(user_coupon) => {
                    state.user_coupons.insert(user_coupon.id, user_coupon);
                }
                StagedWrite::UpdateShippingMethod(method) => {
                    state.shipping_methods.insert(method.id, method);
                }
                StagedWrite::AppendShippingHistory(event) => {
                    state.shipping_history.push(event);
                }
            }
        }

        state.commit_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Money;

    fn product(stock: i64) -> Product {
        Product::new(ProductId::new(), "Widget", Money::from_minor(1000), stock)
    }

    #[tokio::test]
    async fn commit_applies_stock_adjustment() {
        let ledger = InMemoryLedger::new();
        let p = product(10);
        let product_id = p.id;
        ledger.insert_product(p).await;

        let mut batch = WriteBatch::new();
        batch.adjust_stock(product_id, 3, Utc::now());
        ledger
            .commit(batch, &CancellationToken::new())
            .await
            .unwrap();

        let stored = ledger.product(product_id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 13);
        assert_eq!(ledger.commit_count().await, 1);
    }

    #[tokio::test]
    async fn commit_rejects_negative_stock_atomically() {
        let ledger = InMemoryLedger::new();
        let p = product(2);
        let product_id = p.id;
        ledger.insert_product(p).await;

        let coupon = Coupon::new(CouponId::new(), "SAVE", Money::from_minor(500), 10);
        let coupon_id = coupon.id;
        ledger.insert_coupon(coupon).await;

        let mut batch = WriteBatch::new();
        batch.adjust_coupon_usage(coupon_id, 1);
        batch.adjust_stock(product_id, -5, Utc::now());

        let result = ledger.commit(batch, &CancellationToken::new()).await;
        assert!(matches!(result, Err(LedgerError::NegativeStock { .. })));

        // Nothing from the rejected batch may be visible.
        let stored = ledger.product(product_id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 2);
        let stored = ledger.coupon(coupon_id).await.unwrap().unwrap();
        assert_eq!(stored.current_usage, 0);
        assert_eq!(ledger.commit_count().await, 0);
    }

    #[tokio::test]
    async fn commit_rejects_negative_coupon_usage() {
        let ledger = InMemoryLedger::new();
        let coupon = Coupon::new(CouponId::new(), "SAVE", Money::from_minor(500), 10);
        let coupon_id = coupon.id;
        ledger.insert_coupon(coupon).await;

        let mut batch = WriteBatch::new();
        batch.adjust_coupon_usage(coupon_id, -1);

        let result = ledger.commit(batch, &CancellationToken::new()).await;
        assert!(matches!(
            result,
            Err(LedgerError::NegativeCouponUsage { .. })
        ));
    }

    #[tokio::test]
    async fn commit_honors_pre_start_cancellation() {
        let ledger = InMemoryLedger::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = ledger.commit(WriteBatch::new(), &cancel).await;
        assert!(matches!(result, Err(LedgerError::Cancelled)));
    }

    #[tokio::test]
    async fn used_coupons_filter_by_order() {
        let ledger = InMemoryLedger::new();
        let order_id = OrderId::new();
        let user_id = UserId::new();

        let mut used = UserCoupon::new(UserCouponId::new(), CouponId::new(), user_id);
        used.redeem(order_id, Utc::now());
        let unused = UserCoupon::new(UserCouponId::new(), CouponId::new(), user_id);
        let mut other = UserCoupon::new(UserCouponId::new(), CouponId::new(), user_id);
        other.redeem(OrderId::new(), Utc::now());

        ledger.insert_user_coupon(used.clone()).await;
        ledger.insert_user_coupon(unused).await;
        ledger.insert_user_coupon(other).await;

        let found = ledger.used_coupons_for_order(order_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, used.id);
    }
}
