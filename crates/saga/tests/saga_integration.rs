//! End-to-end tests for the payment-callback saga.

use std::sync::Arc;

use chrono::Utc;
use common::{
    CouponId, Money, OrderId, PaymentId, ProductId, ShippingMethodId, UserCouponId, UserId,
};
use domain::{
    Address, CarrierProvider, Coupon, Order, OrderItem, OrderShippingMethod, OrderStatus, Payment,
    PaymentStatus, Product, ShipmentState, UserCoupon,
};
use ledger::{InMemoryLedger, Ledger};
use saga::{CallbackOutcome, FulfillmentOutcome, PaymentCallbackResult, SagaDriver, ShipmentProfile};
use tokio_util::sync::CancellationToken;

use carrier::{CarrierRegistry, InMemoryCarrier};

struct TestHarness {
    ledger: InMemoryLedger,
    carrier: InMemoryCarrier,
    driver: SagaDriver<InMemoryLedger>,
    cancel: CancellationToken,
}

impl TestHarness {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_test_writer()
            .try_init();

        let ledger = InMemoryLedger::new();
        let carrier = InMemoryCarrier::new();
        let registry =
            CarrierRegistry::new().with(CarrierProvider::Ghn, Arc::new(carrier.clone()));
        let driver = SagaDriver::new(ledger.clone(), registry, ShipmentProfile::default());

        Self {
            ledger,
            carrier,
            driver,
            cancel: CancellationToken::new(),
        }
    }

    fn complete_address(user_id: UserId) -> Address {
        Address {
            user_id: Some(user_id),
            recipient_name: "Nguyen Van A".to_string(),
            phone: "0900000000".to_string(),
            street: "1 Le Loi".to_string(),
            ward_name: "Ben Nghe".to_string(),
            district_name: "District 1".to_string(),
            province_name: "Ho Chi Minh".to_string(),
        }
    }

    /// Seeds a paid-for order with one 2x and one 1x line, a pending
    /// payment, a GHN shipping leg and a complete destination address.
    async fn seed_order(&self) -> Order {
        let user_id = UserId::new();
        let order = Order::new(
            OrderId::new(),
            Some(user_id),
            Money::from_minor(500_000),
            Money::from_minor(30_000),
            Money::zero(),
        );
        self.ledger.insert_order(order.clone()).await;
        self.ledger
            .insert_address(user_id, Self::complete_address(user_id))
            .await;

        let product_x = Product::new(ProductId::new(), "Widget", Money::from_minor(200_000), 10);
        let product_y = Product::new(ProductId::new(), "Gadget", Money::from_minor(100_000), 5);
        self.ledger
            .insert_item(OrderItem::new(
                order.id,
                product_x.id,
                "Widget",
                2,
                product_x.price,
            ))
            .await;
        self.ledger
            .insert_item(OrderItem::new(
                order.id,
                product_y.id,
                "Gadget",
                1,
                product_y.price,
            ))
            .await;
        self.ledger.insert_product(product_x).await;
        self.ledger.insert_product(product_y).await;

        self.ledger
            .insert_payment(Payment::new(
                PaymentId::new(),
                order.id,
                "VNPAY",
                order.final_amount,
            ))
            .await;
        self.ledger
            .insert_shipping_method(OrderShippingMethod::new(
                ShippingMethodId::new(),
                order.id,
                "GHN",
                "GHN Standard",
                Money::from_minor(30_000),
            ))
            .await;

        order
    }

    /// Seeds a coupon with the given global usage and a redemption of it
    /// recorded against the order.
    async fn seed_redeemed_coupon(&self, order: &Order, current_usage: u32) -> CouponId {
        let mut coupon = Coupon::new(CouponId::new(), "SAVE10", Money::from_minor(10_000), 100);
        coupon.current_usage = current_usage;
        let coupon_id = coupon.id;
        self.ledger.insert_coupon(coupon).await;

        let mut redeemed =
            UserCoupon::new(UserCouponId::new(), coupon_id, order.user_id.unwrap());
        redeemed.redeem(order.id, Utc::now());
        self.ledger.insert_user_coupon(redeemed).await;

        coupon_id
    }

    async fn handle(&self, callback: &PaymentCallbackResult) -> CallbackOutcome {
        self.driver
            .handle_payment_callback(callback, &self.cancel)
            .await
            .unwrap()
    }

    fn success(order_id: OrderId) -> PaymentCallbackResult {
        PaymentCallbackResult {
            order_id,
            success: true,
            processor: "VNPAY".to_string(),
            processor_reference: Some("VNP-20260829-001".to_string()),
            raw_response: "code=00".to_string(),
        }
    }

    fn failure(order_id: OrderId) -> PaymentCallbackResult {
        PaymentCallbackResult {
            order_id,
            success: false,
            processor: "VNPAY".to_string(),
            processor_reference: None,
            raw_response: "Gateway declined".to_string(),
        }
    }

    async fn stock_of(&self, product_id: ProductId) -> i64 {
        self.ledger
            .product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock_quantity
    }
}

#[tokio::test]
async fn test_happy_path_confirms_order_and_creates_shipment() {
    let h = TestHarness::new();
    let order = h.seed_order().await;

    let outcome = h.handle(&TestHarness::success(order.id)).await;

    let CallbackOutcome::Completed(FulfillmentOutcome::Created { tracking_number }) = outcome
    else {
        panic!("expected Created, got {outcome:?}");
    };
    assert!(h.carrier.has_shipment(&tracking_number));
    assert_eq!(h.ledger.commit_count().await, 1);

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);
    assert_eq!(stored.payment_status, PaymentStatus::Completed);

    let method = h
        .ledger
        .shipping_methods_for_order(order.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(method.state, ShipmentState::Created);
    assert_eq!(method.tracking_number.as_deref(), Some(tracking_number.as_str()));

    let history = h.ledger.shipping_history_for_order(order.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, "order_created");
}

#[tokio::test]
async fn test_duplicate_success_callback_creates_no_second_shipment() {
    let h = TestHarness::new();
    let order = h.seed_order().await;

    h.handle(&TestHarness::success(order.id)).await;
    let outcome = h.handle(&TestHarness::success(order.id)).await;

    assert_eq!(outcome, CallbackOutcome::AlreadyFinal);
    assert_eq!(h.carrier.create_call_count(), 1);
    assert_eq!(h.carrier.shipment_count(), 1);
    assert_eq!(h.ledger.commit_count().await, 1);
    assert_eq!(h.ledger.shipping_history_count().await, 1);
}

#[tokio::test]
async fn test_failure_callback_restores_stock_by_item_quantities() {
    let h = TestHarness::new();
    let order = h.seed_order().await;
    let items = h.ledger.items_for_order(order.id).await.unwrap();
    let (item_x, item_y) = (&items[0], &items[1]);

    let outcome = h.handle(&TestHarness::failure(order.id)).await;

    assert_eq!(outcome, CallbackOutcome::Compensated);
    // Stock reserved at checkout comes back exactly: +2 and +1.
    assert_eq!(h.stock_of(item_x.product_id).await, 12);
    assert_eq!(h.stock_of(item_y.product_id).await, 6);
}

#[tokio::test]
async fn test_failure_callback_releases_only_this_orders_coupons() {
    let h = TestHarness::new();
    let order = h.seed_order().await;
    let coupon_id = h.seed_redeemed_coupon(&order, 3).await;

    let unused = UserCoupon::new(UserCouponId::new(), coupon_id, order.user_id.unwrap());
    let unused_id = unused.id;
    h.ledger.insert_user_coupon(unused).await;

    h.handle(&TestHarness::failure(order.id)).await;

    let coupon = h.ledger.coupon(coupon_id).await.unwrap().unwrap();
    assert_eq!(coupon.current_usage, 2);

    let redeemed = h
        .ledger
        .used_coupons_for_order(order.id)
        .await
        .unwrap();
    assert!(redeemed.is_empty());

    let unused = h.ledger.user_coupon(unused_id).await.unwrap();
    assert!(unused.used_date.is_none());
    assert!(unused.order_id.is_none());
}

#[tokio::test]
async fn test_failure_callback_cancels_existing_shipment() {
    let h = TestHarness::new();
    let order = h.seed_order().await;

    // First callback succeeds and creates the carrier shipment.
    h.handle(&TestHarness::success(order.id)).await;
    assert_eq!(h.carrier.shipment_count(), 1);

    // Force the order back to a compensable state, as an operator-driven
    // re-settlement would, then deliver a failure verdict.
    let mut reopened = h.ledger.order(order.id).await.unwrap().unwrap();
    reopened.status = OrderStatus::Processing;
    reopened.payment_status = PaymentStatus::Pending;
    h.ledger.insert_order(reopened).await;
    h.ledger
        .insert_payment(Payment::new(
            PaymentId::new(),
            order.id,
            "VNPAY",
            order.final_amount,
        ))
        .await;

    let outcome = h.handle(&TestHarness::failure(order.id)).await;

    assert_eq!(outcome, CallbackOutcome::Compensated);
    assert_eq!(h.carrier.cancel_call_count(), 1);
    assert_eq!(h.carrier.shipment_count(), 0);

    let method = h
        .ledger
        .shipping_methods_for_order(order.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(method.state, ShipmentState::Cancelled);
    assert!(method.tracking_number.is_none());
}

#[tokio::test]
async fn test_carrier_refusal_keeps_tracking_for_reconciliation() {
    let h = TestHarness::new();
    let order = h.seed_order().await;

    let mut method = h
        .ledger
        .shipping_methods_for_order(order.id)
        .await
        .unwrap()
        .remove(0);
    method.record_created("GHN-STUCK", None, Utc::now());
    h.ledger.insert_shipping_method(method).await;
    h.carrier.set_fail_on_cancel(true);

    let outcome = h.handle(&TestHarness::failure(order.id)).await;

    // Compensation still completes; the shipment is left for an operator.
    assert_eq!(outcome, CallbackOutcome::Compensated);
    assert_eq!(h.carrier.cancel_call_count(), 1);

    let method = h
        .ledger
        .shipping_methods_for_order(order.id)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(method.tracking_number.as_deref(), Some("GHN-STUCK"));

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
}

#[tokio::test]
async fn test_incomplete_address_defers_shipping_but_confirms_payment() {
    let h = TestHarness::new();
    let order = h.seed_order().await;

    let mut incomplete = TestHarness::complete_address(order.user_id.unwrap());
    incomplete.ward_name = String::new();
    h.ledger
        .insert_address(order.user_id.unwrap(), incomplete)
        .await;

    let outcome = h.handle(&TestHarness::success(order.id)).await;

    assert_eq!(
        outcome,
        CallbackOutcome::Completed(FulfillmentOutcome::MissingDestinationField("ward_name"))
    );
    // Validation short-circuits before any carrier traffic.
    assert_eq!(h.carrier.create_call_count(), 0);

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Completed);

    let method = h
        .ledger
        .shipping_methods_for_order(order.id)
        .await
        .unwrap()
        .remove(0);
    assert!(method.tracking_number.is_none());
    assert_eq!(method.state, ShipmentState::NotCreated);
}

#[tokio::test]
async fn test_carrier_rejection_does_not_fail_the_payment() {
    let h = TestHarness::new();
    let order = h.seed_order().await;
    h.carrier.set_fail_on_create(true);

    let outcome = h.handle(&TestHarness::success(order.id)).await;

    assert_eq!(
        outcome,
        CallbackOutcome::Completed(FulfillmentOutcome::CarrierRejected)
    );
    assert_eq!(h.ledger.commit_count().await, 1);

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Confirmed);
    assert_eq!(stored.payment_status, PaymentStatus::Completed);
    assert_eq!(h.ledger.shipping_history_count().await, 0);
}

#[tokio::test]
async fn test_end_to_end_compensation_scenario() {
    let h = TestHarness::new();
    let order = h.seed_order().await;
    let coupon_id = h.seed_redeemed_coupon(&order, 1).await;
    let items = h.ledger.items_for_order(order.id).await.unwrap();
    let product_x = items[0].product_id;

    let outcome = h.handle(&TestHarness::failure(order.id)).await;

    assert_eq!(outcome, CallbackOutcome::Compensated);
    assert_eq!(h.ledger.commit_count().await, 1);
    assert_eq!(h.carrier.create_call_count(), 0);
    assert_eq!(h.carrier.cancel_call_count(), 0);

    assert_eq!(h.stock_of(product_x).await, 12);
    let coupon = h.ledger.coupon(coupon_id).await.unwrap().unwrap();
    assert_eq!(coupon.current_usage, 0);

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
    assert_eq!(stored.payment_status, PaymentStatus::Failed);
    assert_eq!(stored.note.as_deref(), Some("Gateway declined"));

    let payments = h.ledger.payments_for_order(order.id).await.unwrap();
    assert_eq!(payments[0].status, PaymentStatus::Failed);
    assert_eq!(
        payments[0].processor_response.as_deref(),
        Some("Gateway declined")
    );
}

#[tokio::test]
async fn test_cancellation_before_commit_leaves_ledger_untouched() {
    let h = TestHarness::new();
    let order = h.seed_order().await;
    h.cancel.cancel();

    let result = h
        .driver
        .handle_payment_callback(&TestHarness::success(order.id), &h.cancel)
        .await;

    assert!(result.is_err());
    assert_eq!(h.ledger.commit_count().await, 0);
    assert_eq!(h.carrier.create_call_count(), 0);

    let stored = h.ledger.order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}
