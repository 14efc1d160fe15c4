//! Orders and order items.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// The status of an order in its lifecycle.
///
/// Status transitions driven by the saga:
/// ```text
/// Pending ──► Processing ──► Confirmed ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting the payment-gateway outcome.
    #[default]
    Pending,

    /// Payment underway or confirmed, order being prepared.
    Processing,

    /// Payment confirmed, shipping order requested.
    Confirmed,

    /// Handed to the carrier.
    Shipped,

    /// Delivered to the recipient (terminal state).
    Delivered,

    /// Payment failed or the order was compensated (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Processing => "Processing",
            OrderStatus::Confirmed => "Confirmed",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of an order's payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PaymentStatus {
    /// Awaiting the gateway outcome.
    #[default]
    Pending,

    /// Gateway reported success (terminal state).
    Completed,

    /// Gateway reported failure (terminal state).
    Failed,
}

impl PaymentStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Completed => "Completed",
            PaymentStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

/// How the order is paid, deciding the cash-on-delivery flag sent to the carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PaymentMethod {
    /// Collected by the carrier on delivery.
    CashOnDelivery,

    /// Paid up front through a payment gateway.
    #[default]
    OnlineGateway,
}

/// An order with its monetary breakdown and saga-visible status fields.
///
/// Items, payments and the shipping leg are separate rows loaded on demand;
/// the order itself only carries the totals and the two status machines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Owning user; `None` for guest checkout.
    pub user_id: Option<UserId>,
    pub product_subtotal: Money,
    pub shipping_fee: Money,
    pub coupon_discount: Money,
    pub final_amount: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a pending order with the given monetary breakdown.
    pub fn new(
        id: OrderId,
        user_id: Option<UserId>,
        product_subtotal: Money,
        shipping_fee: Money,
        coupon_discount: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            product_subtotal,
            shipping_fee,
            coupon_discount,
            final_amount: product_subtotal + shipping_fee - coupon_discount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::OnlineGateway,
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Checks the amount invariant against the order's item rows.
    ///
    /// Enforced at checkout; the saga trusts it and never re-validates.
    pub fn validate_final_amount(&self, items: &[OrderItem]) -> Result<()> {
        let line_total: Money = items.iter().map(OrderItem::total_price).sum();
        let expected = line_total + self.shipping_fee - self.coupon_discount;
        if expected != self.final_amount {
            return Err(DomainError::AmountMismatch {
                expected: expected.minor(),
                actual: self.final_amount.minor(),
            });
        }
        Ok(())
    }

    /// Records a confirmed payment: payment status Completed, order moves forward.
    pub fn record_payment_success(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Completed;
        self.status = OrderStatus::Confirmed;
        self.updated_at = now;
    }

    /// Marks the order Failed with an operator-visible note.
    ///
    /// Keeps the invariant that a failed payment implies a failed order.
    pub fn mark_failed(&mut self, note: impl Into<String>, now: DateTime<Utc>) {
        self.status = OrderStatus::Failed;
        self.payment_status = PaymentStatus::Failed;
        self.note = Some(note.into());
        self.updated_at = now;
    }
}

/// A line item: a product snapshot at purchase time.
///
/// Immutable after creation; compensation touches the referenced product's
/// stock counter, never the item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    /// Unit price at purchase time.
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        order_id: OrderId,
        product_id: ProductId,
        product_name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            order_id,
            product_id,
            product_name: product_name.into(),
            quantity,
            unit_price,
        }
    }

    /// Returns the line total (quantity * unit price).
    pub fn total_price(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
