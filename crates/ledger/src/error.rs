use common::{CouponId, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Applying a staged stock adjustment would leave the counter negative.
    #[error("Stock adjustment for product {product_id} would go negative (delta {delta})")]
    NegativeStock { product_id: ProductId, delta: i64 },

    /// Applying a staged usage adjustment would leave the counter negative.
    #[error("Usage adjustment for coupon {coupon_id} would go negative (delta {delta})")]
    NegativeCouponUsage { coupon_id: CouponId, delta: i64 },

    /// A staged write references an entity the store does not hold.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A staged write references a product the store does not hold.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A staged write references a coupon the store does not hold.
    #[error("Coupon not found: {0}")]
    CouponNotFound(CouponId),

    /// The commit was abandoned before any write was applied.
    #[error("Commit cancelled before it started")]
    Cancelled,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
