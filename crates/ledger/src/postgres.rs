use async_trait::async_trait;
use common::{CouponId, Money, OrderId, PaymentId, ProductId, ShippingMethodId, UserCouponId, UserId};
use domain::{Address, Coupon, Order, OrderItem, OrderShippingMethod, Payment, Product, UserCoupon};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::{
    LedgerError, Result,
    batch::{StagedWrite, WriteBatch},
    store::Ledger,
};

/// PostgreSQL-backed ledger implementation.
///
/// Each [`Ledger::commit`] runs inside one database transaction; relative
/// counter adjustments are applied with guarded UPDATEs so concurrent sagas
/// compose without in-process locks.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

/// Status enums travel as their serde variant names in TEXT columns.
fn enum_to_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

fn enum_from_text<T: DeserializeOwned>(text: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(text))?)
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: row
                .try_get::<Option<Uuid>, _>("user_id")?
                .map(UserId::from_uuid),
            product_subtotal: Money::from_minor(row.try_get("product_subtotal")?),
            shipping_fee: Money::from_minor(row.try_get("shipping_fee")?),
            coupon_discount: Money::from_minor(row.try_get("coupon_discount")?),
            final_amount: Money::from_minor(row.try_get("final_amount")?),
            status: enum_from_text(row.try_get("status")?)?,
            payment_status: enum_from_text(row.try_get("payment_status")?)?,
            payment_method: enum_from_text(row.try_get("payment_method")?)?,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_item(row: PgRow) -> Result<OrderItem> {
        Ok(OrderItem {
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            product_name: row.try_get("product_name")?,
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            unit_price: Money::from_minor(row.try_get("unit_price")?),
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let length: Option<i32> = row.try_get("length_cm")?;
        let width: Option<i32> = row.try_get("width_cm")?;
        let height: Option<i32> = row.try_get("height_cm")?;
        let dimensions_cm = match (length, width, height) {
            (Some(l), Some(w), Some(h)) => Some((l as u32, w as u32, h as u32)),
            _ => None,
        };

        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            stock_quantity: row.try_get("stock_quantity")?,
            weight_grams: row
                .try_get::<Option<i32>, _>("weight_grams")?
                .map(|w| w as u32),
            dimensions_cm,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_coupon(row: PgRow) -> Result<Coupon> {
        Ok(Coupon {
            id: CouponId::from_uuid(row.try_get::<Uuid, _>("id")?),
            code: row.try_get("code")?,
            discount: Money::from_minor(row.try_get("discount")?),
            current_usage: row.try_get::<i32, _>("current_usage")? as u32,
            usage_limit: row.try_get::<i32, _>("usage_limit")? as u32,
        })
    }

    fn row_to_user_coupon(row: PgRow) -> Result<UserCoupon> {
        Ok(UserCoupon {
            id: UserCouponId::from_uuid(row.try_get::<Uuid, _>("id")?),
            coupon_id: CouponId::from_uuid(row.try_get::<Uuid, _>("coupon_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            order_id: row
                .try_get::<Option<Uuid>, _>("order_id")?
                .map(OrderId::from_uuid),
            used_date: row.try_get("used_date")?,
        })
    }

    fn row_to_payment(row: PgRow) -> Result<Payment> {
        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            processor: row.try_get("processor")?,
            amount: Money::from_minor(row.try_get("amount")?),
            status: enum_from_text(row.try_get("status")?)?,
            processor_response: row.try_get("processor_response")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_shipping_method(row: PgRow) -> Result<OrderShippingMethod> {
        Ok(OrderShippingMethod {
            id: ShippingMethodId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            provider_name: row.try_get("provider_name")?,
            method_name: row.try_get("method_name")?,
            state: enum_from_text(row.try_get("state")?)?,
            tracking_number: row.try_get("tracking_number")?,
            expected_delivery: row.try_get("expected_delivery")?,
            shipping_fee: Money::from_minor(row.try_get("shipping_fee")?),
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_address(row: PgRow) -> Result<Address> {
        Ok(Address {
            user_id: Some(UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?)),
            recipient_name: row.try_get("recipient_name")?,
            phone: row.try_get("phone")?,
            street: row.try_get("street")?,
            ward_name: row.try_get("ward_name")?,
            district_name: row.try_get("district_name")?,
            province_name: row.try_get("province_name")?,
        })
    }

    async fn apply_write(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        write: StagedWrite,
    ) -> Result<()> {
        match write {
            StagedWrite::UpdateOrder(order) => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET status = $1, payment_status = $2, note = $3, updated_at = $4
                    WHERE id = $5
                    "#,
                )
                .bind(enum_to_text(&order.status)?)
                .bind(enum_to_text(&order.payment_status)?)
                .bind(&order.note)
                .bind(order.updated_at)
                .bind(order.id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            StagedWrite::UpdatePayment(payment) => {
                sqlx::query(
                    r#"
                    UPDATE payments
                    SET status = $1, processor_response = $2, updated_at = $3
                    WHERE id = $4
                    "#,
                )
                .bind(enum_to_text(&payment.status)?)
                .bind(&payment.processor_response)
                .bind(payment.updated_at)
                .bind(payment.id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            StagedWrite::AdjustStock { product_id, delta, at } => {
                // Guarded relative adjustment; zero rows affected means the
                // product is missing or the counter would go negative.
                let result = sqlx::query(
                    r#"
                    UPDATE products
                    SET stock_quantity = stock_quantity + $1, updated_at = $2
                    WHERE id = $3 AND stock_quantity + $1 >= 0
                    "#,
                )
                .bind(delta)
                .bind(at)
                .bind(product_id.as_uuid())
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    let exists: Option<i64> =
                        sqlx::query_scalar("SELECT 1 FROM products WHERE id = $1")
                            .bind(product_id.as_uuid())
                            .fetch_optional(&mut **tx)
                            .await?;
                    return Err(if exists.is_some() {
                        LedgerError::NegativeStock { product_id, delta }
                    } else {
                        LedgerError::ProductNotFound(product_id)
                    });
                }
            }
            StagedWrite::AdjustCouponUsage { coupon_id, delta } => {
                let result = sqlx::query(
                    r#"
                    UPDATE coupons
                    SET current_usage = current_usage + $1
                    WHERE id = $2 AND current_usage + $1 >= 0
                    "#,
                )
                .bind(delta as i32)
                .bind(coupon_id.as_uuid())
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    let exists: Option<i64> =
                        sqlx::query_scalar("SELECT 1 FROM coupons WHERE id = $1")
                            .bind(coupon_id.as_uuid())
                            .fetch_optional(&mut **tx)
                            .await?;
                    return Err(if exists.is_some() {
                        LedgerError::NegativeCouponUsage { coupon_id, delta }
                    } else {
                        LedgerError::CouponNotFound(coupon_id)
                    });
                }
            }
            StagedWrite::UpdateUserCoupon(user_coupon) => {
                sqlx::query(
                    r#"
                    UPDATE user_coupons
                    SET order_id = $1, used_date = $2
                    WHERE id = $3
                    "#,
                )
                .bind(user_coupon.order_id.map(|id| id.as_uuid()))
                .bind(user_coupon.used_date)
                .bind(user_coupon.id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            StagedWrite::UpdateShippingMethod(method) => {
                sqlx::query(
                    r#"
                    UPDATE order_shipping_methods
                    SET state = $1, tracking_number = $2, expected_delivery = $3, updated_at = $4
                    WHERE id = $5
                    "#,
                )
                .bind(enum_to_text(&method.state)?)
                .bind(&method.tracking_number)
                .bind(method.expected_delivery)
                .bind(method.updated_at)
                .bind(method.id.as_uuid())
                .execute(&mut **tx)
                .await?;
            }
            StagedWrite::AppendShippingHistory(event) => {
                sqlx::query(
                    r#"
                    INSERT INTO shipping_history
                        (id, shipping_method_id, order_id, status_code, status_name,
                         event_type, event_time, extra_data)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(event.id)
                .bind(event.shipping_method_id.as_uuid())
                .bind(event.order_id.as_uuid())
                .bind(&event.status_code)
                .bind(&event.status_name)
                .bind(&event.event_type)
                .bind(event.event_time)
                .bind(&event.extra_data)
                .execute(&mut **tx)
                .await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_order).transpose()
    }

    async fn items_for_order(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_item).collect()
    }

    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_product).transpose()
    }

    async fn coupon(&self, id: CouponId) -> Result<Option<Coupon>> {
        let row = sqlx::query("SELECT * FROM coupons WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_coupon).transpose()
    }

    async fn used_coupons_for_order(&self, order_id: OrderId) -> Result<Vec<UserCoupon>> {
        let rows = sqlx::query(
            "SELECT * FROM user_coupons WHERE order_id = $1 AND used_date IS NOT NULL",
        )
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_user_coupon).collect()
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let rows =
            sqlx::query("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at")
                .bind(order_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Self::row_to_payment).collect()
    }

    async fn shipping_methods_for_order(
        &self,
        order_id: OrderId,
    ) -> Result<Vec<OrderShippingMethod>> {
        let rows =
            sqlx::query("SELECT * FROM order_shipping_methods WHERE order_id = $1 ORDER BY id")
                .bind(order_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter().map(Self::row_to_shipping_method).collect()
    }

    async fn default_address(&self, user_id: UserId) -> Result<Option<Address>> {
        let row = sqlx::query("SELECT * FROM user_addresses WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_address).transpose()
    }

    #[tracing::instrument(skip(self, batch, cancel), fields(writes = batch.len()))]
    async fn commit(&self, batch: WriteBatch, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(LedgerError::Cancelled);
        }
        if batch.is_empty() {
            return Ok(());
        }

        let writes = batch.len();
        let mut tx = self.pool.begin().await?;
        for write in batch.into_writes() {
            Self::apply_write(&mut tx, write).await?;
        }
        tx.commit().await?;
        debug!(writes, "batch committed");
        Ok(())
    }
}
