//! Compensating transactions for a failed order.
//!
//! Every public method here follows the "best-effort cleanup, never make
//! things worse" contract: failures while loading rows or talking to a
//! carrier are logged with the order id and absorbed, so a broken rollback
//! step never blocks the caller's response to the payment gateway. The only
//! errors that propagate are caller contract violations.

use chrono::Utc;
use domain::{Order, Payment};
use ledger::{Ledger, WriteBatch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use carrier::CarrierRegistry;

use crate::error::{Result, SagaError};

/// Reverses the side effects of a failed order: restores stock and coupon
/// counters, flips order/payment status, and cancels any shipping order
/// already created at the carrier.
pub struct CompensationEngine<L> {
    ledger: L,
    registry: CarrierRegistry,
}

impl<L: Ledger> CompensationEngine<L> {
    /// Creates a new compensation engine.
    pub fn new(ledger: L, registry: CarrierRegistry) -> Self {
        Self { ledger, registry }
    }

    /// Stages the reversal of stock and coupon side effects.
    ///
    /// Stock reserved at checkout is restored by the item quantity; coupon
    /// redemptions recorded against this order are released and their global
    /// usage counters decremented. All mutations are staged into `batch`;
    /// the caller owns the commit.
    ///
    /// Never fails: on an internal error the method logs and returns with
    /// whatever was staged before the fault.
    #[tracing::instrument(skip(self, order, batch, cancel), fields(order_id = %order.id))]
    pub async fn restore_stock_and_coupons(
        &self,
        order: &Order,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) {
        // A rollback is worth finishing even under late cancellation.
        if cancel.is_cancelled() {
            debug!(order_id = %order.id, "cancellation requested; completing restore anyway");
        }

        if let Err(e) = self.try_restore(order, batch).await {
            metrics::counter!("compensation_restore_failures").increment(1);
            error!(
                order_id = %order.id,
                error = %e,
                "stock/coupon restore failed partway; staged writes so far are kept"
            );
        }
    }

    async fn try_restore(&self, order: &Order, batch: &mut WriteBatch) -> Result<()> {
        let now = Utc::now();

        let items = self.ledger.items_for_order(order.id).await?;
        for item in &items {
            batch.adjust_stock(item.product_id, item.quantity as i64, now);
        }
        debug!(order_id = %order.id, items = items.len(), "staged stock restore");

        let used_coupons = self.ledger.used_coupons_for_order(order.id).await?;
        for mut user_coupon in used_coupons {
            // Decrement the global counter only when it has room; the
            // redemption record is cleared either way.
            match self.ledger.coupon(user_coupon.coupon_id).await? {
                Some(coupon) if coupon.current_usage > 0 => {
                    batch.adjust_coupon_usage(coupon.id, -1);
                }
                Some(_) => {
                    warn!(
                        order_id = %order.id,
                        coupon_id = %user_coupon.coupon_id,
                        "coupon usage already zero; releasing redemption without decrement"
                    );
                }
                None => {
                    warn!(
                        order_id = %order.id,
                        coupon_id = %user_coupon.coupon_id,
                        "redeemed coupon no longer exists; releasing redemption only"
                    );
                }
            }
            user_coupon.release();
            batch.update_user_coupon(user_coupon);
        }

        Ok(())
    }

    /// Marks the order Failed with a note and stages the update.
    ///
    /// Pure state transition; the only failure is an empty note, which is a
    /// caller bug and fails fast.
    pub fn mark_order_failed(
        &self,
        order: &mut Order,
        note: &str,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if note.trim().is_empty() {
            return Err(SagaError::InvalidArgument(
                "order failure note must not be empty".to_string(),
            ));
        }
        order.mark_failed(note, Utc::now());
        batch.update_order(order.clone());
        Ok(())
    }

    /// Marks a payment Failed with the gateway's raw response and stages
    /// the update.
    ///
    /// Fails fast when the payment does not belong to the order.
    pub fn mark_payment_failed(
        &self,
        order: &Order,
        payment: &mut Payment,
        processor_response: &str,
        batch: &mut WriteBatch,
    ) -> Result<()> {
        if payment.order_id != order.id {
            return Err(SagaError::InvalidArgument(format!(
                "payment {} belongs to order {}, not {}",
                payment.id, payment.order_id, order.id
            )));
        }
        payment.mark_failed(processor_response, Utc::now());
        batch.update_payment(payment.clone());
        Ok(())
    }

    /// Cancels any shipping order already created at the carrier.
    ///
    /// Each shipping-method row is handled independently: rows without a
    /// live shipment are idempotent no-ops, rows whose provider has no
    /// registered carrier are skipped with a warning, and a carrier failure
    /// on one row never stops the next. On carrier-confirmed cancellation
    /// the tracking number is cleared (freeing the row for a retry); on
    /// failure it is left intact for manual reconciliation.
    #[tracing::instrument(skip(self, order, batch, cancel), fields(order_id = %order.id))]
    pub async fn cancel_shipping_order_if_created(
        &self,
        order: &Order,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            debug!(order_id = %order.id, "cancellation requested; completing shipment cancel anyway");
        }

        let methods = match self.ledger.shipping_methods_for_order(order.id).await {
            Ok(methods) => methods,
            Err(e) => {
                error!(order_id = %order.id, error = %e, "could not load shipping methods");
                return;
            }
        };

        for mut method in methods {
            let Some(tracking_number) = method.tracking_number.clone() else {
                debug!(
                    order_id = %order.id,
                    shipping_method_id = %method.id,
                    "no carrier shipment on this row; nothing to cancel"
                );
                continue;
            };

            let Some(client) = self.registry.resolve_name(&method.provider_name) else {
                warn!(
                    order_id = %order.id,
                    provider = %method.provider_name,
                    "no carrier registered for provider; leaving shipment for manual reconciliation"
                );
                continue;
            };

            match client.cancel_order(&tracking_number).await {
                Ok(response) if response.success => {
                    method.record_cancelled(Utc::now());
                    batch.update_shipping_method(method);
                    metrics::counter!("compensation_shipments_cancelled").increment(1);
                    debug!(order_id = %order.id, %tracking_number, "carrier shipment cancelled");
                }
                Ok(response) => {
                    error!(
                        order_id = %order.id,
                        %tracking_number,
                        message = %response.message,
                        "carrier refused cancellation; tracking number left intact"
                    );
                }
                Err(e) => {
                    error!(
                        order_id = %order.id,
                        %tracking_number,
                        error = %e,
                        "carrier cancel call failed; tracking number left intact"
                    );
                }
            }
        }
    }
}
