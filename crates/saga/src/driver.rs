//! Payment-callback saga driver.
//!
//! The single entry point reacting to a trusted payment-gateway callback.
//! It loads the order, chooses the forward path (confirm + create shipping
//! order) or the compensation path (fail + restore + cancel shipment), and
//! commits all staged writes for the callback in one unit of work.

use std::time::Instant;

use chrono::Utc;
use common::OrderId;
use ledger::{Ledger, WriteBatch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use carrier::CarrierRegistry;

use crate::compensation::CompensationEngine;
use crate::error::{Result, SagaError};
use crate::fulfillment::{FulfillmentOutcome, FulfillmentTrigger};
use crate::profile::ShipmentProfile;

/// A payment gateway's verdict on an order, already signature-verified by
/// the caller.
#[derive(Debug, Clone)]
pub struct PaymentCallbackResult {
    pub order_id: OrderId,
    pub success: bool,
    /// Gateway processor name, e.g. "VNPAY".
    pub processor: String,
    /// Gateway-side transaction reference, when one was issued.
    pub processor_reference: Option<String>,
    /// Raw gateway response, kept verbatim for reconciliation.
    pub raw_response: String,
}

/// What a payment callback did to the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Payment confirmed; carries what fulfillment did.
    Completed(FulfillmentOutcome),
    /// Payment failed; side effects were reversed.
    Compensated,
    /// The order's payment was already in a terminal state; nothing done.
    AlreadyFinal,
}

/// Drives the post-payment saga: forward on success, compensation on
/// failure, exactly one ledger commit per handled callback.
pub struct SagaDriver<L> {
    ledger: L,
    fulfillment: FulfillmentTrigger<L>,
    compensation: CompensationEngine<L>,
}

impl<L: Ledger + Clone> SagaDriver<L> {
    /// Creates a driver wiring the fulfillment trigger and compensation
    /// engine over the same ledger and carrier registry.
    pub fn new(ledger: L, registry: CarrierRegistry, profile: ShipmentProfile) -> Self {
        Self {
            fulfillment: FulfillmentTrigger::new(ledger.clone(), registry.clone(), profile),
            compensation: CompensationEngine::new(ledger.clone(), registry),
            ledger,
        }
    }

    /// Handles one payment-gateway callback.
    ///
    /// Duplicate callbacks are acknowledged as [`CallbackOutcome::AlreadyFinal`]
    /// without writes, so the gateway can retry safely. All staged writes for
    /// a callback land in a single commit; a failed commit leaves the order
    /// untouched and the error propagates for the caller's retry policy.
    #[tracing::instrument(skip(self, callback, cancel), fields(order_id = %callback.order_id, success = callback.success))]
    pub async fn handle_payment_callback(
        &self,
        callback: &PaymentCallbackResult,
        cancel: &CancellationToken,
    ) -> Result<CallbackOutcome> {
        let started = Instant::now();
        metrics::counter!("payment_callbacks_total").increment(1);

        let mut order = self
            .ledger
            .order(callback.order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(callback.order_id))?;

        if order.payment_status.is_terminal() {
            warn!(
                order_id = %order.id,
                payment_status = %order.payment_status,
                "payment already settled; acknowledging duplicate callback"
            );
            return Ok(CallbackOutcome::AlreadyFinal);
        }

        let mut batch = WriteBatch::new();
        let outcome = if callback.success {
            self.confirm(&mut order, callback, &mut batch, cancel).await?
        } else {
            self.compensate(&mut order, callback, &mut batch, cancel)
                .await?
        };

        self.ledger.commit(batch, cancel).await?;

        metrics::histogram!("saga_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(order_id = %order.id, outcome = ?outcome, "payment callback handled");
        Ok(outcome)
    }

    /// Forward path: confirm the order and payment, then try to create the
    /// carrier shipping order in the same unit of work.
    async fn confirm(
        &self,
        order: &mut domain::Order,
        callback: &PaymentCallbackResult,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) -> Result<CallbackOutcome> {
        let now = Utc::now();
        order.record_payment_success(now);
        batch.update_order(order.clone());

        if let Some(mut payment) = self.pending_payment(order.id).await? {
            payment.mark_completed(&callback.raw_response, now);
            batch.update_payment(payment);
        } else {
            warn!(order_id = %order.id, "no pending payment row to complete");
        }

        let fulfillment = self
            .fulfillment
            .create_shipping_order_after_payment_success(order, batch, cancel)
            .await;
        Ok(CallbackOutcome::Completed(fulfillment))
    }

    /// Compensation path: fail the payment and order, reverse stock and
    /// coupon side effects, cancel any existing carrier shipment.
    async fn compensate(
        &self,
        order: &mut domain::Order,
        callback: &PaymentCallbackResult,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) -> Result<CallbackOutcome> {
        metrics::counter!("compensations_total").increment(1);

        // Gateways may send an empty body on failure; the mark transitions
        // require a non-empty note, so substitute one for blank input.
        let note = if callback.raw_response.trim().is_empty() {
            "Payment failed"
        } else {
            callback.raw_response.as_str()
        };

        if let Some(mut payment) = self.pending_payment(order.id).await? {
            self.compensation
                .mark_payment_failed(order, &mut payment, note, batch)?;
        } else {
            warn!(order_id = %order.id, "no pending payment row to fail");
        }
        self.compensation.mark_order_failed(order, note, batch)?;
        self.compensation
            .restore_stock_and_coupons(order, batch, cancel)
            .await;
        self.compensation
            .cancel_shipping_order_if_created(order, batch, cancel)
            .await;

        Ok(CallbackOutcome::Compensated)
    }

    async fn pending_payment(&self, order_id: OrderId) -> Result<Option<domain::Payment>> {
        let payments = self.ledger.payments_for_order(order_id).await?;
        Ok(payments.into_iter().find(|p| !p.status.is_terminal()))
    }
}
