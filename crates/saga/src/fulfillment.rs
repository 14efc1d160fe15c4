//! Shipping-order creation after a confirmed payment.

use chrono::Utc;
use common::Money;
use domain::{Order, OrderItem, PaymentMethod, Product, ShipmentCreatedData, ShippingHistory};
use ledger::{Ledger, WriteBatch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use carrier::{CarrierRegistry, CreateShipmentRequest, ShipmentItem, ShipmentQuote};

use crate::error::Result;
use crate::profile::ShipmentProfile;

/// What the fulfillment trigger did, or why it quietly did nothing.
///
/// None of these is an error: every expected non-event (no shipping leg,
/// already shipped, no carrier, incomplete destination, carrier rejection)
/// leaves the payment-success path intact and is reported here for callers
/// and tests that care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// A shipping order was created and its tracking reference staged.
    Created { tracking_number: String },
    /// A tracking number already exists; duplicate callback, nothing done.
    AlreadyCreated,
    /// The order has no shipping-method row; nothing to ship.
    NoShippingLeg,
    /// The configured provider has no registered carrier.
    NoCarrier,
    /// The order has no resolvable destination address.
    NoDestination,
    /// The destination is missing a carrier-required field.
    MissingDestinationField(&'static str),
    /// The carrier rejected the request or the call failed.
    CarrierRejected,
    /// Cancelled before the carrier call, or an unexpected internal fault.
    Skipped,
}

/// Materializes a shipping order with the configured carrier after a
/// trusted payment-success signal, idempotently and auditably.
pub struct FulfillmentTrigger<L> {
    ledger: L,
    registry: CarrierRegistry,
    profile: ShipmentProfile,
}

impl<L: Ledger> FulfillmentTrigger<L> {
    /// Creates a new fulfillment trigger.
    pub fn new(ledger: L, registry: CarrierRegistry, profile: ShipmentProfile) -> Self {
        Self {
            ledger,
            registry,
            profile,
        }
    }

    /// Creates a carrier shipping order for every shipping-method row of a
    /// paid order that does not have one yet.
    ///
    /// Stages the tracking references and the initial shipment history events
    /// into `batch`; the caller owns the commit. Never fails: unexpected
    /// internal faults are logged and reported as
    /// [`FulfillmentOutcome::Skipped`] so a shipping hiccup cannot fail the
    /// payment-success response path.
    #[tracing::instrument(skip(self, order, batch, cancel), fields(order_id = %order.id))]
    pub async fn create_shipping_order_after_payment_success(
        &self,
        order: &Order,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) -> FulfillmentOutcome {
        match self.try_create(order, batch, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                metrics::counter!("fulfillment_internal_faults").increment(1);
                error!(order_id = %order.id, error = %e, "fulfillment failed unexpectedly");
                FulfillmentOutcome::Skipped
            }
        }
    }

    async fn try_create(
        &self,
        order: &Order,
        batch: &mut WriteBatch,
        cancel: &CancellationToken,
    ) -> Result<FulfillmentOutcome> {
        let methods = self.ledger.shipping_methods_for_order(order.id).await?;
        if methods.is_empty() {
            debug!(order_id = %order.id, "order has no shipping leg");
            return Ok(FulfillmentOutcome::NoShippingLeg);
        }

        // Idempotency guard: rows with a live shipment belong to retried or
        // duplicated gateway callbacks and get no second create call.
        let pending: Vec<_> = methods.into_iter().filter(|m| !m.has_shipment()).collect();
        if pending.is_empty() {
            debug!(order_id = %order.id, "all shipping orders already created; nothing to do");
            return Ok(FulfillmentOutcome::AlreadyCreated);
        }

        let request = match self.build_request(order).await? {
            Ok(request) => request,
            Err(outcome) => return Ok(outcome),
        };

        if cancel.is_cancelled() {
            debug!(order_id = %order.id, "cancelled before carrier call");
            return Ok(FulfillmentOutcome::Skipped);
        }

        // Rows are handled independently, like the compensation path: one
        // row's rejection never stops the next.
        let mut first_created: Option<String> = None;
        let mut unregistered_provider = false;
        for mut method in pending {
            let Some(client) = self.registry.resolve_name(&method.provider_name) else {
                warn!(
                    order_id = %order.id,
                    provider = %method.provider_name,
                    "no carrier registered for provider; shipping deferred"
                );
                unregistered_provider = true;
                continue;
            };

            let response = match client.create_order(&request).await {
                Ok(response) => response,
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "carrier create call failed");
                    continue;
                }
            };
            let created = match response.payload() {
                Ok(created) => created.clone(),
                Err(e) => {
                    error!(
                        order_id = %order.id,
                        message = %response.message,
                        error = %e,
                        "carrier did not return a usable shipment"
                    );
                    continue;
                }
            };

            let now = Utc::now();
            method.record_created(&created.order_code, created.expected_delivery, now);
            let data = ShipmentCreatedData {
                carrier_order_code: created.order_code.clone(),
                fee: created.fee,
                expected_delivery: created.expected_delivery,
            };
            let history = ShippingHistory::order_created(method.id, order.id, &data, now);
            batch.update_shipping_method(method);
            batch.append_shipping_history(history);

            metrics::counter!("fulfillment_shipments_created").increment(1);
            debug!(order_id = %order.id, tracking_number = %created.order_code, "shipping order created");
            first_created.get_or_insert(created.order_code);
        }

        Ok(match first_created {
            Some(tracking_number) => FulfillmentOutcome::Created { tracking_number },
            None if unregistered_provider => FulfillmentOutcome::NoCarrier,
            None => FulfillmentOutcome::CarrierRejected,
        })
    }

    /// Quotes the shipping order without creating it.
    ///
    /// Shares the create path's validation; any short-circuit yields `None`.
    #[tracing::instrument(skip(self, order, cancel), fields(order_id = %order.id))]
    pub async fn preview_shipping_order(
        &self,
        order: &Order,
        cancel: &CancellationToken,
    ) -> Option<ShipmentQuote> {
        let methods = self.ledger.shipping_methods_for_order(order.id).await.ok()?;
        let method = methods.into_iter().next()?;
        let client = self.registry.resolve_name(&method.provider_name)?;

        let request = match self.build_request(order).await {
            Ok(Ok(request)) => request,
            Ok(Err(_)) | Err(_) => return None,
        };
        if cancel.is_cancelled() {
            return None;
        }

        match client.preview_order(&request).await {
            Ok(response) => response.payload().ok().cloned(),
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "carrier preview call failed");
                None
            }
        }
    }

    /// Builds the carrier request, or reports the validation short-circuit
    /// that prevented it.
    async fn build_request(
        &self,
        order: &Order,
    ) -> Result<std::result::Result<CreateShipmentRequest, FulfillmentOutcome>> {
        let Some(user_id) = order.user_id else {
            warn!(order_id = %order.id, "guest order has no destination address; shipping deferred");
            return Ok(Err(FulfillmentOutcome::NoDestination));
        };
        let Some(destination) = self.ledger.default_address(user_id).await? else {
            warn!(order_id = %order.id, "user has no default address; shipping deferred");
            return Ok(Err(FulfillmentOutcome::NoDestination));
        };
        if let Some(field) = destination.missing_carrier_field() {
            warn!(order_id = %order.id, field, "destination address incomplete; shipping deferred");
            return Ok(Err(FulfillmentOutcome::MissingDestinationField(field)));
        }

        let items = self.ledger.items_for_order(order.id).await?;
        let mut lines = Vec::with_capacity(items.len());
        let mut total_weight: u32 = 0;
        for item in &items {
            let product = self.ledger.product(item.product_id).await?;
            let line = self.to_shipment_item(item, product.as_ref());
            total_weight =
                total_weight.saturating_add(line.weight_grams.saturating_mul(line.quantity));
            lines.push(line);
        }
        if total_weight == 0 {
            total_weight = self.profile.default_weight_grams;
        }

        let cod_amount = match order.payment_method {
            PaymentMethod::CashOnDelivery => order.final_amount,
            PaymentMethod::OnlineGateway => Money::zero(),
        };

        Ok(Ok(CreateShipmentRequest {
            client_order_code: order.id.to_string(),
            destination,
            items: lines,
            cod_amount,
            insurance_value: self.profile.insurance_value(order.product_subtotal),
            weight_grams: total_weight,
            length_cm: self.profile.default_length_cm,
            width_cm: self.profile.default_width_cm,
            height_cm: self.profile.default_height_cm,
            required_note: self.profile.required_note.clone(),
            pickup_time: Utc::now() + self.profile.pickup_lead,
        }))
    }

    fn to_shipment_item(&self, item: &OrderItem, product: Option<&Product>) -> ShipmentItem {
        let weight_grams = product
            .and_then(|p| p.weight_grams)
            .unwrap_or(self.profile.default_weight_grams);
        let (length_cm, width_cm, height_cm) = product.and_then(|p| p.dimensions_cm).unwrap_or((
            self.profile.default_length_cm,
            self.profile.default_width_cm,
            self.profile.default_height_cm,
        ));

        ShipmentItem {
            name: item.product_name.clone(),
            quantity: item.quantity,
            price: item.unit_price,
            weight_grams,
            length_cm,
            width_cm,
            height_cm,
        }
    }
}
