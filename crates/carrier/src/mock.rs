//! In-memory carrier for testing.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;

use crate::client::{
    CarrierClient, CarrierResponse, CreateShipmentRequest, CreatedShipment, ShipmentQuote,
};
use crate::error::{CarrierError, Result};

#[derive(Debug, Default)]
struct InMemoryCarrierState {
    shipments: HashMap<String, CreateShipmentRequest>,
    next_id: u32,
    create_calls: usize,
    cancel_calls: usize,
    fail_on_create: bool,
    fail_on_cancel: bool,
    error_on_cancel: bool,
}

/// In-memory carrier client for testing.
///
/// Distinguishes provider-reported failures (`set_fail_on_*`, unsuccessful
/// response) from transport errors (`set_error_on_cancel`, `Err`), so tests
/// can exercise both halves of the saga's failure handling.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCarrier {
    state: Arc<RwLock<InMemoryCarrierState>>,
}

impl InMemoryCarrier {
    /// Creates a new in-memory carrier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes create calls come back as provider-reported failures.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Makes cancel calls come back as provider-reported failures.
    pub fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().unwrap().fail_on_cancel = fail;
    }

    /// Makes cancel calls fail at the transport level.
    pub fn set_error_on_cancel(&self, error: bool) {
        self.state.write().unwrap().error_on_cancel = error;
    }

    /// Returns the number of create calls made, including failed ones.
    pub fn create_call_count(&self) -> usize {
        self.state.read().unwrap().create_calls
    }

    /// Returns the number of cancel calls made, including failed ones.
    pub fn cancel_call_count(&self) -> usize {
        self.state.read().unwrap().cancel_calls
    }

    /// Returns the number of live shipments.
    pub fn shipment_count(&self) -> usize {
        self.state.read().unwrap().shipments.len()
    }

    /// Returns true if a shipment exists with the given tracking number.
    pub fn has_shipment(&self, tracking_number: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .shipments
            .contains_key(tracking_number)
    }

    /// Returns the request of the most recently created shipment.
    pub fn last_create_request(&self) -> Option<CreateShipmentRequest> {
        let state = self.state.read().unwrap();
        let last_code = format!("TRACK-{:04}", state.next_id);
        state.shipments.get(&last_code).cloned()
    }
}

#[async_trait]
impl CarrierClient for InMemoryCarrier {
    async fn create_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<CreatedShipment>> {
        let mut state = self.state.write().unwrap();
        state.create_calls += 1;

        if state.fail_on_create {
            return Ok(CarrierResponse::failure("route not serviceable"));
        }

        state.next_id += 1;
        let order_code = format!("TRACK-{:04}", state.next_id);
        state.shipments.insert(order_code.clone(), request.clone());

        Ok(CarrierResponse::ok(
            "Success",
            CreatedShipment {
                order_code,
                fee: Money::from_minor(30_000),
                expected_delivery: Some(request.pickup_time + chrono::Duration::days(3)),
            },
        ))
    }

    async fn cancel_order(&self, tracking_number: &str) -> Result<CarrierResponse<()>> {
        let mut state = self.state.write().unwrap();
        state.cancel_calls += 1;

        if state.error_on_cancel {
            return Err(CarrierError::Protocol("connection reset".to_string()));
        }
        if state.fail_on_cancel {
            return Ok(CarrierResponse::failure("order already picked up"));
        }

        state.shipments.remove(tracking_number);
        Ok(CarrierResponse::ack("Success"))
    }

    async fn preview_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<ShipmentQuote>> {
        Ok(CarrierResponse::ok(
            "Success",
            ShipmentQuote {
                fee: Money::from_minor(30_000),
                expected_delivery: Some(request.pickup_time + chrono::Duration::days(3)),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::Address;

    fn request() -> CreateShipmentRequest {
        CreateShipmentRequest {
            client_order_code: "order-1".to_string(),
            destination: Address {
                user_id: None,
                recipient_name: "Nguyen Van A".to_string(),
                phone: "0900000000".to_string(),
                street: "1 Le Loi".to_string(),
                ward_name: "Ben Nghe".to_string(),
                district_name: "District 1".to_string(),
                province_name: "Ho Chi Minh".to_string(),
            },
            items: vec![],
            cod_amount: Money::zero(),
            insurance_value: Money::zero(),
            weight_grams: 500,
            length_cm: 20,
            width_cm: 15,
            height_cm: 10,
            required_note: "KHONGCHOXEMHANG".to_string(),
            pickup_time: Utc::now(),
        }
    }

    #[tokio::test]
    async fn create_and_cancel() {
        let carrier = InMemoryCarrier::new();

        let response = carrier.create_order(&request()).await.unwrap();
        let created = response.payload().unwrap().clone();
        assert!(created.order_code.starts_with("TRACK-"));
        assert_eq!(carrier.shipment_count(), 1);

        let response = carrier.cancel_order(&created.order_code).await.unwrap();
        assert!(response.success);
        assert_eq!(carrier.shipment_count(), 0);
        assert_eq!(carrier.create_call_count(), 1);
        assert_eq!(carrier.cancel_call_count(), 1);
    }

    #[tokio::test]
    async fn fail_on_create_reports_provider_failure() {
        let carrier = InMemoryCarrier::new();
        carrier.set_fail_on_create(true);

        let response = carrier.create_order(&request()).await.unwrap();
        assert!(!response.success);
        assert_eq!(carrier.shipment_count(), 0);
        assert_eq!(carrier.create_call_count(), 1);
    }

    #[tokio::test]
    async fn error_on_cancel_is_transport_error() {
        let carrier = InMemoryCarrier::new();
        carrier.set_error_on_cancel(true);

        let result = carrier.cancel_order("TRACK-0001").await;
        assert!(result.is_err());
        assert_eq!(carrier.cancel_call_count(), 1);
    }
}
