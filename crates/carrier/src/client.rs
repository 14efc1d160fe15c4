//! Provider-neutral carrier contract and wire-adjacent types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::Money;
use domain::Address;
use serde::{Deserialize, Serialize};

use crate::error::{CarrierError, Result};

/// A carrier operation outcome: the provider's success flag and
/// human-readable message, plus the payload when one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> CarrierResponse<T> {
    /// A successful response carrying a payload.
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// A provider-reported failure.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// Extracts the payload of a successful response.
    ///
    /// A success without a payload is a protocol violation on the
    /// carrier's side and is treated as a failure.
    pub fn payload(&self) -> Result<&T> {
        if !self.success {
            return Err(CarrierError::Protocol(format!(
                "payload requested from failed response: {}",
                self.message
            )));
        }
        self.data.as_ref().ok_or_else(|| {
            CarrierError::Protocol("success response carried no payload".to_string())
        })
    }
}

impl CarrierResponse<()> {
    /// A successful response with no payload (acknowledgement).
    pub fn ack(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(()),
        }
    }
}

/// One package line sent to the carrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub name: String,
    pub quantity: u32,
    pub price: Money,
    pub weight_grams: u32,
    pub length_cm: u32,
    pub width_cm: u32,
    pub height_cm: u32,
}

/// A provider-neutral create/preview shipping-order request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    /// Our order id, echoed back by the carrier for reconciliation.
    pub client_order_code: String,
    pub destination: Address,
    pub items: Vec<ShipmentItem>,
    /// Amount the carrier collects on delivery; zero for prepaid orders.
    pub cod_amount: Money,
    pub insurance_value: Money,
    /// Total package metrics, after per-product fallbacks were applied.
    pub weight_grams: u32,
    pub length_cm: u32,
    pub width_cm: u32,
    pub height_cm: u32,
    pub required_note: String,
    pub pickup_time: DateTime<Utc>,
}

/// Payload of a successful create-order call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedShipment {
    /// Carrier-assigned order code; stored as the tracking number.
    pub order_code: String,
    pub fee: Money,
    pub expected_delivery: Option<DateTime<Utc>>,
}

/// Payload of a successful preview call: quote only, nothing created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentQuote {
    pub fee: Money,
    pub expected_delivery: Option<DateTime<Utc>>,
}

/// One concrete client per supported provider.
///
/// Implementations are stateless from the saga's point of view; the only
/// persistent artifact is the tracking number the caller stores.
#[async_trait]
pub trait CarrierClient: Send + Sync {
    /// Creates a shipping order.
    async fn create_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<CreatedShipment>>;

    /// Cancels a previously created shipping order by tracking number.
    async fn cancel_order(&self, tracking_number: &str) -> Result<CarrierResponse<()>>;

    /// Quotes a shipping order without creating it.
    async fn preview_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<ShipmentQuote>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_of_success() {
        let response = CarrierResponse::ok("created", 42u32);
        assert_eq!(response.payload().unwrap(), &42);
    }

    #[test]
    fn payload_of_failure_is_error() {
        let response: CarrierResponse<u32> = CarrierResponse::failure("out of service area");
        assert!(response.payload().is_err());
    }

    #[test]
    fn success_without_payload_is_protocol_violation() {
        let response = CarrierResponse::<u32> {
            success: true,
            message: "ok".to_string(),
            data: None,
        };
        assert!(matches!(
            response.payload(),
            Err(CarrierError::Protocol(_))
        ));
    }
}
