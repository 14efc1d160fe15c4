//! The shipping leg of an order: carrier selection, shipment state,
//! destination address and the append-only shipment history.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ShippingMethodId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported third-party shipping providers.
///
/// A shipping method stores the provider name as configured text; resolution
/// to a registered carrier is an exact, case-sensitive match on these names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CarrierProvider {
    /// Giao Hang Nhanh.
    Ghn,
    /// Giao Hang Tiet Kiem.
    Ghtk,
}

impl CarrierProvider {
    /// Resolves a configured provider name. Exact match only.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GHN" => Some(CarrierProvider::Ghn),
            "GHTK" => Some(CarrierProvider::Ghtk),
            _ => None,
        }
    }

    /// Returns the configured provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            CarrierProvider::Ghn => "GHN",
            CarrierProvider::Ghtk => "GHTK",
        }
    }
}

impl std::fmt::Display for CarrierProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of the carrier-side shipping order for a shipping-method row.
///
/// State transitions:
/// ```text
/// NotCreated ──► Created ──► Cancelled
///                               │
///                               ▼
///                           (eligible for NotCreated retry semantics)
/// ```
///
/// This makes the idempotency state machine explicit instead of inferring it
/// from an empty tracking-number string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShipmentState {
    /// No shipping order exists at the carrier yet.
    #[default]
    NotCreated,

    /// A shipping order was created; the row carries its tracking number.
    Created,

    /// A previously created shipping order was cancelled at the carrier.
    Cancelled,
}

impl ShipmentState {
    /// Returns true if a create call to the carrier is still allowed.
    pub fn can_create(&self) -> bool {
        matches!(self, ShipmentState::NotCreated | ShipmentState::Cancelled)
    }

    /// Returns true if there is a live shipping order to cancel.
    pub fn can_cancel(&self) -> bool {
        matches!(self, ShipmentState::Created)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentState::NotCreated => "NotCreated",
            ShipmentState::Created => "Created",
            ShipmentState::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Links an order to its chosen shipping method and carries the carrier-side
/// shipment state.
///
/// Invariant: `tracking_number.is_some()` exactly when `state == Created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderShippingMethod {
    pub id: ShippingMethodId,
    pub order_id: OrderId,
    /// Configured provider name, e.g. "GHN". Resolved against the registry.
    pub provider_name: String,
    /// Human-readable service name, e.g. "GHN Standard".
    pub method_name: String,
    pub state: ShipmentState,
    /// Carrier-assigned tracking number; the idempotency marker.
    pub tracking_number: Option<String>,
    pub expected_delivery: Option<DateTime<Utc>>,
    pub shipping_fee: Money,
    pub updated_at: DateTime<Utc>,
}

impl OrderShippingMethod {
    /// Creates a row with no carrier-side shipment yet.
    pub fn new(
        id: ShippingMethodId,
        order_id: OrderId,
        provider_name: impl Into<String>,
        method_name: impl Into<String>,
        shipping_fee: Money,
    ) -> Self {
        Self {
            id,
            order_id,
            provider_name: provider_name.into(),
            method_name: method_name.into(),
            state: ShipmentState::NotCreated,
            tracking_number: None,
            expected_delivery: None,
            shipping_fee,
            updated_at: Utc::now(),
        }
    }

    /// Resolves the configured provider name, if it names a known carrier.
    pub fn provider(&self) -> Option<CarrierProvider> {
        CarrierProvider::from_name(&self.provider_name)
    }

    /// Returns true if a shipping order already exists at the carrier.
    pub fn has_shipment(&self) -> bool {
        self.state.can_cancel()
    }

    /// Records a carrier-created shipping order.
    pub fn record_created(
        &mut self,
        tracking_number: impl Into<String>,
        expected_delivery: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) {
        self.state = ShipmentState::Created;
        self.tracking_number = Some(tracking_number.into());
        self.expected_delivery = expected_delivery;
        self.updated_at = now;
    }

    /// Records a carrier-confirmed cancellation, freeing the row for retry.
    pub fn record_cancelled(&mut self, now: DateTime<Utc>) {
        self.state = ShipmentState::Cancelled;
        self.tracking_number = None;
        self.expected_delivery = None;
        self.updated_at = now;
    }
}

/// One append-only shipment lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingHistory {
    pub id: Uuid,
    pub shipping_method_id: ShippingMethodId,
    pub order_id: OrderId,
    /// Carrier status code, e.g. "ready_to_pick".
    pub status_code: String,
    /// Human-readable status description.
    pub status_name: String,
    /// Event discriminator, e.g. "order_created".
    pub event_type: String,
    pub event_time: DateTime<Utc>,
    /// Serialized event payload (carrier order code, fee, ETA, ...).
    pub extra_data: Option<serde_json::Value>,
}

impl ShippingHistory {
    /// Builds the initial "order created" event for a new carrier shipment.
    pub fn order_created(
        shipping_method_id: ShippingMethodId,
        order_id: OrderId,
        data: &ShipmentCreatedData,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            shipping_method_id,
            order_id,
            status_code: "ready_to_pick".to_string(),
            status_name: "Shipping order created, waiting for pickup".to_string(),
            event_type: "order_created".to_string(),
            event_time: now,
            extra_data: serde_json::to_value(data).ok(),
        }
    }
}

/// Extra data recorded alongside the "order created" shipment event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentCreatedData {
    pub carrier_order_code: String,
    pub fee: Money,
    pub expected_delivery: Option<DateTime<Utc>>,
}

/// A delivery destination as the carrier needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Address {
    pub user_id: Option<UserId>,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub ward_name: String,
    pub district_name: String,
    pub province_name: String,
}

impl Address {
    /// Returns the name of the first carrier-required field that is missing,
    /// or `None` when the address is complete.
    pub fn missing_carrier_field(&self) -> Option<&'static str> {
        let fields = [
            ("recipient_name", &self.recipient_name),
            ("phone", &self.phone),
            ("street", &self.street),
            ("ward_name", &self.ward_name),
            ("district_name", &self.district_name),
            ("province_name", &self.province_name),
        ];
        fields
            .into_iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method() -> OrderShippingMethod {
        OrderShippingMethod::new(
            ShippingMethodId::new(),
            OrderId::new(),
            "GHN",
            "GHN Standard",
            Money::from_minor(30_000),
        )
    }

    #[test]
    fn provider_name_resolution_is_case_sensitive() {
        assert_eq!(CarrierProvider::from_name("GHN"), Some(CarrierProvider::Ghn));
        assert_eq!(CarrierProvider::from_name("ghn"), None);
        assert_eq!(CarrierProvider::from_name("DHL"), None);
    }

    #[test]
    fn shipment_state_machine() {
        assert!(ShipmentState::NotCreated.can_create());
        assert!(ShipmentState::Cancelled.can_create());
        assert!(!ShipmentState::Created.can_create());

        assert!(ShipmentState::Created.can_cancel());
        assert!(!ShipmentState::NotCreated.can_cancel());
        assert!(!ShipmentState::Cancelled.can_cancel());
    }

    #[test]
    fn record_created_sets_tracking_number() {
        let mut m = method();
        assert!(!m.has_shipment());

        m.record_created("GHN123", None, Utc::now());
        assert_eq!(m.state, ShipmentState::Created);
        assert_eq!(m.tracking_number.as_deref(), Some("GHN123"));
        assert!(m.has_shipment());
    }

    #[test]
    fn record_cancelled_clears_tracking_number() {
        let mut m = method();
        m.record_created("GHN123", None, Utc::now());
        m.record_cancelled(Utc::now());

        assert_eq!(m.state, ShipmentState::Cancelled);
        assert!(m.tracking_number.is_none());
        assert!(m.state.can_create());
    }

    #[test]
    fn missing_carrier_field_reports_first_gap() {
        let mut address = Address {
            user_id: None,
            recipient_name: "Nguyen Van A".to_string(),
            phone: "0900000000".to_string(),
            street: "1 Le Loi".to_string(),
            ward_name: "Ben Nghe".to_string(),
            district_name: "District 1".to_string(),
            province_name: "Ho Chi Minh".to_string(),
        };
        assert_eq!(address.missing_carrier_field(), None);

        address.ward_name = "  ".to_string();
        assert_eq!(address.missing_carrier_field(), Some("ward_name"));
    }

    #[test]
    fn order_created_history_serializes_extra_data() {
        let m = method();
        let data = ShipmentCreatedData {
            carrier_order_code: "GHN123".to_string(),
            fee: Money::from_minor(30_000),
            expected_delivery: None,
        };
        let event = ShippingHistory::order_created(m.id, m.order_id, &data, Utc::now());

        assert_eq!(event.event_type, "order_created");
        let extra = event.extra_data.unwrap();
        assert_eq!(extra["carrier_order_code"], "GHN123");
        assert_eq!(extra["fee"], 30_000);
    }
}
