//! Default shipment parameters injected into the fulfillment trigger.

use chrono::Duration;
use common::Money;

/// Fallback package metrics and carrier request defaults.
///
/// Products without measured weight or dimensions fall back to these values,
/// and the parcel-level metrics, insurance cap, pickup lead time and
/// handling note all come from here rather than inline literals, so tests
/// can substitute profiles deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentProfile {
    /// Per-item fallback weight in grams.
    pub default_weight_grams: u32,
    /// Parcel fallback dimensions in centimeters.
    pub default_length_cm: u32,
    pub default_width_cm: u32,
    pub default_height_cm: u32,
    /// Insured value is the order's product subtotal, capped here.
    pub insurance_cap: Money,
    /// Carrier handling note, e.g. GHN's "KHONGCHOXEMHANG".
    pub required_note: String,
    /// How far in the future the requested pickup time lies.
    pub pickup_lead: Duration,
}

impl ShipmentProfile {
    /// Loads a profile from environment variables, falling back to defaults:
    /// - `SHIPMENT_DEFAULT_WEIGHT_GRAMS` (default: `500`)
    /// - `SHIPMENT_DEFAULT_LENGTH_CM` / `_WIDTH_CM` / `_HEIGHT_CM`
    ///   (defaults: `20` / `15` / `10`)
    /// - `SHIPMENT_INSURANCE_CAP` (default: `5000000` minor units)
    /// - `SHIPMENT_REQUIRED_NOTE` (default: `"KHONGCHOXEMHANG"`)
    /// - `SHIPMENT_PICKUP_LEAD_HOURS` (default: `2`)
    pub fn from_env() -> Self {
        fn var<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Self {
            default_weight_grams: var("SHIPMENT_DEFAULT_WEIGHT_GRAMS", 500),
            default_length_cm: var("SHIPMENT_DEFAULT_LENGTH_CM", 20),
            default_width_cm: var("SHIPMENT_DEFAULT_WIDTH_CM", 15),
            default_height_cm: var("SHIPMENT_DEFAULT_HEIGHT_CM", 10),
            insurance_cap: Money::from_minor(var("SHIPMENT_INSURANCE_CAP", 5_000_000)),
            required_note: std::env::var("SHIPMENT_REQUIRED_NOTE")
                .unwrap_or_else(|_| "KHONGCHOXEMHANG".to_string()),
            pickup_lead: Duration::hours(var("SHIPMENT_PICKUP_LEAD_HOURS", 2)),
        }
    }

    /// Returns the insured value for an order subtotal.
    pub fn insurance_value(&self, product_subtotal: Money) -> Money {
        product_subtotal.min(self.insurance_cap)
    }
}

impl Default for ShipmentProfile {
    fn default() -> Self {
        Self {
            default_weight_grams: 500,
            default_length_cm: 20,
            default_width_cm: 15,
            default_height_cm: 10,
            insurance_cap: Money::from_minor(5_000_000),
            required_note: "KHONGCHOXEMHANG".to_string(),
            pickup_lead: Duration::hours(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profile_values() {
        let profile = ShipmentProfile::default();
        assert_eq!(profile.default_weight_grams, 500);
        assert_eq!(profile.required_note, "KHONGCHOXEMHANG");
        assert_eq!(profile.pickup_lead, Duration::hours(2));
    }

    #[test]
    fn insurance_value_is_capped() {
        let profile = ShipmentProfile::default();
        assert_eq!(
            profile.insurance_value(Money::from_minor(100_000)),
            Money::from_minor(100_000)
        );
        assert_eq!(
            profile.insurance_value(Money::from_minor(9_000_000)),
            profile.insurance_cap
        );
    }
}
