//! Giao Hang Nhanh (GHN) carrier client.
//!
//! Speaks the GHN public gateway: JSON bodies, `Token` / `ShopId` headers,
//! and a `{ code, message, data }` envelope where `code == 200` means the
//! provider accepted the request.

use chrono::{DateTime, Utc};
use common::Money;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{
    CarrierClient, CarrierResponse, CreateShipmentRequest, CreatedShipment, ShipmentQuote,
};
use crate::error::Result;

/// GHN gateway configuration.
#[derive(Clone)]
pub struct GhnConfig {
    pub base_url: String,
    pub token: String,
    pub shop_id: String,
    /// GHN service type, e.g. 2 for standard.
    pub service_type_id: u32,
}

impl GhnConfig {
    /// Loads configuration from environment variables, falling back to the
    /// public gateway defaults:
    /// - `GHN_BASE_URL` (default: production gateway)
    /// - `GHN_TOKEN`
    /// - `GHN_SHOP_ID`
    /// - `GHN_SERVICE_TYPE_ID` (default: `2`)
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("GHN_BASE_URL").unwrap_or_else(|_| {
                "https://online-gateway.ghn.vn/shiip/public-api".to_string()
            }),
            token: std::env::var("GHN_TOKEN").unwrap_or_default(),
            shop_id: std::env::var("GHN_SHOP_ID").unwrap_or_default(),
            service_type_id: std::env::var("GHN_SERVICE_TYPE_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2),
        }
    }
}

impl std::fmt::Debug for GhnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhnConfig")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .field("shop_id", &self.shop_id)
            .field("service_type_id", &self.service_type_id)
            .finish()
    }
}

/// GHN response envelope.
#[derive(Debug, Deserialize)]
struct GhnEnvelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Serialize)]
struct GhnItem<'a> {
    name: &'a str,
    quantity: u32,
    price: i64,
    weight: u32,
    length: u32,
    width: u32,
    height: u32,
}

#[derive(Debug, Serialize)]
struct GhnCreateOrderBody<'a> {
    client_order_code: &'a str,
    to_name: &'a str,
    to_phone: &'a str,
    to_address: &'a str,
    to_ward_name: &'a str,
    to_district_name: &'a str,
    to_province_name: &'a str,
    cod_amount: i64,
    insurance_value: i64,
    weight: u32,
    length: u32,
    width: u32,
    height: u32,
    service_type_id: u32,
    /// 1 = shop pays the fee, 2 = receiver pays.
    payment_type_id: u32,
    required_note: &'a str,
    pickup_time: i64,
    items: Vec<GhnItem<'a>>,
}

#[derive(Debug, Deserialize)]
struct GhnCreateOrderData {
    order_code: String,
    #[serde(default)]
    total_fee: i64,
    #[serde(default)]
    expected_delivery_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GhnPreviewData {
    #[serde(default)]
    total_fee: i64,
    #[serde(default)]
    expected_delivery_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct GhnCancelBody<'a> {
    order_codes: Vec<&'a str>,
}

/// GHN HTTP client.
#[derive(Debug, Clone)]
pub struct GhnClient {
    http: reqwest::Client,
    config: GhnConfig,
}

impl GhnClient {
    /// Creates a client over a default `reqwest` client.
    pub fn new(config: GhnConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Creates a client over a caller-provided `reqwest` client.
    pub fn with_http(http: reqwest::Client, config: GhnConfig) -> Self {
        Self { http, config }
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<GhnEnvelope<T>> {
        let url = format!("{}{}", self.config.base_url, path);
        debug!(%url, "GHN request");

        let response = self
            .http
            .post(&url)
            .header("Token", &self.config.token)
            .header("ShopId", &self.config.shop_id)
            .json(body)
            .send()
            .await?;

        let envelope = response.json::<GhnEnvelope<T>>().await?;
        Ok(envelope)
    }

    fn build_create_body<'a>(&self, request: &'a CreateShipmentRequest) -> GhnCreateOrderBody<'a> {
        GhnCreateOrderBody {
            client_order_code: &request.client_order_code,
            to_name: &request.destination.recipient_name,
            to_phone: &request.destination.phone,
            to_address: &request.destination.street,
            to_ward_name: &request.destination.ward_name,
            to_district_name: &request.destination.district_name,
            to_province_name: &request.destination.province_name,
            cod_amount: request.cod_amount.minor(),
            insurance_value: request.insurance_value.minor(),
            weight: request.weight_grams,
            length: request.length_cm,
            width: request.width_cm,
            height: request.height_cm,
            service_type_id: self.config.service_type_id,
            payment_type_id: 1,
            required_note: &request.required_note,
            pickup_time: request.pickup_time.timestamp(),
            items: request
                .items
                .iter()
                .map(|item| GhnItem {
                    name: &item.name,
                    quantity: item.quantity,
                    price: item.price.minor(),
                    weight: item.weight_grams,
                    length: item.length_cm,
                    width: item.width_cm,
                    height: item.height_cm,
                })
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl CarrierClient for GhnClient {
    async fn create_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<CreatedShipment>> {
        let body = self.build_create_body(request);
        let envelope: GhnEnvelope<GhnCreateOrderData> =
            self.post("/v2/shipping-order/create", &body).await?;

        if envelope.code != 200 {
            return Ok(CarrierResponse::failure(envelope.message));
        }
        Ok(match envelope.data {
            Some(data) => CarrierResponse::ok(
                envelope.message,
                CreatedShipment {
                    order_code: data.order_code,
                    fee: Money::from_minor(data.total_fee),
                    expected_delivery: data.expected_delivery_time,
                },
            ),
            // Success without a payload; surface it as a response the
            // caller's payload() check will reject.
            None => CarrierResponse {
                success: true,
                message: envelope.message,
                data: None,
            },
        })
    }

    async fn cancel_order(&self, tracking_number: &str) -> Result<CarrierResponse<()>> {
        let body = GhnCancelBody {
            order_codes: vec![tracking_number],
        };
        let envelope: GhnEnvelope<serde_json::Value> =
            self.post("/v2/switch-status/cancel", &body).await?;

        if envelope.code != 200 {
            return Ok(CarrierResponse::failure(envelope.message));
        }
        Ok(CarrierResponse::ack(envelope.message))
    }

    async fn preview_order(
        &self,
        request: &CreateShipmentRequest,
    ) -> Result<CarrierResponse<ShipmentQuote>> {
        let body = self.build_create_body(request);
        let envelope: GhnEnvelope<GhnPreviewData> =
            self.post("/v2/shipping-order/preview", &body).await?;

        if envelope.code != 200 {
            return Ok(CarrierResponse::failure(envelope.message));
        }
        Ok(match envelope.data {
            Some(data) => CarrierResponse::ok(
                envelope.message,
                ShipmentQuote {
                    fee: Money::from_minor(data.total_fee),
                    expected_delivery: data.expected_delivery_time,
                },
            ),
            None => CarrierResponse {
                success: true,
                message: envelope.message,
                data: None,
            },
        })
    }
}
