//! Shipping-carrier integration: the client trait, provider registry,
//! the GHN HTTP client and an in-memory double for tests.
//!
//! Carriers are remote, independently-failing services. Every operation
//! returns a [`CarrierResponse`] carrying the provider's success flag and
//! message; a transport-level failure surfaces as [`CarrierError`] instead.

pub mod client;
pub mod error;
pub mod ghn;
pub mod mock;
pub mod registry;

pub use client::{
    CarrierClient, CarrierResponse, CreateShipmentRequest, CreatedShipment, ShipmentItem,
    ShipmentQuote,
};
pub use error::CarrierError;
pub use ghn::{GhnClient, GhnConfig};
pub use mock::InMemoryCarrier;
pub use registry::CarrierRegistry;
