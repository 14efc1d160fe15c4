//! The post-payment fulfillment saga.
//!
//! One payment-gateway callback drives the whole flow: on success the
//! [`FulfillmentTrigger`] confirms the order and creates the carrier
//! shipping order; on failure the [`CompensationEngine`] reverses the
//! order's side effects (stock, coupons, any existing shipment). The
//! [`SagaDriver`] wires both over a shared ledger and commits all staged
//! writes for a callback in a single unit of work.

pub mod compensation;
pub mod driver;
pub mod error;
pub mod fulfillment;
pub mod profile;

pub use compensation::CompensationEngine;
pub use driver::{CallbackOutcome, PaymentCallbackResult, SagaDriver};
pub use error::{Result, SagaError};
pub use fulfillment::{FulfillmentOutcome, FulfillmentTrigger};
pub use profile::ShipmentProfile;
