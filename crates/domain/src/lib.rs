//! Domain entities for the order-fulfillment saga.
//!
//! Orders, their items, the catalog counters (stock, coupon usage), payment
//! records and the shipping leg. The saga mutates these in memory and stages
//! the changes into a ledger write batch; nothing here performs I/O.

pub mod catalog;
pub mod error;
pub mod order;
pub mod payment;
pub mod shipping;

pub use catalog::{Coupon, Product, UserCoupon};
pub use error::DomainError;
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
pub use payment::Payment;
pub use shipping::{
    Address, CarrierProvider, OrderShippingMethod, ShipmentCreatedData, ShipmentState,
    ShippingHistory,
};
