//! The ledger store: per-entity loads plus a staged-write unit of work.
//!
//! Saga components load entities, mutate them in memory and stage the
//! results into a [`WriteBatch`]; the saga driver issues exactly one
//! [`Ledger::commit`] per callback, applying every staged write atomically.
//!
//! Shared counters (product stock, coupon usage) are staged as *relative*
//! adjustments so concurrent sagas compose under the store's transaction
//! guarantees; a commit that would drive a counter negative fails whole.

pub mod batch;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use batch::{StagedWrite, WriteBatch};
pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::Ledger;
