//! Long-lived HTTP host for one provenance ledger.

pub mod api;
pub mod store;

pub use api::router;
pub use store::{LedgerStore, StoreError};
