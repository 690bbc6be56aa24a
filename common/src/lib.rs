//! Shared model for the provenance ledger: identities, products, the
//! access-controlled [`ledger::Ledger`], and the journal/snapshot form that
//! hosts persist and replicate.

pub mod command;
pub mod error;
pub mod event;
pub mod identity;
pub mod ledger;
pub mod product;
pub mod snapshot;

pub use command::{CommandOutcome, LedgerCommand, LedgerOp};
pub use error::{LedgerError, LedgerResult};
pub use event::{LedgerEvent, LedgerObserver, NullObserver};
pub use identity::Identity;
pub use ledger::{Ledger, LedgerState};
pub use product::{Product, ProductId, ProductStatus, ProductSummary, Waypoint};
pub use snapshot::{LedgerDelta, LedgerParameters, LedgerSnapshot, LedgerSummary};
