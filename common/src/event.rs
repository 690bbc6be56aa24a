use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::product::{ProductId, ProductStatus};

/// Notification emitted after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Registered {
        id: ProductId,
        name: String,
        creator: Identity,
    },
    Moved {
        id: ProductId,
        location: String,
        caller: Identity,
    },
    StatusChanged {
        id: ProductId,
        status: ProductStatus,
    },
    UserAuthorized {
        identity: Identity,
    },
}

/// Receives ledger notifications synchronously, in emission order.
///
/// Observers are fire-and-forget: the ledger never reads anything back.
pub trait LedgerObserver {
    fn notify(&mut self, event: &LedgerEvent);
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl LedgerObserver for NullObserver {
    fn notify(&mut self, _event: &LedgerEvent) {}
}

/// Keeps an in-memory event log.
impl LedgerObserver for Vec<LedgerEvent> {
    fn notify(&mut self, event: &LedgerEvent) {
        self.push(event.clone());
    }
}

impl<O: LedgerObserver + ?Sized> LedgerObserver for &mut O {
    fn notify(&mut self, event: &LedgerEvent) {
        (**self).notify(event);
    }
}
