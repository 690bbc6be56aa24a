//! The access-controlled, append-only product store.
//!
//! A [`Ledger`] owns every product record and both authorization tiers:
//! the global authorized-user set and the per-product access grants.
//! Every operation validates all of its preconditions before touching state,
//! so a rejected call leaves the ledger exactly as it was.
//!
//! The ledger does no locking and reads no clock. The host serializes calls
//! and passes `now` into each mutation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::event::{LedgerEvent, LedgerObserver, NullObserver};
use crate::identity::Identity;
use crate::product::{Product, ProductId, ProductStatus, ProductSummary, Waypoint};

/// Everything the ledger persists. Read-only queries live here so hosts can
/// serve them straight from a shared snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub(crate) administrator: Identity,
    pub(crate) authorized_users: BTreeSet<Identity>,
    /// `products[i]` has id `i + 1`.
    pub(crate) products: Vec<Product>,
    pub(crate) access_grants: BTreeSet<(ProductId, Identity)>,
}

impl LedgerState {
    /// Empty state with `administrator` as the only authorized user.
    pub fn new(administrator: Identity) -> Self {
        let mut authorized_users = BTreeSet::new();
        authorized_users.insert(administrator.clone());
        Self {
            administrator,
            authorized_users,
            products: Vec::new(),
            access_grants: BTreeSet::new(),
        }
    }

    pub fn administrator(&self) -> &Identity {
        &self.administrator
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn authorized_users(&self) -> &BTreeSet<Identity> {
        &self.authorized_users
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        let index = id.0.checked_sub(1)?;
        self.products.get(usize::try_from(index).ok()?)
    }

    fn product_mut(&mut self, id: ProductId) -> Option<&mut Product> {
        let index = id.0.checked_sub(1)?;
        self.products.get_mut(usize::try_from(index).ok()?)
    }

    fn existing(&self, id: ProductId) -> LedgerResult<&Product> {
        self.product(id).ok_or(LedgerError::NotFound(id))
    }

    pub fn total_count(&self) -> u64 {
        self.products.len() as u64
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        identity == &self.administrator || self.authorized_users.contains(identity)
    }

    /// Explicit grant, or manufacturer, or administrator.
    pub fn has_access(&self, product: &Product, identity: &Identity) -> bool {
        self.access_grants
            .contains(&(product.id, identity.clone()))
            || &product.manufacturer == identity
            || &self.administrator == identity
    }

    /// Whether `id` has ever been registered. Never fails.
    pub fn verify(&self, id: ProductId) -> bool {
        self.product(id).is_some()
    }

    /// Full record, history included. Requires access to the product.
    pub fn details(&self, caller: &Identity, id: ProductId) -> LedgerResult<&Product> {
        let product = self.existing(id)?;
        if !self.has_access(product, caller) {
            return Err(LedgerError::Unauthorized(format!(
                "{caller} has no access to product {id}"
            )));
        }
        Ok(product)
    }

    /// The audit trail alone, under the same access rule as [`LedgerState::details`].
    pub fn history(&self, caller: &Identity, id: ProductId) -> LedgerResult<&[Waypoint]> {
        self.details(caller, id).map(|p| p.history.as_slice())
    }

    /// Redacted view, available to anyone.
    pub fn summary(&self, id: ProductId) -> LedgerResult<ProductSummary> {
        self.existing(id).map(Product::summary)
    }
}

/// The product ledger with its injected notification sink.
#[derive(Debug, Clone)]
pub struct Ledger<O = NullObserver> {
    state: LedgerState,
    observer: O,
}

impl Ledger<NullObserver> {
    pub fn new(administrator: Identity) -> Self {
        Self::with_observer(administrator, NullObserver)
    }
}

impl<O: LedgerObserver> Ledger<O> {
    pub fn with_observer(administrator: Identity, observer: O) -> Self {
        Self::from_parts(LedgerState::new(administrator), observer)
    }

    pub fn from_parts(state: LedgerState, observer: O) -> Self {
        Self { state, observer }
    }

    pub fn into_parts(self) -> (LedgerState, O) {
        (self.state, self.observer)
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn administrator(&self) -> &Identity {
        self.state.administrator()
    }

    pub fn total_count(&self) -> u64 {
        self.state.total_count()
    }

    pub fn is_authorized(&self, identity: &Identity) -> bool {
        self.state.is_authorized(identity)
    }

    pub fn verify(&self, id: ProductId) -> bool {
        self.state.verify(id)
    }

    pub fn has_access(&self, id: ProductId, identity: &Identity) -> LedgerResult<bool> {
        let product = self.state.existing(id)?;
        Ok(self.state.has_access(product, identity))
    }

    pub fn details(&self, caller: &Identity, id: ProductId) -> LedgerResult<&Product> {
        self.state.details(caller, id)
    }

    pub fn history(&self, caller: &Identity, id: ProductId) -> LedgerResult<&[Waypoint]> {
        self.state.history(caller, id)
    }

    pub fn summary(&self, id: ProductId) -> LedgerResult<ProductSummary> {
        self.state.summary(id)
    }

    /// Register a new product and return its id.
    pub fn register(
        &mut self,
        caller: &Identity,
        name: &str,
        description: &str,
        initial_location: &str,
        now: DateTime<Utc>,
    ) -> LedgerResult<ProductId> {
        if !self.state.is_authorized(caller) {
            return Err(LedgerError::Unauthorized(format!(
                "{caller} may not register products"
            )));
        }
        if name.is_empty() {
            return Err(LedgerError::InvalidArgument("name must not be empty".into()));
        }
        if initial_location.is_empty() {
            return Err(LedgerError::InvalidArgument(
                "initial location must not be empty".into(),
            ));
        }

        let id = ProductId(self.total_count() + 1);
        self.state.products.push(Product {
            id,
            name: name.to_string(),
            description: description.to_string(),
            manufacturer: caller.clone(),
            created_at: now,
            current_location: initial_location.to_string(),
            status: ProductStatus::Created,
            history: vec![Waypoint {
                location: initial_location.to_string(),
                recorded_at: now,
            }],
            handlers: vec![caller.clone()],
        });
        self.state.access_grants.insert((id, caller.clone()));

        self.observer.notify(&LedgerEvent::Registered {
            id,
            name: name.to_string(),
            creator: caller.clone(),
        });
        Ok(id)
    }

    /// Record a move and status change. Identical repeated calls each append a waypoint.
    pub fn append_journey(
        &mut self,
        caller: &Identity,
        id: ProductId,
        location: &str,
        status: ProductStatus,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let product = self.state.existing(id)?;
        if !self.state.is_authorized(caller) {
            return Err(LedgerError::Unauthorized(format!("{caller} is not authorized")));
        }
        if !self.state.has_access(product, caller) {
            return Err(LedgerError::Unauthorized(format!(
                "{caller} has no access to product {id}"
            )));
        }
        if location.is_empty() {
            return Err(LedgerError::InvalidArgument("location must not be empty".into()));
        }

        let product = self
            .state
            .product_mut(id)
            .ok_or(LedgerError::NotFound(id))?;
        product.current_location = location.to_string();
        product.status = status;
        product.history.push(Waypoint {
            location: location.to_string(),
            recorded_at: now,
        });
        if !product.handlers.contains(caller) {
            product.handlers.push(caller.clone());
        }

        self.observer.notify(&LedgerEvent::Moved {
            id,
            location: location.to_string(),
            caller: caller.clone(),
        });
        self.observer
            .notify(&LedgerEvent::StatusChanged { id, status });
        Ok(())
    }

    /// Add `identity` to the global authorized set. Administrator only.
    pub fn authorize_user(&mut self, caller: &Identity, identity: &Identity) -> LedgerResult<()> {
        if caller != &self.state.administrator {
            return Err(LedgerError::Unauthorized(format!(
                "only the administrator may authorize users, not {caller}"
            )));
        }
        if identity.is_null() {
            return Err(LedgerError::InvalidArgument(
                "cannot authorize a null identity".into(),
            ));
        }
        if self.state.is_authorized(identity) {
            return Err(LedgerError::AlreadyAuthorized(identity.clone()));
        }

        self.state.authorized_users.insert(identity.clone());
        self.observer.notify(&LedgerEvent::UserAuthorized {
            identity: identity.clone(),
        });
        Ok(())
    }

    /// Let an authorized `identity` act on product `id`.
    pub fn grant_access(
        &mut self,
        caller: &Identity,
        id: ProductId,
        identity: &Identity,
    ) -> LedgerResult<()> {
        let product = self.state.existing(id)?;
        if &product.manufacturer != caller && caller != &self.state.administrator {
            return Err(LedgerError::Unauthorized(format!(
                "only the manufacturer or administrator may grant access to product {id}"
            )));
        }
        if !self.state.is_authorized(identity) {
            return Err(LedgerError::InvalidArgument(format!(
                "{identity} must be authorized before being granted access"
            )));
        }

        self.state.access_grants.insert((id, identity.clone()));
        Ok(())
    }
}
