use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::event::LedgerObserver;
use crate::identity::Identity;
use crate::ledger::Ledger;
use crate::product::{ProductId, ProductStatus};

/// A mutating ledger call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOp {
    Register {
        name: String,
        description: String,
        initial_location: String,
    },
    AppendJourney {
        id: ProductId,
        location: String,
        status: ProductStatus,
    },
    AuthorizeUser {
        identity: Identity,
    },
    GrantAccess {
        id: ProductId,
        identity: Identity,
    },
}

/// A mutating call as delivered by the host: who, when, what.
///
/// Commands replicated between peers must carry `signature`, made by the
/// caller's key over [`LedgerCommand::signable_bytes`]. A host that
/// authenticates callers itself may journal unsigned commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerCommand {
    pub caller: Identity,
    pub issued_at: DateTime<Utc>,
    pub op: LedgerOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct SignableCommand<'a> {
    caller: &'a Identity,
    issued_at: &'a DateTime<Utc>,
    op: &'a LedgerOp,
}

impl LedgerCommand {
    pub fn new(caller: Identity, issued_at: DateTime<Utc>, op: LedgerOp) -> Self {
        Self {
            caller,
            issued_at,
            op,
            signature: None,
        }
    }

    /// A command whose caller is the owner of `key`, signed by it.
    pub fn signed(key: &SigningKey, issued_at: DateTime<Utc>, op: LedgerOp) -> LedgerResult<Self> {
        let mut command = Self::new(Identity(key.verifying_key()), issued_at, op);
        command.signature = Some(key.sign(&command.signable_bytes()?));
        Ok(command)
    }

    /// Every field except the signature.
    pub fn signable_bytes(&self) -> LedgerResult<Vec<u8>> {
        let signable = SignableCommand {
            caller: &self.caller,
            issued_at: &self.issued_at,
            op: &self.op,
        };
        serde_json::to_vec(&signable)
            .map_err(|e| LedgerError::InvalidState(format!("cannot encode command: {e}")))
    }

    /// Check that the caller really issued this command.
    pub fn verify_signature(&self) -> LedgerResult<()> {
        let signature = self.signature.as_ref().ok_or_else(|| {
            LedgerError::Unauthorized(format!("command from {} is unsigned", self.caller))
        })?;
        self.caller
            .0
            .verify(&self.signable_bytes()?, signature)
            .map_err(|_| {
                LedgerError::Unauthorized(format!("bad signature on command from {}", self.caller))
            })
    }

    /// Stamp a command with the current wall clock.
    #[cfg(feature = "std")]
    pub fn now(caller: Identity, op: LedgerOp) -> Self {
        Self::new(caller, chrono::Utc::now(), op)
    }
}

/// What a successful command produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandOutcome {
    Registered(ProductId),
    Done,
}

impl<O: LedgerObserver> Ledger<O> {
    /// Dispatch a command to the matching operation.
    pub fn execute(&mut self, command: &LedgerCommand) -> LedgerResult<CommandOutcome> {
        let caller = &command.caller;
        let now = command.issued_at;
        match &command.op {
            LedgerOp::Register {
                name,
                description,
                initial_location,
            } => self
                .register(caller, name, description, initial_location, now)
                .map(CommandOutcome::Registered),
            LedgerOp::AppendJourney {
                id,
                location,
                status,
            } => self
                .append_journey(caller, *id, location, *status, now)
                .map(|()| CommandOutcome::Done),
            LedgerOp::AuthorizeUser { identity } => self
                .authorize_user(caller, identity)
                .map(|()| CommandOutcome::Done),
            LedgerOp::GrantAccess { id, identity } => self
                .grant_access(caller, *id, identity)
                .map(|()| CommandOutcome::Done),
        }
    }
}
