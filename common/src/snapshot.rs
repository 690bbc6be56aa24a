//! Persisted and replicated form of a ledger.
//!
//! A [`LedgerSnapshot`] carries the current [`LedgerState`], the event log,
//! and the journal of every command that succeeded. The journal is the
//! source of truth: state and events must equal what replaying it produces,
//! and peers exchange journal suffixes rather than trusting each other's state.

use serde::{Deserialize, Serialize};

use crate::command::{CommandOutcome, LedgerCommand};
use crate::error::{LedgerError, LedgerResult};
use crate::event::LedgerEvent;
use crate::identity::Identity;
use crate::ledger::{Ledger, LedgerState};

/// Parameters that make each ledger contract unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerParameters {
    pub administrator: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub state: LedgerState,
    pub events: Vec<LedgerEvent>,
    pub journal: Vec<LedgerCommand>,
}

/// How much of the journal a peer already holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub journal_len: usize,
}

/// Journal entries to append.
///
/// `base` is the journal position of `commands[0]`. `None` means "append at
/// the head", which is what a client submitting new commands sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerDelta {
    #[serde(default)]
    pub base: Option<usize>,
    pub commands: Vec<LedgerCommand>,
}

impl LedgerDelta {
    pub fn append(commands: Vec<LedgerCommand>) -> Self {
        Self {
            base: None,
            commands,
        }
    }
}

impl LedgerSnapshot {
    pub fn genesis(administrator: Identity) -> Self {
        Self {
            state: LedgerState::new(administrator),
            events: Vec::new(),
            journal: Vec::new(),
        }
    }

    pub fn administrator(&self) -> &Identity {
        self.state.administrator()
    }

    /// Execute one command. On failure nothing is recorded.
    pub fn apply(&mut self, command: LedgerCommand) -> LedgerResult<CommandOutcome> {
        let placeholder = LedgerState::new(self.state.administrator().clone());
        let state = std::mem::replace(&mut self.state, placeholder);
        let mut ledger = Ledger::from_parts(state, &mut self.events);
        let outcome = ledger.execute(&command);
        let (state, _) = ledger.into_parts();
        self.state = state;

        if outcome.is_ok() {
            self.journal.push(command);
        }
        outcome
    }

    /// Rebuild a snapshot by executing `journal` from genesis.
    pub fn replay(administrator: Identity, journal: &[LedgerCommand]) -> LedgerResult<Self> {
        let mut snapshot = Self::genesis(administrator);
        for (position, command) in journal.iter().enumerate() {
            snapshot.apply(command.clone()).map_err(|e| {
                LedgerError::InvalidState(format!("journal entry {position} rejected: {e}"))
            })?;
        }
        Ok(snapshot)
    }

    /// Check that state and events are exactly what the journal produces.
    pub fn verify(&self) -> LedgerResult<()> {
        let replayed = Self::replay(self.administrator().clone(), &self.journal)?;
        if replayed.state != self.state {
            return Err(LedgerError::InvalidState(
                "state does not match journal".into(),
            ));
        }
        if replayed.events != self.events {
            return Err(LedgerError::InvalidState(
                "event log does not match journal".into(),
            ));
        }
        Ok(())
    }

    /// Check that every journal entry carries its caller's signature.
    pub fn verify_signatures(&self) -> LedgerResult<()> {
        self.journal
            .iter()
            .try_for_each(|command| command.verify_signature())
    }

    pub fn summarize(&self) -> LedgerSummary {
        LedgerSummary {
            journal_len: self.journal.len(),
        }
    }

    /// Journal entries the summarizer does not have yet.
    pub fn delta(&self, summary: &LedgerSummary) -> LedgerDelta {
        let base = summary.journal_len.min(self.journal.len());
        LedgerDelta {
            base: Some(base),
            commands: self.journal[base..].to_vec(),
        }
    }

    /// Append a journal segment, all or nothing.
    ///
    /// Entries overlapping what we already hold must match exactly. The rest
    /// must each be signed by their caller and are executed in order.
    pub fn apply_delta(&mut self, delta: LedgerDelta) -> LedgerResult<Vec<CommandOutcome>> {
        let len = self.journal.len();
        let base = delta.base.unwrap_or(len);
        if base > len {
            return Err(LedgerError::InvalidState(format!(
                "delta starts at {base} but journal has {len} entries"
            )));
        }

        let overlap = (len - base).min(delta.commands.len());
        let (held, fresh) = delta.commands.split_at(overlap);
        if held != &self.journal[base..base + overlap] {
            return Err(LedgerError::InvalidState(format!(
                "delta diverges from journal after entry {base}"
            )));
        }
        if fresh.is_empty() {
            return Ok(Vec::new());
        }
        for command in fresh {
            command.verify_signature()?;
        }

        let mut next = self.clone();
        let outcomes = fresh
            .iter()
            .map(|command| next.apply(command.clone()))
            .collect::<LedgerResult<Vec<_>>>()?;
        *self = next;
        Ok(outcomes)
    }

    /// Adopt a peer's snapshot if its journal extends ours.
    ///
    /// The peer's state is never trusted; its extra commands are replayed here.
    pub fn fast_forward(&mut self, other: LedgerSnapshot) -> LedgerResult<()> {
        if other.administrator() != self.administrator() {
            return Err(LedgerError::InvalidState(
                "snapshot belongs to a different administrator".into(),
            ));
        }
        self.apply_delta(LedgerDelta {
            base: Some(0),
            commands: other.journal,
        })
        .map(|_| ())
    }
}
