//! The node's single ledger instance and its on-disk snapshot.
//!
//! Writers are serialized by the `RwLock`; readers share it. A mutation is
//! applied to a copy, persisted, and only then swapped in, so the file and
//! memory never disagree about a command the client saw succeed.

use std::path::{Path, PathBuf};

use provenance_common::{
    CommandOutcome, Identity, LedgerCommand, LedgerError, LedgerEvent, LedgerObserver,
    LedgerSnapshot,
};
use thiserror::Error;
use tokio::sync::{RwLock, RwLockReadGuard};

const SNAPSHOT_FILE: &str = "ledger.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("snapshot {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("snapshot belongs to administrator {found}, not {expected}")]
    AdministratorMismatch { expected: Identity, found: Identity },

    #[error("no snapshot found; an administrator is required to create one")]
    MissingAdministrator,

    #[error("snapshot writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// Forwards ledger notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl LedgerObserver for TracingObserver {
    fn notify(&mut self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Registered { id, name, creator } => {
                tracing::info!(%id, %name, %creator, "product registered");
            }
            LedgerEvent::Moved {
                id,
                location,
                caller,
            } => {
                tracing::info!(%id, %location, %caller, "product moved");
            }
            LedgerEvent::StatusChanged { id, status } => {
                tracing::info!(%id, %status, "product status changed");
            }
            LedgerEvent::UserAuthorized { identity } => {
                tracing::info!(%identity, "user authorized");
            }
        }
    }
}

pub struct LedgerStore {
    snapshot: RwLock<LedgerSnapshot>,
    path: Option<PathBuf>,
}

impl LedgerStore {
    /// A store that never touches disk.
    pub fn in_memory(administrator: Identity) -> Self {
        Self {
            snapshot: RwLock::new(LedgerSnapshot::genesis(administrator)),
            path: None,
        }
    }

    /// Load the snapshot under `data_dir`, or create one for `administrator`.
    pub fn open(data_dir: &Path, administrator: Option<Identity>) -> Result<Self, StoreError> {
        let path = snapshot_path(data_dir);
        let snapshot = match load_snapshot(&path)? {
            Some(snapshot) => {
                snapshot.verify()?;
                if let Some(expected) = administrator {
                    if &expected != snapshot.administrator() {
                        return Err(StoreError::AdministratorMismatch {
                            expected,
                            found: snapshot.administrator().clone(),
                        });
                    }
                }
                tracing::info!(
                    path = %path.display(),
                    products = snapshot.state.total_count(),
                    journal = snapshot.journal.len(),
                    "loaded ledger snapshot"
                );
                snapshot
            }
            None => {
                let administrator = administrator.ok_or(StoreError::MissingAdministrator)?;
                let snapshot = LedgerSnapshot::genesis(administrator);
                save_snapshot(&path, &snapshot)?;
                tracing::info!(path = %path.display(), "created ledger snapshot");
                snapshot
            }
        };

        Ok(Self {
            snapshot: RwLock::new(snapshot),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LedgerSnapshot> {
        self.snapshot.read().await
    }

    /// Apply one command, persist, then log the events it emitted.
    pub async fn execute(&self, command: LedgerCommand) -> Result<CommandOutcome, StoreError> {
        let mut snapshot = self.snapshot.write().await;
        let seen = snapshot.events.len();

        let outcome = match &self.path {
            Some(path) => {
                let mut next = snapshot.clone();
                let outcome = next.apply(command)?;
                let path = path.clone();
                *snapshot = tokio::task::spawn_blocking(move || {
                    save_snapshot(&path, &next).map(|()| next)
                })
                .await??;
                outcome
            }
            None => snapshot.apply(command)?,
        };

        let mut observer = TracingObserver;
        for event in &snapshot.events[seen..] {
            observer.notify(event);
        }
        Ok(outcome)
    }
}

/// `$XDG_DATA_HOME/provenance-ledger` or the platform equivalent.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("provenance-ledger")
}

pub fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE)
}

fn load_snapshot(path: &Path) -> Result<Option<LedgerSnapshot>, StoreError> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

/// Write to a sibling temp file and rename over the old snapshot.
fn save_snapshot(path: &Path, snapshot: &LedgerSnapshot) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let data = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
