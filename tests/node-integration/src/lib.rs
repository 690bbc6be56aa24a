use std::net::SocketAddr;
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use tokio::task::JoinHandle;

use provenance_common::Identity;
use provenance_node::{router, LedgerStore};


/// A node serving on an ephemeral local port.
pub struct RunningNode {
    pub addr: SocketAddr,
    pub store: Arc<LedgerStore>,
    task: JoinHandle<()>,
}

impl RunningNode {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop serving. The store's on-disk snapshot is left as is.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Serve `store` in-process on 127.0.0.1 with a random port.
pub async fn spawn_node(store: LedgerStore) -> RunningNode {
    init_tracing();
    let store = Arc::new(store);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    let app = router(store.clone());
    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("test node stopped: {e}");
        }
    });
    RunningNode { addr, store, task }
}

/// Deterministic signing key derived from a participant name.
pub fn make_signing_key(name: &str) -> SigningKey {
    let mut seed = [0u8; 32];
    for (slot, byte) in seed.iter_mut().zip(name.to_lowercase().bytes().cycle()) {
        *slot = byte;
    }
    SigningKey::from_bytes(&seed)
}

pub fn make_identity(name: &str) -> Identity {
    Identity(make_signing_key(name).verifying_key())
}

/// A fresh identity nobody has heard of.
pub fn random_identity() -> Identity {
    Identity(SigningKey::generate(&mut rand::rngs::OsRng).verifying_key())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
