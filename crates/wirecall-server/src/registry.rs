//! Live connection registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

use wirecall_transport::Connection;

use crate::handler::ConnectionInfo;

/// Per-connection state held by the registry.
///
/// The anti-replay watermark is touched only by the connection's own read
/// loop; it is atomic so the entry can be shared with the keep-alive
/// forwarder and unicast sends without locking.
pub(crate) struct ConnectionEntry {
    pub(crate) id: Uuid,
    pub(crate) user_data: Option<Value>,
    pub(crate) last_seen_correlation: AtomicU64,
    pub(crate) conn: Arc<dyn Connection>,
    pub(crate) keepalive: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionEntry {
    pub(crate) fn new(id: Uuid, user_data: Option<Value>, conn: Arc<dyn Connection>) -> Self {
        Self {
            id,
            user_data,
            last_seen_correlation: AtomicU64::new(0),
            conn,
            keepalive: std::sync::Mutex::new(None),
        }
    }

    pub(crate) fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_data: self.user_data.clone(),
        }
    }
}

impl Drop for ConnectionEntry {
    fn drop(&mut self) {
        if let Some(task) = self.keepalive.lock().expect("keepalive slot lock").take() {
            task.abort();
        }
    }
}

/// Connections keyed by id; shared across all lifecycle events.
#[derive(Default)]
pub(crate) struct ConnectionRegistry {
    entries: RwLock<HashMap<Uuid, Arc<ConnectionEntry>>>,
}

impl ConnectionRegistry {
    pub(crate) async fn insert(&self, entry: Arc<ConnectionEntry>) {
        self.entries.write().await.insert(entry.id, entry);
    }

    pub(crate) async fn remove(&self, id: &Uuid) -> Option<Arc<ConnectionEntry>> {
        self.entries.write().await.remove(id)
    }

    pub(crate) async fn get(&self, id: &Uuid) -> Option<Arc<ConnectionEntry>> {
        self.entries.read().await.get(id).cloned()
    }

    pub(crate) async fn contains(&self, id: &Uuid) -> bool {
        self.entries.read().await.contains_key(id)
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
