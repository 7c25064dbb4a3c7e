use anyhow::anyhow;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use common::schemas::{BucketRecord, ObjectRecord};

/// Change notification kinds emitted by the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    BucketCreated,
    BucketDeleted,
    ObjectCreated,
    ObjectDeleted,
}

impl FromStr for EventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket-created" => Ok(EventKind::BucketCreated),
            "bucket-deleted" => Ok(EventKind::BucketDeleted),
            "object-created" => Ok(EventKind::ObjectCreated),
            "object-deleted" => Ok(EventKind::ObjectDeleted),
            other => Err(anyhow!("unknown event kind: {}", other)),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::BucketCreated => "bucket-created",
            EventKind::BucketDeleted => "bucket-deleted",
            EventKind::ObjectCreated => "object-created",
            EventKind::ObjectDeleted => "object-deleted",
        };
        f.write_str(s)
    }
}

/// Payload decoded once at the bus boundary. Listeners never see raw
/// bytes and never re-cast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Entity {
    Bucket(BucketRecord),
    Object(ObjectRecord),
}

impl Entity {
    /// Buckets are cluster-scoped; objects are scoped to their bucket.
    pub fn namespace(&self) -> &str {
        match self {
            Entity::Bucket(_) => "",
            Entity::Object(o) => &o.bucket,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Entity::Bucket(b) => &b.name,
            Entity::Object(o) => &o.name,
        }
    }
}

pub trait EventListener: Send + Sync {
    /// Stable identity; registration under one kind is idempotent per name.
    fn name(&self) -> &str;

    fn handle(&self, entity: &Entity) -> anyhow::Result<()>;
}

/// Fan-out table from event kind to listeners, dependency-injected into
/// every component that needs it (no process-wide singleton, so tests can
/// run isolated buses side by side).
///
/// Dispatch holds the read lock for the whole iteration: a listener must
/// not call register/unregister from inside `handle` or it will deadlock
/// against its own dispatch.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<Arc<dyn EventListener>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, kind: EventKind, listener: Arc<dyn EventListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let slot = listeners.entry(kind).or_default();
        if slot.iter().any(|l| l.name() == listener.name()) {
            return;
        }
        slot.push(listener);
    }

    pub fn unregister(&self, kind: EventKind, name: &str) {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        if let Some(slot) = listeners.get_mut(&kind) {
            slot.retain(|l| l.name() != name);
        }
    }

    /// Decode `raw` according to `kind` and deliver to every listener in
    /// registration order. A listener failure is logged and skipped; this
    /// is a best-effort fan-out, not a transaction.
    pub fn publish(&self, kind: EventKind, raw: &[u8]) -> anyhow::Result<()> {
        let entity = match kind {
            EventKind::BucketCreated | EventKind::BucketDeleted => {
                Entity::Bucket(serde_json::from_slice::<BucketRecord>(raw)?)
            }
            EventKind::ObjectCreated | EventKind::ObjectDeleted => {
                Entity::Object(serde_json::from_slice::<ObjectRecord>(raw)?)
            }
        };

        self.dispatch(kind, &entity);
        Ok(())
    }

    pub fn dispatch(&self, kind: EventKind, entity: &Entity) {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        let Some(slot) = listeners.get(&kind) else {
            debug!(%kind, "no listeners registered");
            return;
        };

        for listener in slot {
            if let Err(e) = listener.handle(entity) {
                warn!(%kind, listener = listener.name(), "listener failed: {}", e);
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        let listeners = self.listeners.read().unwrap_or_else(|e| e.into_inner());
        listeners.get(&kind).map(|s| s.len()).unwrap_or(0)
    }
}
