use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::info;

use crate::clients::BulkLister;
use crate::event::{Entity, EventBus, EventKind, EventListener};
use crate::queue::WorkQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Bucket,
    Object,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Bucket => f.write_str("bucket"),
            EntityKind::Object => f.write_str("object"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventAction {
    Add,
    Delete,
}

/// One pending reconciliation unit. Identity (and thus queue dedup) is
/// the referenced entity, not the action: a delete racing behind an add
/// collapses to one item, and the worker resolves current truth from the
/// cache. The action survives for logging only.
#[derive(Clone, Debug)]
pub struct WorkItem {
    pub action: EventAction,
    pub kind: EntityKind,
    pub namespace: String,
    pub name: String,
}

impl WorkItem {
    pub fn new(action: EventAction, entity: &Entity) -> Self {
        let kind = match entity {
            Entity::Bucket(_) => EntityKind::Bucket,
            Entity::Object(_) => EntityKind::Object,
        };
        Self {
            action,
            kind,
            namespace: entity.namespace().to_string(),
            name: entity.name().to_string(),
        }
    }
}

impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.namespace == other.namespace && self.name == other.name
    }
}

impl Eq for WorkItem {}

impl Hash for WorkItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.namespace.hash(state);
        self.name.hash(state);
    }
}

/// Last-known entity set, indexed namespace -> name -> entity. Only the
/// informer writes; everyone else gets the read-only lister surface.
#[derive(Clone, Default)]
pub struct EntityCache {
    inner: Arc<RwLock<HashMap<String, HashMap<String, Entity>>>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, entity: Entity) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner
            .entry(entity.namespace().to_string())
            .or_default()
            .insert(entity.name().to_string(), entity);
    }

    pub(crate) fn remove(&self, namespace: &str, name: &str) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(ns) = inner.get_mut(namespace) {
            ns.remove(name);
            if ns.is_empty() {
                inner.remove(namespace);
            }
        }
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Entity> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.get(namespace).and_then(|ns| ns.get(name)).cloned()
    }

    pub fn list(&self, namespace: &str) -> Vec<Entity> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let Some(ns) = inner.get(namespace) else {
            return Vec::new();
        };
        let mut entities = ns.values().cloned().collect::<Vec<_>>();
        entities.sort_by(|a, b| a.name().cmp(b.name()));
        entities
    }

    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.values().map(|ns| ns.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct AddListener {
    name: String,
    cache: EntityCache,
    queue: WorkQueue<WorkItem>,
    debounce: Duration,
}

impl EventListener for AddListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, entity: &Entity) -> anyhow::Result<()> {
        self.cache.insert(entity.clone());
        // debounce bursts of creation events before workers see them
        self.queue
            .add_after(WorkItem::new(EventAction::Add, entity), self.debounce);
        Ok(())
    }
}

struct DeleteListener {
    name: String,
    cache: EntityCache,
    queue: WorkQueue<WorkItem>,
}

impl EventListener for DeleteListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, entity: &Entity) -> anyhow::Result<()> {
        self.cache.remove(entity.namespace(), entity.name());
        self.queue.add(WorkItem::new(EventAction::Delete, entity));
        Ok(())
    }
}

/// Bridges the event bus and the initial bulk listing into work-queue
/// enqueues, maintaining the local cache of the last-known entity set.
pub struct Informer {
    kind: EntityKind,
    bus: Arc<EventBus>,
    cache: EntityCache,
    queue: WorkQueue<WorkItem>,
    lister: Arc<dyn BulkLister>,
    debounce: Duration,
}

impl Informer {
    pub fn new(
        kind: EntityKind,
        bus: Arc<EventBus>,
        queue: WorkQueue<WorkItem>,
        lister: Arc<dyn BulkLister>,
        debounce: Duration,
    ) -> Self {
        Self {
            kind,
            bus,
            cache: EntityCache::new(),
            queue,
            lister,
            debounce,
        }
    }

    /// Read-only view over the informer's cache.
    pub fn cache(&self) -> EntityCache {
        self.cache.clone()
    }

    fn event_kinds(&self) -> (EventKind, EventKind) {
        match self.kind {
            EntityKind::Bucket => (EventKind::BucketCreated, EventKind::BucketDeleted),
            EntityKind::Object => (EventKind::ObjectCreated, EventKind::ObjectDeleted),
        }
    }

    fn listener_name(&self, action: EventAction) -> String {
        match action {
            EventAction::Add => format!("informer-{}-add", self.kind),
            EventAction::Delete => format!("informer-{}-delete", self.kind),
        }
    }

    /// Seed the cache and the queue from one bulk list, then hook the
    /// bus: every later event keeps both in step. Every seeded entity is
    /// enqueued as an add.
    pub async fn start(&self) -> anyhow::Result<()> {
        let entities: Vec<Entity> = match self.kind {
            EntityKind::Bucket => self
                .lister
                .list_buckets()
                .await?
                .into_iter()
                .map(Entity::Bucket)
                .collect(),
            EntityKind::Object => self
                .lister
                .list_objects()
                .await?
                .into_iter()
                .map(Entity::Object)
                .collect(),
        };

        for entity in entities {
            self.cache.insert(entity.clone());
            self.queue.add(WorkItem::new(EventAction::Add, &entity));
        }

        info!(kind = %self.kind, seeded = self.cache.len(), "informer synced");

        let (add_kind, delete_kind) = self.event_kinds();
        self.bus.register(
            add_kind,
            Arc::new(AddListener {
                name: self.listener_name(EventAction::Add),
                cache: self.cache.clone(),
                queue: self.queue.clone(),
                debounce: self.debounce,
            }),
        );
        self.bus.register(
            delete_kind,
            Arc::new(DeleteListener {
                name: self.listener_name(EventAction::Delete),
                cache: self.cache.clone(),
                queue: self.queue.clone(),
            }),
        );

        Ok(())
    }

    pub fn stop(&self) {
        let (add_kind, delete_kind) = self.event_kinds();
        self.bus
            .unregister(add_kind, &self.listener_name(EventAction::Add));
        self.bus
            .unregister(delete_kind, &self.listener_name(EventAction::Delete));
    }
}
