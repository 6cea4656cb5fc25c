//! In-process document store with live queries.
//!
//! Implements the full [`BaseDocumentStore`] capability set: atomic merge-only
//! batches, equality queries and change-feed subscriptions driven by the
//! [`StreamHub`]. Documents are kept ordered by id, so result order is stable
//! (and creation order for v7 ids).

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast::error::RecvError, mpsc, RwLock};
use tracing::{debug, warn};

use super::store::{
    Collection, Document, FieldOp, Fields, Query, SnapshotEvent, Subscription, Write,
};
use super::stream_hub::{Change, StreamHub};
use super::traits::BaseDocumentStore;
use crate::common::{Clock, SystemClock};

type Tables = HashMap<Collection, BTreeMap<String, Fields>>;

#[derive(Clone)]
pub struct InMemoryDocumentStore {
    tables: Arc<RwLock<Tables>>,
    hub: StreamHub,
    version: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
    live: Arc<Mutex<Vec<mpsc::UnboundedSender<SnapshotEvent>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store whose server timestamps come from `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            hub: StreamHub::new(),
            version: Arc::new(AtomicU64::new(0)),
            clock,
            live: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Deliver a store-level error to every open live query.
    pub fn broadcast_error(&self, message: &str) {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.retain(|tx| tx.send(SnapshotEvent::Error(message.to_string())).is_ok());
    }

    /// Number of live queries that have not been torn down.
    pub fn open_subscriptions(&self) -> usize {
        let mut live = self.live.lock().unwrap_or_else(|e| e.into_inner());
        live.retain(|tx| !tx.is_closed());
        live.len()
    }

    async fn run_query(tables: &RwLock<Tables>, query: &Query) -> Vec<Document> {
        let tables = tables.read().await;
        tables
            .get(&query.collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document::new(id.clone(), fields.clone()))
                    .filter(|doc| query.matches(doc))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply one field op to a working copy of a document.
fn apply_op(fields: &mut Fields, field: &str, op: &FieldOp, now: &str) -> Result<()> {
    match op {
        FieldOp::Set(value) => {
            fields.insert(field.to_string(), value.clone());
        }
        FieldOp::ServerTimestamp => {
            fields.insert(field.to_string(), Value::String(now.to_string()));
        }
        FieldOp::Increment(by) => {
            let current = match fields.get(field) {
                None | Some(Value::Null) => 0,
                Some(value) => value
                    .as_i64()
                    .ok_or_else(|| anyhow!("field '{}' is not an integer", field))?,
            };
            fields.insert(field.to_string(), Value::from(current + by));
        }
        FieldOp::ArrayUnion(values) => {
            let slot = fields
                .entry(field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if slot.is_null() {
                *slot = Value::Array(Vec::new());
            }
            let items = slot
                .as_array_mut()
                .ok_or_else(|| anyhow!("field '{}' is not an array", field))?;
            for value in values {
                if !items.contains(value) {
                    items.push(value.clone());
                }
            }
        }
        FieldOp::PatchArrayElements {
            key_field,
            keys,
            patch,
        } => {
            let Some(slot) = fields.get_mut(field) else {
                return Ok(());
            };
            let items = slot
                .as_array_mut()
                .ok_or_else(|| anyhow!("field '{}' is not an array", field))?;
            for item in items.iter_mut() {
                let Some(obj) = item.as_object_mut() else {
                    continue;
                };
                let matches = obj.get(key_field).map(|k| keys.contains(k)).unwrap_or(false);
                if matches {
                    for (k, v) in patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }
    Ok(())
}

#[async_trait]
impl BaseDocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document::new(id, fields.clone())))
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let now = self.clock.now().to_rfc3339();
        let mut changes = Vec::with_capacity(writes.len());
        {
            let mut tables = self.tables.write().await;

            // Stage every write on copies first so a failing write leaves nothing behind.
            let mut staged: Vec<((Collection, String), Fields)> = Vec::new();
            for write in &writes {
                let collection = write.collection();
                let id = match write {
                    Write::Put { id, .. } => id,
                    Write::Update(update) => &update.id,
                };
                let key = (collection, id.clone());
                let position = staged.iter().position(|(k, _)| *k == key);
                let current = match position {
                    Some(i) => Some(staged[i].1.clone()),
                    None => tables.get(&collection).and_then(|d| d.get(id)).cloned(),
                };

                let next = match write {
                    Write::Put { fields, merge, .. } => {
                        let mut base = if *merge { current.unwrap_or_default() } else { Fields::new() };
                        for (k, v) in fields {
                            base.insert(k.clone(), v.clone());
                        }
                        base
                    }
                    Write::Update(update) => {
                        let Some(mut base) = current else {
                            bail!("{} document {} not found", collection, id);
                        };
                        for (field, op) in &update.ops {
                            apply_op(&mut base, field, op, &now)?;
                        }
                        base
                    }
                };

                match position {
                    Some(i) => staged[i].1 = next,
                    None => staged.push((key, next)),
                }
            }

            for ((collection, id), fields) in staged {
                let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
                tables.entry(collection).or_default().insert(id.clone(), fields);
                changes.push((collection, Change { document_id: id, version }));
            }
        }

        for (collection, change) in changes {
            debug!(collection = %collection, document_id = %change.document_id, "Document committed");
            self.hub.publish(collection, change).await;
        }
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(Self::run_query(&self.tables, query).await)
    }

    async fn subscribe(&self, query: Query) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Watch before the first read so no write can slip between them.
        let mut changes = self.hub.subscribe(query.collection).await;
        let initial = Self::run_query(&self.tables, &query).await;
        tx.send(SnapshotEvent::Snapshot(initial.clone()))
            .map_err(|_| anyhow!("subscriber dropped before first snapshot"))?;

        self.live
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx.clone());

        let tables = self.tables.clone();
        tokio::spawn(async move {
            let mut last = initial;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    received = changes.recv() => {
                        match received {
                            Ok(_) => {}
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Live query lagged behind change feed");
                            }
                            Err(RecvError::Closed) => break,
                        }
                        let docs = Self::run_query(&tables, &query).await;
                        if docs == last {
                            continue;
                        }
                        last = docs.clone();
                        if tx.send(SnapshotEvent::Snapshot(docs)).is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(collection = %query.collection, "Live query closed");
        });

        Ok(Subscription::new(rx))
    }
}
