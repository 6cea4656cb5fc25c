//! Document store vocabulary: documents, equality queries, merge-only writes
//! and live-query snapshots.
//!
//! Writes never overwrite a whole document owned by someone else. Arrays that
//! several actors append to (`responses`, `seenBy`) are only ever touched via
//! `ArrayUnion` or `PatchArrayElements`, so concurrent writers converge.

use serde_json::{Map, Value};
use std::fmt;
use tokio::sync::mpsc;

/// Field map of a JSON document.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    Requests,
    Donations,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profiles => "profiles",
            Self::Requests => "requests",
            Self::Donations => "donations",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// String field, `None` when missing, non-string or blank.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Equality predicate on a top-level field.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn matches(&self, doc: &Document) -> bool {
        doc.fields.get(self.field) == Some(&self.value)
    }
}

/// A query against one collection. Only equality filters are supported.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field,
            value: value.into(),
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

/// A partial-merge operation on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Append each value that is not already present.
    ArrayUnion(Vec<Value>),
    /// Merge `patch` into every object element whose `key_field` equals one of `keys`.
    PatchArrayElements {
        key_field: String,
        keys: Vec<Value>,
        patch: Fields,
    },
    /// Add to a numeric field; a missing or null field counts as zero.
    Increment(i64),
    /// Store-assigned write time (RFC 3339).
    ServerTimestamp,
}

/// Field-level update of an existing document.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub collection: Collection,
    pub id: String,
    pub ops: Vec<(String, FieldOp)>,
}

impl Update {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
            ops: Vec::new(),
        }
    }

    pub fn op(mut self, field: impl Into<String>, op: FieldOp) -> Self {
        self.ops.push((field.into(), op));
        self
    }

    pub fn set(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(field, FieldOp::Set(value.into()))
    }

    pub fn array_union(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.op(field, FieldOp::ArrayUnion(values))
    }

    pub fn increment(self, field: impl Into<String>, by: i64) -> Self {
        self.op(field, FieldOp::Increment(by))
    }

    pub fn server_timestamp(self, field: impl Into<String>) -> Self {
        self.op(field, FieldOp::ServerTimestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// One entry of an atomic write batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or write a document. With `merge`, only the given fields change.
    Put {
        collection: Collection,
        id: String,
        fields: Fields,
        merge: bool,
    },
    /// Field ops on an existing document; fails when the document is absent.
    Update(Update),
}

impl Write {
    pub fn collection(&self) -> Collection {
        match self {
            Self::Put { collection, .. } => *collection,
            Self::Update(update) => update.collection,
        }
    }
}

/// One delivery of a live query.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// Full result set at the time of delivery.
    Snapshot(Vec<Document>),
    /// Store-level failure; the subscription stays open.
    Error(String),
}

/// Handle to a live query. Dropping it tears the subscription down.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<SnapshotEvent>) -> Self {
        Self { rx }
    }

    /// Next delivery, or `None` once the store side has gone away.
    pub async fn next(&mut self) -> Option<SnapshotEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.rx.close();
    }
}
