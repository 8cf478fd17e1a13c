use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;

use crate::DocId;

/// A single field assignment inside an update.
#[derive(Debug, Clone)]
pub enum FieldWrite {
    /// Replace the field with a literal value.
    Value(Value),
    /// Add to the field's current numeric value, treating a missing
    /// field as zero. Applied atomically with the rest of the batch.
    Increment(i64),
    /// Stamp the field with the commit's server time.
    ServerTimestamp,
}

/// Field updates applied to one document. Top-level keys only.
pub type Patch = Vec<(String, FieldWrite)>;

#[derive(Debug, Clone)]
pub(crate) enum WriteOp {
    Set {
        path: String,
        id: DocId,
        data: Value,
    },
    Update {
        path: String,
        id: DocId,
        patch: Patch,
    },
    Delete {
        path: String,
        id: DocId,
    },
}

/// A set of writes committed atomically: either every op is applied
/// and subscribers see one snapshot covering all of them, or none is.
#[derive(Debug, Default)]
pub struct WriteBatch {
    pub(crate) ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch::default()
    }

    /// Queue an insert under a fresh auto-generated id, returned so
    /// later ops in the same batch can reference the document.
    pub fn create(&mut self, path: &str, data: Value) -> DocId {
        let id = generate_id();
        self.set(path, &id, data);
        id
    }

    pub fn set(&mut self, path: &str, id: &str, data: Value) {
        self.ops.push(WriteOp::Set {
            path: path.to_owned(),
            id: id.to_owned(),
            data,
        });
    }

    pub fn update(&mut self, path: &str, id: &str, patch: Patch) {
        self.ops.push(WriteOp::Update {
            path: path.to_owned(),
            id: id.to_owned(),
            patch,
        });
    }

    pub fn delete(&mut self, path: &str, id: &str) {
        self.ops.push(WriteOp::Delete {
            path: path.to_owned(),
            id: id.to_owned(),
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Random 20-char alphanumeric document id.
pub(crate) fn generate_id() -> DocId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(20)
        .map(char::from)
        .collect()
}
