/*!
 * Core artifact data structures.
 *
 * An `ArtifactRecord` is one schema object extracted from the source system
 * (a table, a view, a procedure, ...). A `Batch` groups records of a single
 * artifact type together with a sequence number that fixes its position in
 * the run's dispatch order.
 */

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::BatchError;

/// Shared key/value context attached to a batch
pub type BatchContext = BTreeMap<String, Value>;

/// One source schema object awaiting translation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    name: String,
    qualified_name: String,
    metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

const NAME_KEYS: [&str; 3] = ["name", "object_name", "artifact_name"];
const DATABASE_KEYS: [&str; 3] = ["database_name", "database", "catalog_name"];
const SCHEMA_KEYS: [&str; 2] = ["schema_name", "schema"];
const BODY_KEYS: [&str; 5] = ["definition", "body", "ddl", "text", "sql"];

impl ArtifactRecord {
    /// Create a record with an explicit name and metadata object
    pub fn new(name: impl Into<String>, metadata: Value) -> Self {
        let name = name.into();
        Self {
            qualified_name: name.clone(),
            name,
            metadata,
            body: None,
        }
    }

    /// Build a record from a raw metadata object.
    ///
    /// The name comes from `name`-like keys (or any `*_name` key), the qualified
    /// name prefixes the database and schema when present, and the body comes from
    /// the first definition-like key. `fallback_name` is used when no name is found.
    pub fn from_metadata(metadata: Value, fallback_name: impl Into<String>) -> Self {
        let name = first_string(&metadata, &NAME_KEYS)
            .or_else(|| {
                metadata.as_object().and_then(|object| {
                    object
                        .iter()
                        .filter(|(key, _)| {
                            key.ends_with("_name")
                                && !DATABASE_KEYS.contains(&key.as_str())
                                && !SCHEMA_KEYS.contains(&key.as_str())
                        })
                        .find_map(|(_, value)| value.as_str().map(str::to_string))
                })
            })
            .unwrap_or_else(|| fallback_name.into());

        let mut parts: Vec<String> = Vec::with_capacity(3);
        if let Some(database) = first_string(&metadata, &DATABASE_KEYS) {
            parts.push(database);
        }
        if let Some(schema) = first_string(&metadata, &SCHEMA_KEYS) {
            parts.push(schema);
        }
        if parts.last() != Some(&name) {
            parts.push(name.clone());
        }

        let body = first_string(&metadata, &BODY_KEYS);

        Self {
            name,
            qualified_name: parts.join("."),
            metadata,
            body,
        }
    }

    pub fn with_qualified_name(mut self, qualified_name: impl Into<String>) -> Self {
        self.qualified_name = qualified_name.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }
}

fn first_string(metadata: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        metadata
            .get(*key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    })
}

/// Identifies a single record within a run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    /// Sequence number of the batch that carried the record
    pub batch_sequence: u64,
    /// Position of the record inside its batch
    pub index: usize,
    /// Record name, for humans
    pub name: String,
}

/// Immutable unit of work: records of one artifact type plus shared context
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Batch {
    sequence: u64,
    artifact_type: String,
    items: Vec<ArtifactRecord>,
    context: BatchContext,
}

impl Batch {
    /// Create a batch. Empty batches are rejected.
    pub fn new(
        sequence: u64,
        artifact_type: impl Into<String>,
        items: Vec<ArtifactRecord>,
        context: BatchContext,
    ) -> Result<Self, BatchError> {
        let artifact_type = artifact_type.into();
        if items.is_empty() {
            return Err(BatchError::Empty {
                sequence,
                artifact_type,
            });
        }

        Ok(Self {
            sequence,
            artifact_type,
            items,
            context,
        })
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    pub fn items(&self) -> &[ArtifactRecord] {
        &self.items
    }

    pub fn context(&self) -> &BatchContext {
        &self.context
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the batch has no records
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Reference to the record at `index`
    pub fn record_ref(&self, index: usize) -> RecordRef {
        RecordRef {
            batch_sequence: self.sequence,
            index,
            name: self
                .items
                .get(index)
                .map(|record| record.name().to_string())
                .unwrap_or_default(),
        }
    }

    /// References for every record, in order
    pub fn record_refs(&self) -> Vec<RecordRef> {
        (0..self.items.len()).map(|index| self.record_ref(index)).collect()
    }
}
