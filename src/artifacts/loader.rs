/*!
 * Batch loading from exported artifact files.
 *
 * Each input file is a JSON document exported from the source system. The
 * artifact type is inferred from the file name, the records live under a
 * top-level key (usually the artifact type itself), and every array element
 * becomes one `ArtifactRecord`. Records are split into fixed-size batches and
 * sequence numbers are assigned in load order across all files.
 */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use log::{debug, warn};
use serde_json::Value;

use crate::file_utils::FileManager;

use super::model::{ArtifactRecord, Batch, BatchContext};
use super::registry::{ARTIFACT_TYPES, artifact_type_from_filename, json_key_for};

/// An input that could not be turned into batches
#[derive(Debug, Clone)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading a set of inputs
#[derive(Debug, Default)]
pub struct LoadedBatches {
    pub batches: Vec<Batch>,
    pub skipped: Vec<SkippedInput>,
    pub record_count: usize,
}

/// Splits artifact files into sequenced batches
#[derive(Debug)]
pub struct BatchLoader {
    batch_size: usize,
    next_sequence: u64,
    shared_context: BatchContext,
}

impl BatchLoader {
    /// Create a loader. A batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            next_sequence: 0,
            shared_context: BatchContext::new(),
        }
    }

    /// Context entries copied into every batch
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.shared_context.insert(key.into(), value.into());
        self
    }

    /// Expand directories into the JSON files they contain, keeping plain files as given
    pub fn collect_input_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for input in inputs {
            if FileManager::dir_exists(input) {
                let mut found = FileManager::find_files(input, "json")?;
                found.sort();
                files.extend(found);
            } else if FileManager::file_exists(input) {
                files.push(input.clone());
            } else {
                return Err(anyhow!("Input path does not exist: {}", input.display()));
            }
        }
        Ok(files)
    }

    /// Load every input. Files that cannot be classified or parsed are skipped and reported.
    pub fn load_all(&mut self, inputs: &[PathBuf]) -> Result<LoadedBatches> {
        let files = Self::collect_input_files(inputs)?;
        let mut loaded = LoadedBatches::default();

        for path in files {
            match self.load_file(&path) {
                Ok(batches) => {
                    loaded.record_count += batches.iter().map(Batch::len).sum::<usize>();
                    loaded.batches.extend(batches);
                }
                Err(e) => {
                    warn!("Skipping {}: {:#}", path.display(), e);
                    loaded.skipped.push(SkippedInput {
                        path,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(loaded)
    }

    /// Load a single artifact file
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<Batch>> {
        let artifact_type = artifact_type_from_filename(path).ok_or_else(|| {
            anyhow!(
                "Cannot determine artifact type from file name; expected one of: {}",
                ARTIFACT_TYPES.join(", ")
            )
        })?;

        let content = FileManager::read_to_string(path)?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?;

        self.batches_from_document(artifact_type, &path.display().to_string(), &document)
    }

    /// Split the records of one parsed document into batches
    pub fn batches_from_document(
        &mut self,
        artifact_type: &str,
        source_file: &str,
        document: &Value,
    ) -> Result<Vec<Batch>> {
        let key = json_key_for(artifact_type);
        let Some(entries) = document.get(key) else {
            let available: Vec<&String> = document
                .as_object()
                .map(|object| object.keys().collect())
                .unwrap_or_default();
            warn!(
                "Artifact type '{}' (key '{}') not found in {}. Available keys: {:?}",
                artifact_type, key, source_file, available
            );
            return Ok(Vec::new());
        };

        let entries = entries
            .as_array()
            .ok_or_else(|| anyhow!("Expected '{}' to be a list in {}", key, source_file))?;

        let records: Vec<ArtifactRecord> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                ArtifactRecord::from_metadata(entry.clone(), format!("{}#{}", artifact_type, index))
            })
            .collect();

        let total_batches = records.len().div_ceil(self.batch_size);
        let mut batches = Vec::with_capacity(total_batches);

        for (batch_index, chunk) in records.chunks(self.batch_size).enumerate() {
            let mut context = self.shared_context.clone();
            context.insert("source_file".to_string(), Value::from(source_file));
            context.insert("batch_index".to_string(), Value::from(batch_index));
            context.insert("total_batches".to_string(), Value::from(total_batches));

            let batch = Batch::new(self.next_sequence, artifact_type, chunk.to_vec(), context)?;
            self.next_sequence += 1;
            batches.push(batch);
        }

        debug!(
            "Loaded {} {} record(s) from {} into {} batch(es)",
            records.len(),
            artifact_type,
            source_file,
            batches.len()
        );

        Ok(batches)
    }
}
