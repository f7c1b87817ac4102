/*!
 * Source artifacts and the batches that carry them.
 *
 * - `model`: `ArtifactRecord`, `Batch`, `RecordRef`
 * - `registry`: the closed set of artifact types and file name classification
 * - `loader`: turns exported JSON files into sequenced batches
 */

pub mod loader;
pub mod model;
pub mod registry;

pub use loader::{BatchLoader, LoadedBatches, SkippedInput};
pub use model::{ArtifactRecord, Batch, BatchContext, RecordRef};
pub use registry::{ARTIFACT_TYPES, artifact_type_from_filename, is_known_artifact_type, json_key_for};
