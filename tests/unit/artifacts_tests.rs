/*!
 * Tests for artifact loading and batching
 */

use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;

use ddlport::artifacts::{ArtifactRecord, BatchLoader, artifact_type_from_filename, is_known_artifact_type};

use crate::common;

/// Test that records are split into fixed-size batches with global sequence numbers
#[test]
fn test_loadAll_shouldSequenceBatchesAcrossFiles() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let tables = common::create_artifact_file(
        temp_dir.path(),
        "tables.json",
        "tables",
        vec![json!({"name": "T1"}), json!({"name": "T2"}), json!({"name": "T3"})],
    )?;
    let views = common::create_artifact_file(
        temp_dir.path(),
        "views.json",
        "views",
        vec![json!({"name": "V1"})],
    )?;

    let mut loader = BatchLoader::new(2).with_context("target_dialect", "databricks");
    let loaded = loader.load_all(&[tables, views])?;

    assert_eq!(loaded.record_count, 4);
    assert!(loaded.skipped.is_empty());
    let summary: Vec<(u64, &str, usize)> = loaded
        .batches
        .iter()
        .map(|batch| (batch.sequence(), batch.artifact_type(), batch.len()))
        .collect();
    assert_eq!(summary, vec![(0, "tables", 2), (1, "tables", 1), (2, "views", 1)]);
    assert_eq!(loaded.batches[0].context().get("target_dialect"), Some(&json!("databricks")));
    assert_eq!(loaded.batches[1].context().get("batch_index"), Some(&json!(1)));
    Ok(())
}

/// Test that unclassifiable and malformed files are skipped, not fatal
#[test]
fn test_loadAll_withBadInputs_shouldSkipThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let unknown = common::create_test_file(temp_dir.path(), "inventory.json", "{}")?;
    let broken = common::create_test_file(temp_dir.path(), "views.json", "{ not json")?;
    let good = common::create_artifact_file(temp_dir.path(), "schemas.json", "schemas", vec![json!({"name": "S"})])?;

    let loaded = BatchLoader::new(5).load_all(&[unknown.clone(), broken.clone(), good])?;

    assert_eq!(loaded.batches.len(), 1);
    let skipped: Vec<&PathBuf> = loaded.skipped.iter().map(|skipped| &skipped.path).collect();
    assert_eq!(skipped, vec![&unknown, &broken]);
    Ok(())
}

/// Test that directories expand to the JSON files they contain
#[test]
fn test_loadAll_withDirectory_shouldReadJsonFilesOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    common::create_artifact_file(temp_dir.path(), "roles.json", "roles", vec![json!({"name": "ANALYST"})])?;
    common::create_test_file(temp_dir.path(), "notes.txt", "roles are reviewed weekly")?;

    let loaded = BatchLoader::new(5).load_all(&[temp_dir.path().to_path_buf()])?;

    assert_eq!(loaded.batches.len(), 1);
    assert_eq!(loaded.batches[0].artifact_type(), "roles");
    Ok(())
}

/// Test that a missing input path is an error
#[test]
fn test_loadAll_withMissingPath_shouldFail() {
    let result = BatchLoader::new(5).load_all(&[PathBuf::from("/definitely/not/here.json")]);
    assert!(result.is_err());
}

/// Test that UDF exports are read from the "functions" key
#[test]
fn test_loadFile_udfs_shouldUseFunctionsKey() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_artifact_file(
        temp_dir.path(),
        "udfs.json",
        "functions",
        vec![json!({"function_name": "ADD_ONE", "body": "x + 1"})],
    )?;

    let batches = BatchLoader::new(5).load_file(&path)?;

    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].artifact_type(), "udfs");
    assert_eq!(batches[0].items()[0].name(), "ADD_ONE");
    assert_eq!(batches[0].items()[0].body(), Some("x + 1"));
    Ok(())
}

/// Test that qualified names carry database and schema
#[test]
fn test_fromMetadata_shouldBuildQualifiedName() {
    let record = ArtifactRecord::from_metadata(
        json!({"database_name": "SALES", "schema_name": "PUBLIC", "table_name": "ORDERS"}),
        "tables#0",
    );

    assert_eq!(record.name(), "ORDERS");
    assert_eq!(record.qualified_name(), "SALES.PUBLIC.ORDERS");

    let anonymous = ArtifactRecord::from_metadata(json!({"kind": "TABLE"}), "tables#3");
    assert_eq!(anonymous.name(), "tables#3");
}

/// Test file name classification against the closed type set
#[test]
fn test_artifactTypeFromFilename_shouldClassifyKnownExports() {
    let cases = [
        ("snowflake_tables_export.json", Some("tables")),
        ("grants_flattened.json", Some("grants")),
        ("masking_policies.json", Some("masking_policies")),
        ("file_formats.json", Some("file_formats")),
        ("random.json", None),
    ];

    for (filename, expected) in cases {
        let actual = artifact_type_from_filename(&PathBuf::from(filename));
        assert_eq!(actual, expected, "classifying {}", filename);
        if let Some(artifact_type) = actual {
            assert!(is_known_artifact_type(artifact_type));
        }
    }
}
