/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;

use ddlport::file_utils::FileManager;

use crate::common;

/// Test file and directory existence checks
#[test]
fn test_existenceChecks_shouldDistinguishFilesAndDirs() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let file = common::create_test_file(temp_dir.path(), "tables.json", "{}")?;

    assert!(FileManager::file_exists(&file));
    assert!(!FileManager::dir_exists(&file));
    assert!(FileManager::dir_exists(temp_dir.path()));
    assert!(!FileManager::file_exists(temp_dir.path().join("missing.json")));
    Ok(())
}

/// Test that find_files walks nested directories
#[test]
fn test_findFiles_shouldWalkSubdirectories() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("exports/2024");
    FileManager::ensure_dir(&nested)?;
    common::create_test_file(&nested, "views.json", "{}")?;
    common::create_test_file(temp_dir.path(), "tables.json", "{}")?;
    common::create_test_file(temp_dir.path(), "readme.md", "# exports")?;

    let mut found = FileManager::find_files(temp_dir.path(), ".json")?;
    found.sort();

    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|path| path.extension().is_some_and(|ext| ext == "json")));
    Ok(())
}

/// Test writing and reading back text
#[test]
fn test_writeToFile_shouldCreateParentsAndOverwrite() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("out/sql/tables.sql");

    FileManager::write_to_file(&path, "first")?;
    FileManager::write_to_file(&path, "second")?;

    assert_eq!(FileManager::read_to_string(&path)?, "second");
    Ok(())
}

/// Test that log lines are appended with a timestamp prefix
#[test]
fn test_appendToLogFile_shouldKeepEarlierLines() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("ddlport.run.log");

    FileManager::append_to_log_file(&path, "run a")?;
    FileManager::append_to_log_file(&path, "run b")?;

    let content = fs::read_to_string(&path)?;
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with('[') && lines[0].ends_with("] run a"));
    assert!(lines[1].ends_with("] run b"));
    Ok(())
}

/// Test that reading a missing file reports the path
#[test]
fn test_readToString_missingFile_shouldFail() {
    let error = FileManager::read_to_string("/no/such/dir/tables.json").unwrap_err();
    assert!(error.to_string().contains("tables.json"));
}
