//! Tests for loading function lists and groups

use std::fs;

use shared::DEFAULT_FUNCTIONS;
use crate::error::DispatchError;
use crate::services::function_catalog::FunctionCatalog;

#[tokio::test]
async fn test_groups_are_read_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("functions.json");
    fs::write(
        &path,
        r#"{ "functions": ["learning", "memory"], "groups": { "states": ["coma", "anaesthesia"] } }"#,
    )
    .unwrap();

    let catalog = FunctionCatalog::load(&path).await.unwrap();

    assert_eq!(catalog.functions, vec!["learning", "memory"]);
    assert_eq!(catalog.group("states").unwrap(), ["coma", "anaesthesia"]);
}

#[tokio::test]
async fn test_unknown_group_is_config_error() {
    let catalog = FunctionCatalog::default();
    assert!(matches!(catalog.group("motor"), Err(DispatchError::Config { .. })));
}

#[tokio::test]
async fn test_missing_file_is_seeded_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("functions.json");

    let catalog = FunctionCatalog::load(&path).await.unwrap();

    assert_eq!(catalog.functions.len(), DEFAULT_FUNCTIONS.len());
    assert!(catalog.groups.is_empty());
    let reloaded = FunctionCatalog::load(&path).await.unwrap();
    assert_eq!(reloaded, catalog);
}

#[tokio::test]
async fn test_partial_file_defaults_missing_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("functions.json");
    fs::write(&path, r#"{ "groups": { "vision": ["visual processing"] } }"#).unwrap();

    let catalog = FunctionCatalog::load(&path).await.unwrap();

    assert!(catalog.functions.is_empty());
    assert_eq!(catalog.group("vision").unwrap(), ["visual processing"]);
}

#[tokio::test]
async fn test_malformed_file_is_left_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("functions.json");
    fs::write(&path, "{ functions: ").unwrap();

    let err = FunctionCatalog::load(&path).await.unwrap_err();

    assert!(matches!(err, DispatchError::Config { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), "{ functions: ");
}
