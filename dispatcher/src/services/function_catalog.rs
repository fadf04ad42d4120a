//! Function lists for probability analysis, read from `functions.json`
//!
//! The file holds a default list and named groups:
//!
//! ```json
//! { "functions": ["consciousness", "coma"], "groups": { "states": ["coma"] } }
//! ```

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;

use shared::{run_info, run_warn, DEFAULT_FUNCTIONS};
use crate::error::{DispatchError, DispatchResult};
use crate::services::result_store::write_atomic;

pub const DEFAULT_FUNCTIONS_FILE: &str = "functions.json";

/// Default function list plus named function groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCatalog {
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl Default for FunctionCatalog {
    fn default() -> Self {
        Self {
            functions: DEFAULT_FUNCTIONS.iter().map(|f| f.to_string()).collect(),
            groups: BTreeMap::new(),
        }
    }
}

impl FunctionCatalog {
    /// Load the catalog at `path`
    ///
    /// A missing file is seeded with the built-in defaults. A file that does
    /// not parse is a configuration error and is left untouched.
    pub async fn load(path: &Path) -> DispatchResult<Self> {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let catalog: Self = serde_json::from_str(&content).map_err(|e| {
                    DispatchError::config(format!("Error parsing {}: {e}", path.display()))
                })?;
                run_info!(
                    "Loaded {} functions and {} groups from {}",
                    catalog.functions.len(),
                    catalog.groups.len(),
                    path.display()
                );
                Ok(catalog)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                run_warn!("⚠️ {} not found. Using default functions", path.display());
                let catalog = Self::default();
                catalog.save(path).await?;
                Ok(catalog)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> DispatchResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        write_atomic(path, &serde_json::to_vec_pretty(self)?).await
    }

    /// Functions of the named group
    pub fn group(&self, name: &str) -> DispatchResult<&[String]> {
        self.groups
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DispatchError::config(format!("Function group '{name}' not found")))
    }
}
