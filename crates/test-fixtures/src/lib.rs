//! Test fixture loader for Tandem golden datasets.
//!
//! Provides typed deserialization of the fixture JSON files and helper
//! functions for loading them in tests across crates.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Root directory of the golden fixtures.
fn fixtures_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("golden")
}

/// Load and deserialize a JSON fixture file.
///
/// # Panics
/// Panics if the file doesn't exist or can't be deserialized.
pub fn load_fixture<T: DeserializeOwned>(relative_path: &str) -> T {
    let path = fixtures_root().join(relative_path);
    let content = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

/// Check that a fixture file exists.
pub fn fixture_exists(relative_path: &str) -> bool {
    fixtures_root().join(relative_path).exists()
}

/// Get the absolute path to a fixture file.
pub fn fixture_path(relative_path: &str) -> PathBuf {
    fixtures_root().join(relative_path)
}

/// List all JSON files in a fixture subdirectory, sorted by name.
pub fn list_fixtures(subdir: &str) -> Vec<PathBuf> {
    let dir = fixtures_root().join(subdir);
    if !dir.exists() {
        return Vec::new();
    }
    let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("Failed to read directory {}: {}", dir.display(), e))
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                Some(path)
            } else {
                None
            }
        })
        .collect();
    paths.sort();
    paths
}

/// A golden merge case: replica state, remote state and pending keys in,
/// merged state and per-key outcome out.
#[derive(Debug, Clone, Deserialize)]
pub struct MergeScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub local: BTreeMap<String, serde_json::Value>,
    pub remote: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub pending: Vec<String>,
    pub expected: MergeExpectation,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeExpectation {
    /// Replica contents after the merge.
    pub items: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub adopted: Vec<String>,
    #[serde(default)]
    pub retained: Vec<String>,
    #[serde(default)]
    pub pushed: Vec<String>,
}

/// Load every scenario under `golden/merge/`.
pub fn load_merge_scenarios() -> Vec<MergeScenario> {
    list_fixtures("merge")
        .into_iter()
        .map(|path| {
            let content = std::fs::read_to_string(&path)
                .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
            serde_json::from_str(&content)
                .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
        })
        .collect()
}
