//! Locating optional SCHISM output used by slow tests.

use std::path::{Path, PathBuf};

/// Environment variable naming an extra directory of test data.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Workspace root, two levels above this crate.
pub fn workspace_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest
        .ancestors()
        .nth(2)
        .unwrap_or(manifest)
        .to_path_buf()
}

/// Directories searched for test data, most specific first.
pub fn test_data_dirs() -> Vec<PathBuf> {
    let root = workspace_root();
    let mut dirs: Vec<PathBuf> = std::env::var_os(TEST_DATA_ENV)
        .map(PathBuf::from)
        .into_iter()
        .collect();
    dirs.push(root.join("crates/netcdf-parser/testdata"));
    dirs.push(root.join("crates/ingestion/testdata"));
    dirs.push(root.join("testdata"));
    dirs
}

/// First existing `name` in [`test_data_dirs`].
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    test_data_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}
