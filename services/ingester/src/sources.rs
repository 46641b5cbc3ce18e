//! Input discovery.
//!
//! An input specification is a comma-separated list of entries. Each entry
//! is a file, a directory, or a glob pattern with `*` and `?`. Directories
//! expand to the NetCDF files they contain and patterns to the files they
//! match. The final list is in natural snapshot order.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ingestion::{detect_file_type, sort_snapshots, FileType};
use tracing::debug;
use walkdir::WalkDir;

pub fn discover_inputs(spec: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let path = Path::new(entry);
        if is_pattern(entry) {
            let found = expand_pattern(entry)?;
            debug!(pattern = %entry, files = found.len(), "Expanded input pattern");
            paths.extend(found);
        } else if path.is_dir() {
            let found = walk_dir(path, recursive)?;
            debug!(dir = %entry, files = found.len(), "Scanned input directory");
            paths.extend(found);
        } else {
            // Missing files are reported by the reader with the file name.
            paths.push(path.to_path_buf());
        }
    }

    if paths.is_empty() {
        bail!("No input files found for {:?}", spec);
    }

    sort_snapshots(&mut paths);
    paths.dedup();
    Ok(paths)
}

fn is_pattern(entry: &str) -> bool {
    entry.contains('*') || entry.contains('?')
}

fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let entries =
        glob::glob(pattern).with_context(|| format!("Invalid input pattern {:?}", pattern))?;
    for entry in entries {
        let path = entry.with_context(|| format!("Failed to read a match of {:?}", pattern))?;
        if path.is_file() {
            found.push(path);
        }
    }
    Ok(found)
}

fn walk_dir(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(max_depth) {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        if entry.file_type().is_file() && detect_file_type(entry.path()) == FileType::NetCdf {
            found.push(entry.into_path());
        }
    }
    Ok(found)
}
