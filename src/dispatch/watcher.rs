use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::DispatchError;
use crate::storage::CaptureNaming;

use super::PendingSet;

/// Result of one directory pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Every matching capture currently on disk.
    pub on_disk: HashSet<String>,
    /// Matching captures not yet sent, oldest first.
    pub candidates: Vec<String>,
}

/// List capture files in `dir`, skipping names already marked sent.
///
/// Names embed `YYYYMMDD_HHMMSS`, so lexicographic order is chronological.
pub fn scan_capture_dir(
    dir: &Path,
    naming: &CaptureNaming,
    pending: &PendingSet,
) -> Result<ScanResult, DispatchError> {
    let scan_err = |source| DispatchError::Scan {
        dir: dir.to_path_buf(),
        source,
    };
    let mut result = ScanResult::default();
    for entry in fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if !naming.matches(&name) {
            continue;
        }
        // Links are listed too; a dangling one fails at read time.
        match entry.file_type() {
            Ok(kind) if kind.is_file() || kind.is_symlink() => {}
            _ => continue,
        }
        if !pending.is_sent(&name) {
            result.candidates.push(name.clone());
        }
        result.on_disk.insert(name);
    }
    result.candidates.sort();
    Ok(result)
}
