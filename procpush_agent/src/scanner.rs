//! Walks the process-accounting root and samples every live process.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ScanError;
use crate::procfs::{read_process, read_scan_totals};
use crate::types::ProcessSample;

pub const DEFAULT_PROC_ROOT: &str = "/proc";

#[derive(Debug, Clone)]
pub struct ProcessScanner {
    root: PathBuf,
}

impl Default for ProcessScanner {
    fn default() -> Self {
        Self::new(DEFAULT_PROC_ROOT)
    }
}

impl ProcessScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Samples every numeric entry under the root, in directory order.
    ///
    /// Totals are read once up front so all samples share one denominator.
    /// Processes that vanish or deny access mid-scan are skipped; only an
    /// unreadable root fails the scan.
    pub fn scan(&self) -> Result<Vec<ProcessSample>, ScanError> {
        let entries = fs::read_dir(&self.root).map_err(|source| ScanError::RootUnreadable {
            root: self.root.clone(),
            source,
        })?;

        let totals = read_scan_totals(&self.root);
        debug!(?totals, "scan totals");

        let mut samples = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };
            match read_process(&self.root, pid, &totals) {
                Ok(sample) => samples.push(sample),
                Err(e) => debug!("skipping: {e}"),
            }
        }
        Ok(samples)
    }
}
