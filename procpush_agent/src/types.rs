//! Data collected during one publish cycle.
//! Everything here is built fresh per scan and never mutated afterwards.

/// Snapshot of one process at scan time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessSample {
    pub pid: u32,
    pub name: String,
    pub cmdline: String,
    pub memory_bytes: u64,
    pub memory_percent: f64,
    // user + kernel ticks
    pub cpu_time: u64,
    // average since process start; can exceed 100 on multi-threaded load
    pub cpu_percent: f64,
    // uptime - start offset; negative when the two counters disagree
    pub runtime_seconds: i64,
}

/// Whole-host memory usage at scan time.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SystemMemorySnapshot {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    pub used_percent: f64,
}

/// Denominators captured once at the start of a scan so every sample in the
/// set is computed against the same totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanTotals {
    pub total_memory_bytes: u64,
    pub uptime_seconds: i64,
    pub total_cpu_time: u64,
}

pub const UNKNOWN: &str = "unknown";

/// Identity labels attached to every series. Resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub hostname: String,
    pub ip: String,
    pub mac: String,
}

impl Default for HostIdentity {
    fn default() -> Self {
        Self {
            hostname: UNKNOWN.to_string(),
            ip: UNKNOWN.to_string(),
            mac: UNKNOWN.to_string(),
        }
    }
}

/// Top-N by memory, top-N by CPU, and their pid-deduplicated union.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedView {
    pub by_memory: Vec<ProcessSample>,
    pub by_cpu: Vec<ProcessSample>,
    pub merged: Vec<ProcessSample>,
}
