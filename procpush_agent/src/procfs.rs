//! Parsers and readers for the `/proc` records the agent consumes.
//!
//! The `parse_*` functions are pure and take file contents, so they can be
//! exercised with literal inputs. The `read_*` functions resolve paths below a
//! configurable root (normally `/proc`) and feed the parsers.
//!
//! System-wide readers never fail: a missing or malformed record yields zero.
//! Per-process reads fail only when a whole record is unreadable, which is
//! reported as [`SampleError::ProcessUnreadable`].

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::SampleError;
use crate::types::{ProcessSample, ScanTotals, SystemMemorySnapshot};

/// Fixed clock-tick rate used to convert `stat` tick counters to seconds.
pub const CLOCK_TICKS_PER_SEC: i64 = 100;

// ---------- per-process parsers ----------

/// Short name from `/proc/<pid>/comm`.
pub fn parse_comm(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim().to_string()
}

/// Invocation string from `/proc/<pid>/cmdline`: NUL separators become spaces.
/// Kernel threads have an empty cmdline and are reported as `[name]`.
pub fn parse_cmdline(raw: &[u8], name: &str) -> String {
    let joined: Vec<u8> = raw
        .iter()
        .map(|&b| if b == 0 { b' ' } else { b })
        .collect();
    let cmdline = String::from_utf8_lossy(&joined).trim().to_string();
    if cmdline.is_empty() {
        format!("[{name}]")
    } else {
        cmdline
    }
}

/// Resident set size in KiB from the `VmRSS:` line of `/proc/<pid>/status`.
pub fn parse_vm_rss_kib(status: &str) -> u64 {
    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Counters taken from `/proc/<pid>/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatTimes {
    /// utime + stime, in clock ticks.
    pub cpu_time: u64,
    /// Start time after boot, in clock ticks.
    pub start_ticks: i64,
}

/// Parses utime (field 14), stime (field 15) and starttime (field 22).
///
/// Field numbers are 1-based. They are counted from the closing `)` of the
/// comm field so names containing spaces do not shift them. Returns `None`
/// when the record has fewer than 22 fields; individual malformed fields
/// degrade to zero.
pub fn parse_stat_times(stat: &str) -> Option<StatTimes> {
    let fields: Vec<&str> = match stat.rfind(')') {
        // pid and comm occupy fields 1 and 2
        Some(rpar) => ["", ""]
            .into_iter()
            .chain(stat[rpar + 1..].split_whitespace())
            .collect(),
        None => stat.split_whitespace().collect(),
    };
    if fields.len() < 22 {
        return None;
    }
    let utime: u64 = fields[13].parse().unwrap_or(0);
    let stime: u64 = fields[14].parse().unwrap_or(0);
    let start_ticks: i64 = fields[21].parse().unwrap_or(0);
    Some(StatTimes {
        cpu_time: utime.saturating_add(stime),
        start_ticks,
    })
}

/// Share of total system memory, 0 when the total is unknown.
pub fn memory_percent(memory_bytes: u64, total_memory_bytes: u64) -> f64 {
    if total_memory_bytes > 0 {
        memory_bytes as f64 / total_memory_bytes as f64 * 100.0
    } else {
        0.0
    }
}

/// Seconds since process start. Not clamped: a negative value means uptime and
/// the process start tick disagree, and is reported as is. Saturates at the
/// `i64` bounds for nonsensical inputs.
pub fn runtime_seconds(uptime_seconds: i64, start_ticks: i64) -> i64 {
    uptime_seconds.saturating_sub(start_ticks / CLOCK_TICKS_PER_SEC)
}

/// Average CPU utilization since process start, 0 unless runtime is positive.
pub fn cpu_percent(cpu_time: u64, runtime_seconds: i64) -> f64 {
    if runtime_seconds > 0 {
        let cpu_seconds = cpu_time as f64 / CLOCK_TICKS_PER_SEC as f64;
        cpu_seconds / runtime_seconds as f64 * 100.0
    } else {
        0.0
    }
}

// ---------- system-wide parsers ----------

/// `MemTotal` from `/proc/meminfo`, in bytes.
pub fn parse_total_memory(meminfo: &str) -> u64 {
    meminfo
        .lines()
        .find(|line| line.starts_with("MemTotal:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|v| v.parse::<u64>().ok())
        .map(|kib| kib.saturating_mul(1024))
        .unwrap_or(0)
}

/// Host memory usage from `/proc/meminfo`.
///
/// Prefers `MemAvailable` when present and nonzero. Older kernels lack it, in
/// which case available memory is estimated as `MemFree + Buffers + Cached`.
pub fn parse_memory_snapshot(meminfo: &str) -> SystemMemorySnapshot {
    let (mut total, mut free, mut available, mut buffers, mut cached) = (0u64, 0, 0, 0, 0);
    for line in meminfo.lines() {
        let mut it = line.split_whitespace();
        let (Some(key), Some(value)) = (it.next(), it.next()) else {
            continue;
        };
        let bytes = value.parse::<u64>().unwrap_or(0).saturating_mul(1024);
        match key {
            "MemTotal:" => total = bytes,
            "MemFree:" => free = bytes,
            "MemAvailable:" => available = bytes,
            "Buffers:" => buffers = bytes,
            "Cached:" => cached = bytes,
            _ => {}
        }
    }

    let available_bytes = if available > 0 {
        available
    } else {
        free.saturating_add(buffers).saturating_add(cached)
    };
    let used_bytes = total.saturating_sub(available_bytes);
    SystemMemorySnapshot {
        total_bytes: total,
        used_bytes,
        available_bytes,
        used_percent: memory_percent(used_bytes, total),
    }
}

/// Whole seconds since boot from `/proc/uptime`.
pub fn parse_uptime_seconds(uptime: &str) -> i64 {
    uptime
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .map(|secs| secs as i64)
        .unwrap_or(0)
}

/// Sum of every counter on the aggregate `cpu ` line of `/proc/stat`.
pub fn parse_total_cpu_time(stat: &str) -> u64 {
    let Some(line) = stat.lines().find(|line| line.starts_with("cpu ")) else {
        return 0;
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 5 {
        return 0;
    }
    fields[1..]
        .iter()
        .map(|tok| tok.parse::<u64>().unwrap_or(0))
        .fold(0u64, u64::saturating_add)
}

// ---------- readers ----------

fn read_or_empty(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

pub fn read_total_memory(root: &Path) -> u64 {
    parse_total_memory(&read_or_empty(&root.join("meminfo")))
}

pub fn read_memory_snapshot(root: &Path) -> SystemMemorySnapshot {
    parse_memory_snapshot(&read_or_empty(&root.join("meminfo")))
}

pub fn read_uptime_seconds(root: &Path) -> i64 {
    parse_uptime_seconds(&read_or_empty(&root.join("uptime")))
}

pub fn read_total_cpu_time(root: &Path) -> u64 {
    parse_total_cpu_time(&read_or_empty(&root.join("stat")))
}

/// Reads the scan-wide denominators once.
pub fn read_scan_totals(root: &Path) -> ScanTotals {
    ScanTotals {
        total_memory_bytes: read_total_memory(root),
        uptime_seconds: read_uptime_seconds(root),
        total_cpu_time: read_total_cpu_time(root),
    }
}

/// Builds one [`ProcessSample`] from `<root>/<pid>/{comm,cmdline,status,stat}`.
///
/// `comm`, `cmdline` and `status` must be readable; `stat` is best effort and
/// leaves CPU time, CPU percent and runtime at zero when missing.
pub fn read_process(root: &Path, pid: u32, totals: &ScanTotals) -> Result<ProcessSample, SampleError> {
    let dir = root.join(pid.to_string());
    let unreadable = |source| SampleError::ProcessUnreadable { pid, source };

    let name = parse_comm(&fs::read(dir.join("comm")).map_err(unreadable)?);
    let cmdline = parse_cmdline(&fs::read(dir.join("cmdline")).map_err(unreadable)?, &name);
    let status = fs::read(dir.join("status")).map_err(unreadable)?;

    let memory_bytes = parse_vm_rss_kib(&String::from_utf8_lossy(&status)).saturating_mul(1024);
    let mut sample = ProcessSample {
        pid,
        name,
        cmdline,
        memory_bytes,
        memory_percent: memory_percent(memory_bytes, totals.total_memory_bytes),
        ..ProcessSample::default()
    };

    if let Some(times) = fs::read_to_string(dir.join("stat"))
        .ok()
        .and_then(|s| parse_stat_times(&s))
    {
        sample.cpu_time = times.cpu_time;
        sample.runtime_seconds = runtime_seconds(totals.uptime_seconds, times.start_ticks);
        sample.cpu_percent = cpu_percent(times.cpu_time, sample.runtime_seconds);
        if sample.runtime_seconds < 0 {
            debug!(
                pid,
                runtime_seconds = sample.runtime_seconds,
                "process start is later than system uptime"
            );
        }
    }

    Ok(sample)
}
