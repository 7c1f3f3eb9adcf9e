//! Top-N selection by memory and by CPU, plus their merged view.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::types::{ProcessSample, RankedView};

/// Ranks `samples` twice and merges the results.
///
/// Ties keep no particular order. `n == 0` yields an empty view.
pub fn rank(samples: &[ProcessSample], n: usize) -> RankedView {
    let mut by_memory = samples.to_vec();
    by_memory.sort_unstable_by(|a, b| b.memory_bytes.cmp(&a.memory_bytes));
    by_memory.truncate(n);

    let mut by_cpu = samples.to_vec();
    by_cpu.sort_unstable_by(|a, b| desc_f64(a.cpu_percent, b.cpu_percent));
    by_cpu.truncate(n);

    let merged = merge(&by_memory, &by_cpu);
    RankedView {
        by_memory,
        by_cpu,
        merged,
    }
}

/// Concatenates `first` then `second`, keeping the first sample seen per pid.
pub fn merge(first: &[ProcessSample], second: &[ProcessSample]) -> Vec<ProcessSample> {
    let mut seen = HashSet::with_capacity(first.len() + second.len());
    first
        .iter()
        .chain(second)
        .filter(|p| seen.insert(p.pid))
        .cloned()
        .collect()
}

fn desc_f64(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
