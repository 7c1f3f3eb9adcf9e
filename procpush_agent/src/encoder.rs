//! Maps one cycle's ranked samples onto remote-write time series.

use std::collections::BTreeMap;

use crate::proto::{Label, Sample, TimeSeries, WriteRequest};
use crate::types::{HostIdentity, ProcessSample, RankedView, SystemMemorySnapshot};

pub const MAX_CMDLINE_CHARS: usize = 200;

/// Builds the write request for one cycle. Every series carries the host
/// labels and the static labels, and every sample shares `timestamp_ms`.
pub fn encode(
    view: &RankedView,
    memory: &SystemMemorySnapshot,
    host: &HostIdentity,
    static_labels: &BTreeMap<String, String>,
    timestamp_ms: i64,
) -> WriteRequest {
    let mut common: BTreeMap<String, String> = BTreeMap::new();
    common.insert("hostname".into(), host.hostname.clone());
    common.insert("ip".into(), host.ip.clone());
    common.insert("mac".into(), host.mac.clone());
    // operator labels win over host labels
    common.extend(static_labels.iter().map(|(k, v)| (k.clone(), v.clone())));

    let batch = Batch {
        common,
        timestamp_ms,
        series: Vec::new(),
    };
    batch.build(view, memory)
}

struct Batch {
    common: BTreeMap<String, String>,
    timestamp_ms: i64,
    series: Vec<TimeSeries>,
}

impl Batch {
    fn build(mut self, view: &RankedView, memory: &SystemMemorySnapshot) -> WriteRequest {
        for (i, p) in view.by_memory.iter().enumerate() {
            self.process("process_memory_bytes", p, Some(i + 1), p.memory_bytes as f64);
        }
        for (i, p) in view.by_memory.iter().enumerate() {
            self.process("process_memory_percent", p, Some(i + 1), p.memory_percent);
        }
        for (i, p) in view.by_cpu.iter().enumerate() {
            self.process("process_cpu_percent", p, Some(i + 1), p.cpu_percent);
        }
        for p in &view.merged {
            self.process("process_runtime_seconds", p, None, p.runtime_seconds as f64);
        }

        self.host("system_memory_total_bytes", memory.total_bytes as f64);
        self.host("system_memory_used_bytes", memory.used_bytes as f64);
        self.host("system_memory_available_bytes", memory.available_bytes as f64);
        self.host("system_memory_used_percent", memory.used_percent);

        WriteRequest {
            timeseries: self.series,
        }
    }

    fn process(&mut self, metric: &str, p: &ProcessSample, rank: Option<usize>, value: f64) {
        let mut extra = vec![
            ("pid", p.pid.to_string()),
            ("name", p.name.clone()),
            ("cmdline", escape_label_value(&p.cmdline)),
        ];
        if let Some(rank) = rank {
            extra.push(("rank", rank.to_string()));
        }
        self.push(metric, extra, value);
    }

    fn host(&mut self, metric: &str, value: f64) {
        self.push(metric, Vec::new(), value);
    }

    fn push(&mut self, metric: &str, extra: Vec<(&str, String)>, value: f64) {
        let mut labels = self.common.clone();
        labels.insert("__name__".into(), metric.to_string());
        labels.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));

        self.series.push(TimeSeries {
            // BTreeMap iteration gives the sorted, unique label names the protocol expects
            labels: labels
                .into_iter()
                .map(|(name, value)| Label { name, value })
                .collect(),
            samples: vec![Sample {
                value,
                timestamp: self.timestamp_ms,
            }],
        });
    }
}

/// Truncates to [`MAX_CMDLINE_CHARS`] characters (plus `...`), then escapes
/// backslash, double quote, newline and tab.
pub fn escape_label_value(s: &str) -> String {
    let truncated: String = match s.char_indices().nth(MAX_CMDLINE_CHARS) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    };

    let mut out = String::with_capacity(truncated.len());
    for c in truncated.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}
