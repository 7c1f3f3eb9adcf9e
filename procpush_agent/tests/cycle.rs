//! One full cycle: fake /proc tree -> remote-write endpoint.

mod common;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use procpush_agent::config::{AgentConfig, RemoteConfig};
use procpush_agent::error::CycleError;
use procpush_agent::proto::TimeSeries;
use procpush_agent::publisher::{HttpRemoteWriter, RetryPolicy};
use procpush_agent::sampler::collect_and_push;
use procpush_agent::types::HostIdentity;

fn config(remote: RemoteConfig, proc_root: PathBuf, top_n: usize) -> AgentConfig {
    AgentConfig {
        remote,
        interval: Duration::from_secs(60),
        top_n,
        retry: RetryPolicy {
            retries: 1,
            delay: Duration::from_millis(10),
        },
        labels: BTreeMap::from([("env".to_string(), "test".to_string())]),
        proc_root,
        once: true,
    }
}

fn host() -> HostIdentity {
    HostIdentity {
        hostname: "node-a".into(),
        ip: "10.0.0.1".into(),
        mac: "02:00:00:00:00:01".into(),
    }
}

fn label<'a>(ts: &'a TimeSeries, name: &str) -> Option<&'a str> {
    ts.labels.iter().find(|l| l.name == name).map(|l| l.value.as_str())
}

fn series<'a>(all: &'a [TimeSeries], metric: &str) -> Vec<&'a TimeSeries> {
    all.iter().filter(|ts| label(ts, "__name__") == Some(metric)).collect()
}

#[tokio::test]
async fn pushes_ranked_processes_and_host_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("proc");
    common::add_system(&root);
    // uptime 1000 s; started at tick 50_000 -> 500 s old
    common::add_process(&root, 10, "big", b"/usr/bin/big\0--serve\0", 300, (1000, 0, 50_000));
    // 50% cpu over 500 s
    common::add_process(&root, 20, "busy", b"/usr/bin/busy\0", 100, (20_000, 5_000, 50_000));
    common::add_process(&root, 30, "mid", b"", 200, (4_000, 1_000, 50_000));

    let (ep, url) = common::spawn_endpoint(0).await;
    let writer = HttpRemoteWriter::new(RemoteConfig::new(url.clone())).unwrap();
    let cfg = config(RemoteConfig::new(url), root, 2);

    let report = collect_and_push(&cfg, &host(), &writer).await.unwrap();
    assert_eq!(report.attempts, 1);

    let received = ep.received();
    assert_eq!(received.len(), 1);
    let all = &received[0].request.timeseries;

    let mem = series(all, "process_memory_bytes");
    assert_eq!(
        mem.iter().map(|ts| ts.samples[0].value).collect::<Vec<_>>(),
        vec![300.0 * 1024.0, 200.0 * 1024.0]
    );
    assert_eq!(label(mem[0], "cmdline"), Some("/usr/bin/big --serve"));
    assert_eq!(label(mem[1], "cmdline"), Some("[mid]"));
    assert_eq!(label(mem[1], "rank"), Some("2"));

    let cpu = series(all, "process_cpu_percent");
    assert_eq!(label(cpu[0], "name"), Some("busy"));
    assert_eq!(cpu[0].samples[0].value, 50.0);
    assert_eq!(label(cpu[1], "name"), Some("mid"));
    assert_eq!(cpu[1].samples[0].value, 10.0);

    let runtime = series(all, "process_runtime_seconds");
    assert_eq!(
        runtime.iter().map(|ts| label(ts, "pid").unwrap()).collect::<Vec<_>>(),
        vec!["10", "30", "20"]
    );
    assert!(runtime.iter().all(|ts| ts.samples[0].value == 500.0));

    let used = series(all, "system_memory_used_bytes");
    assert_eq!(used[0].samples[0].value, 524_288.0 * 1024.0);
    let pct = series(all, "system_memory_used_percent");
    assert_eq!(pct[0].samples[0].value, 50.0);

    let ts0 = all[0].samples[0].timestamp;
    for ts in all {
        assert_eq!(ts.samples[0].timestamp, ts0);
        assert_eq!(label(ts, "hostname"), Some("node-a"));
        assert_eq!(label(ts, "env"), Some("test"));
    }
}

#[tokio::test]
async fn unreadable_root_aborts_before_publishing() {
    let tmp = tempfile::tempdir().unwrap();
    let (ep, url) = common::spawn_endpoint(0).await;
    let writer = HttpRemoteWriter::new(RemoteConfig::new(url.clone())).unwrap();
    let cfg = config(RemoteConfig::new(url), tmp.path().join("missing"), 5);

    let err = collect_and_push(&cfg, &host(), &writer).await.unwrap_err();

    assert!(matches!(err, CycleError::Scan(_)), "{err}");
    assert_eq!(ep.attempts(), 0);
}
