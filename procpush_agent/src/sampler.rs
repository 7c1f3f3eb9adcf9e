//! Scheduler: runs one collect-and-push cycle per interval tick.
//! Cycles never overlap; a tick that comes due during a slow cycle (e.g. one
//! sleeping between retries) is delayed until the cycle finishes.

use std::future::Future;

use time::OffsetDateTime;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::AgentConfig;
use crate::encoder::encode;
use crate::error::CycleError;
use crate::procfs::read_memory_snapshot;
use crate::publisher::{publish_with_retry, PublishReport, RemoteWrite};
use crate::ranker::rank;
use crate::scanner::ProcessScanner;
use crate::types::HostIdentity;

/// Milliseconds since the Unix epoch, shared by every sample of a batch.
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Scans, ranks, encodes and pushes once.
pub async fn collect_and_push<W: RemoteWrite>(
    config: &AgentConfig,
    host: &HostIdentity,
    writer: &W,
) -> Result<PublishReport, CycleError> {
    info!("collecting process metrics");
    let scanner = ProcessScanner::new(&config.proc_root);
    let samples = scanner.scan()?;
    let view = rank(&samples, config.top_n);
    let memory = read_memory_snapshot(scanner.root());
    let batch = encode(&view, &memory, host, &config.labels, now_ms());
    debug!(
        processes = samples.len(),
        series = batch.timeseries.len(),
        "batch encoded"
    );
    publish_with_retry(writer, &batch, &config.retry).await
}

/// Runs the first cycle immediately, then one per `config.interval` until
/// Ctrl-C. A failed cycle is logged and dropped; the next tick starts fresh.
pub async fn run<W: RemoteWrite>(config: &AgentConfig, host: &HostIdentity, writer: &W) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    run_until(config, host, writer, ctrl_c).await;
}

/// Like [`run`], but stops when `shutdown` completes. The shutdown future is
/// polled for the whole lifetime of the loop, so a signal that lands mid-cycle
/// (e.g. during a retry sleep) abandons that cycle instead of being lost.
pub async fn run_until<W, F>(config: &AgentConfig, host: &HostIdentity, writer: &W, shutdown: F)
where
    W: RemoteWrite,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticker = interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("received Ctrl-C, shutting down");
                return;
            }
        }
        tokio::select! {
            res = collect_and_push(config, host, writer) => {
                if let Err(e) = res {
                    error!("cycle failed: {e}");
                }
            }
            _ = &mut shutdown => {
                info!("received Ctrl-C during a cycle, abandoning it and shutting down");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::config::RemoteConfig;
    use crate::error::PublishError;
    use crate::proto::WriteRequest;
    use crate::publisher::RetryPolicy;

    struct AlwaysFails {
        calls: AtomicU32,
    }

    impl RemoteWrite for AlwaysFails {
        async fn send(&self, _request: &WriteRequest) -> Result<(), PublishError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PublishError::Status {
                status: 503,
                body: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn shutdown_during_retry_sleep_stops_the_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            remote: RemoteConfig::new(url::Url::parse("http://127.0.0.1:9/write").unwrap()),
            interval: Duration::from_secs(3600),
            top_n: 5,
            retry: RetryPolicy {
                retries: 3,
                delay: Duration::from_secs(3600),
            },
            labels: BTreeMap::new(),
            proc_root: tmp.path().to_path_buf(),
            once: false,
        };
        let writer = AlwaysFails {
            calls: AtomicU32::new(0),
        };
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = tx.send(());
        });

        let stopped = tokio::time::timeout(
            Duration::from_secs(10),
            run_until(&config, &HostIdentity::default(), &writer, async {
                let _ = rx.await;
            }),
        )
        .await;

        assert!(stopped.is_ok(), "loop kept running after shutdown");
        // first attempt failed, the loop was parked in the retry sleep
        assert_eq!(writer.calls.load(Ordering::SeqCst), 1);
    }
}
