//! Shared fixtures: an in-process remote-write endpoint and a fake /proc tree.
#![allow(dead_code)]

use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use prost::Message;

use procpush_agent::proto::WriteRequest;

#[derive(Debug, Clone)]
pub struct Received {
    pub headers: HeaderMap,
    pub request: WriteRequest,
}

#[derive(Default)]
pub struct Endpoint {
    /// Number of leading requests answered with 500; `u32::MAX` fails forever.
    fail_first: u32,
    attempts: AtomicU32,
    received: Mutex<Vec<Received>>,
}

impl Endpoint {
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().unwrap().clone()
    }
}

async fn ingest(State(ep): State<Arc<Endpoint>>, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    let n = ep.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    if n <= ep.fail_first {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("overloaded ({n})"));
    }
    let raw = snap::raw::Decoder::new()
        .decompress_vec(&body)
        .expect("snappy body");
    let request = WriteRequest::decode(raw.as_slice()).expect("protobuf body");
    ep.received.lock().unwrap().push(Received { headers, request });
    (StatusCode::NO_CONTENT, String::new())
}

/// Starts the endpoint on an ephemeral port and returns its write URL.
pub async fn spawn_endpoint(fail_first: u32) -> (Arc<Endpoint>, url::Url) {
    let ep = Arc::new(Endpoint {
        fail_first,
        ..Endpoint::default()
    });
    let app = Router::new()
        .route("/api/v1/write", post(ingest))
        .with_state(ep.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let url = url::Url::parse(&format!("http://{addr}/api/v1/write")).unwrap();
    (ep, url)
}

/// Writes the per-process records the agent reads.
pub fn add_process(root: &Path, pid: u32, comm: &str, cmdline: &[u8], rss_kib: u64, stat_tail: (u64, u64, u64)) {
    let (utime, stime, starttime) = stat_tail;
    let dir = root.join(pid.to_string());
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("comm"), format!("{comm}\n")).unwrap();
    fs::write(dir.join("cmdline"), cmdline).unwrap();
    fs::write(dir.join("status"), format!("Name:\t{comm}\nState:\tS (sleeping)\nVmRSS:\t{rss_kib} kB\n")).unwrap();
    fs::write(
        dir.join("stat"),
        format!("{pid} ({comm}) S 1 {pid} {pid} 0 -1 4194560 100 0 0 0 {utime} {stime} 0 0 20 0 1 0 {starttime} 1000000 200 0\n"),
    )
    .unwrap();
}

/// System-wide records: 1 GiB total memory, 1000 s of uptime.
pub fn add_system(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("meminfo"),
        "MemTotal:        1048576 kB\nMemFree:          100000 kB\nMemAvailable:     524288 kB\nBuffers:           10000 kB\nCached:           200000 kB\n",
    )
    .unwrap();
    fs::write(root.join("uptime"), "1000.75 3000.10\n").unwrap();
    fs::write(root.join("stat"), "cpu  100 0 50 1000 0 0 0 0 0 0\ncpu0 100 0 50 1000 0 0 0 0 0 0\n").unwrap();
}
