//! Remote-write delivery: one-shot HTTP transport plus the bounded retry policy.

use std::time::Duration;

use bytes::Bytes;
use prost::Message;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use tracing::{info, warn};

use crate::config::RemoteConfig;
use crate::error::{CycleError, PublishError};
use crate::proto::WriteRequest;

/// Per-attempt deadline for the outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const REMOTE_WRITE_VERSION: &str = "0.1.0";

/// One delivery attempt of an encoded batch.
#[allow(async_fn_in_trait)]
pub trait RemoteWrite {
    async fn send(&self, request: &WriteRequest) -> Result<(), PublishError>;
}

/// Protobuf-encodes and snappy-compresses a write request (raw block format).
pub fn encode_body(request: &WriteRequest) -> Result<Bytes, PublishError> {
    let raw = request.encode_to_vec();
    let compressed = snap::raw::Encoder::new().compress_vec(&raw)?;
    Ok(Bytes::from(compressed))
}

pub struct HttpRemoteWriter {
    client: reqwest::Client,
    remote: RemoteConfig,
}

impl HttpRemoteWriter {
    pub fn new(remote: RemoteConfig) -> Result<Self, PublishError> {
        if remote.insecure_skip_verify {
            warn!("TLS certificate verification is disabled (insecure)");
        }
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(remote.insecure_skip_verify)
            .build()
            .map_err(|e| PublishError::Client(e.to_string()))?;
        Ok(Self { client, remote })
    }
}

impl RemoteWrite for HttpRemoteWriter {
    async fn send(&self, request: &WriteRequest) -> Result<(), PublishError> {
        let body = encode_body(request)?;
        let mut req = self
            .client
            .post(self.remote.url.clone())
            .header(CONTENT_ENCODING, "snappy")
            .header(CONTENT_TYPE, "application/x-protobuf")
            .header("X-Prometheus-Remote-Write-Version", REMOTE_WRITE_VERSION)
            .body(body);
        if let Some((user, pass)) = self.remote.basic_auth() {
            req = req.basic_auth(user, Some(pass));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

/// Retry count and fixed delay between attempts. `retries = 1` means at most
/// two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Attempting { attempt: u32 },
    WaitingToRetry { next_attempt: u32 },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

/// What the driver should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    RetryAfter(Duration),
    GiveUp,
}

/// The retry policy as a resumable state machine, so a caller with its own
/// timer can drive it without blocking. Calls made in the wrong state leave it
/// unchanged.
#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: RetryPolicy,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Idle,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Idle -> Attempting(1). Returns the attempt number now in flight.
    pub fn start(&mut self) -> Option<u32> {
        match self.state {
            RetryState::Idle => {
                self.state = RetryState::Attempting { attempt: 1 };
                Some(1)
            }
            _ => None,
        }
    }

    pub fn record_success(&mut self) {
        if let RetryState::Attempting { attempt } = self.state {
            self.state = RetryState::Succeeded { attempts: attempt };
        }
    }

    pub fn record_failure(&mut self) -> RetryStep {
        match self.state {
            RetryState::Attempting { attempt } if attempt < self.policy.max_attempts() => {
                self.state = RetryState::WaitingToRetry {
                    next_attempt: attempt + 1,
                };
                RetryStep::RetryAfter(self.policy.delay)
            }
            RetryState::Attempting { attempt } => {
                self.state = RetryState::Failed { attempts: attempt };
                RetryStep::GiveUp
            }
            _ => RetryStep::GiveUp,
        }
    }

    /// WaitingToRetry -> Attempting. Call once the delay has elapsed.
    pub fn resume(&mut self) -> Option<u32> {
        match self.state {
            RetryState::WaitingToRetry { next_attempt } => {
                self.state = RetryState::Attempting {
                    attempt: next_attempt,
                };
                Some(next_attempt)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub attempts: u32,
    pub series: usize,
}

/// Sends `request` until it succeeds or the policy is exhausted, sleeping the
/// fixed delay between attempts. The caller's cycle is held for the whole
/// sequence. On exhaustion the last failure is returned and the batch dropped.
pub async fn publish_with_retry<W: RemoteWrite>(
    writer: &W,
    request: &WriteRequest,
    policy: &RetryPolicy,
) -> Result<PublishReport, CycleError> {
    let series = request.timeseries.len();
    let mut machine = RetryMachine::new(*policy);
    let mut attempt = machine.start().unwrap_or(1);

    loop {
        if attempt > 1 {
            info!(attempt, "retrying push");
        }
        match writer.send(request).await {
            Ok(()) => {
                machine.record_success();
                info!(series, attempt, "pushed time series");
                return Ok(PublishReport {
                    attempts: attempt,
                    series,
                });
            }
            Err(e) => {
                warn!(attempt, error = %e, "push failed");
                match machine.record_failure() {
                    RetryStep::RetryAfter(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt = machine.resume().unwrap_or(attempt + 1);
                    }
                    RetryStep::GiveUp => {
                        return Err(CycleError::Publish {
                            attempts: attempt,
                            last: e,
                        });
                    }
                }
            }
        }
    }
}
