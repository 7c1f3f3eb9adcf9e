//! Command-line arguments and the immutable agent configuration built from them.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use url::Url;

use crate::error::ConfigError;
use crate::publisher::RetryPolicy;
use crate::scanner::DEFAULT_PROC_ROOT;

/// Pushes the top processes by memory and CPU to a Prometheus remote-write endpoint.
#[derive(Debug, Parser)]
#[command(name = "procpush_agent", version)]
pub struct Args {
    /// Remote write endpoint URL (required).
    #[arg(long = "remote.url", value_name = "URL", env = "PROCPUSH_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Username for basic auth.
    #[arg(long = "remote.username", value_name = "USER")]
    pub remote_username: Option<String>,

    /// Password for basic auth.
    #[arg(
        long = "remote.password",
        value_name = "PASSWORD",
        env = "PROCPUSH_REMOTE_PASSWORD",
        hide_env_values = true
    )]
    pub remote_password: Option<String>,

    /// Scrape and push interval, Go duration syntax (e.g. "60s", "1m30s", "1.5s", "500ms").
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub interval: Duration,

    /// Number of top processes to report per ranking.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Number of retries on push failure.
    #[arg(long, default_value_t = 1)]
    pub retry: u32,

    /// Delay between retries, same syntax as --interval.
    #[arg(long = "retry.delay", default_value = "5s", value_parser = parse_duration)]
    pub retry_delay: Duration,

    /// Skip TLS certificate verification (insecure, use only for testing).
    #[arg(long = "insecure-skip-verify")]
    pub insecure_skip_verify: bool,

    /// Static label in key=value form, attached to every series. Repeatable;
    /// the last value wins for a duplicate key.
    #[arg(long = "label", value_name = "KEY=VALUE", value_parser = parse_label)]
    pub labels: Vec<(String, String)>,

    /// Path to the /proc filesystem.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PROC_ROOT)]
    pub proc_root: PathBuf,

    /// Run a single cycle and exit; the exit status reflects its outcome.
    #[arg(long)]
    pub once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: Url,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure_skip_verify: bool,
}

impl RemoteConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            username: None,
            password: None,
            insecure_skip_verify: false,
        }
    }

    /// Credentials, only when both parts are non-empty.
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => Some((user, pass)),
            _ => None,
        }
    }
}

/// Everything a cycle needs, fixed at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub remote: RemoteConfig,
    pub interval: Duration,
    pub top_n: usize,
    pub retry: RetryPolicy,
    pub labels: BTreeMap<String, String>,
    pub proc_root: PathBuf,
    pub once: bool,
}

impl AgentConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let raw_url = args
            .remote_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ConfigError::MissingRemoteUrl)?;
        let url = parse_remote_url(raw_url)?;

        if args.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(Self {
            remote: RemoteConfig {
                url,
                username: args.remote_username.clone(),
                password: args.remote_password.clone(),
                insecure_skip_verify: args.insecure_skip_verify,
            },
            interval: args.interval,
            top_n: args.top,
            retry: RetryPolicy {
                retries: args.retry,
                delay: args.retry_delay,
            },
            labels: args.labels.iter().cloned().collect(),
            proc_root: args.proc_root.clone(),
            once: args.once,
        })
    }

    /// `k=v,k=v` rendering of the static labels for the startup log.
    pub fn labels_display(&self) -> String {
        self.labels
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn parse_remote_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidRemoteUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Parses `key=value`; both sides are trimmed and the key must be non-empty.
pub fn parse_label(s: &str) -> Result<(String, String), ConfigError> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedLabel(s.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::EmptyLabelKey(s.to_string()));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Parses a Go-style duration: one or more decimal numbers, each with a unit
/// (`ns`, `us`/`µs`, `ms`, `s`, `m`, `h`), e.g. "500ms", "1.5s", "1m30s" or
/// "2h45m". A bare integer is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidDuration(s.to_string());

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(invalid()),
        };
        let nanos = scale_decimal(number, unit_nanos).ok_or_else(invalid)?;
        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
        rest = next;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

/// `number * unit` in nanoseconds, where `number` is `digits[.digits]`.
/// Fraction digits below nanosecond precision are dropped.
fn scale_decimal(number: &str, unit_nanos: u128) -> Option<u128> {
    let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let whole: u128 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;
    if !frac_part.is_empty() {
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let frac_part = &frac_part[..frac_part.len().min(18)];
        let frac: u128 = frac_part.parse().ok()?;
        let scale = 10u128.pow(frac_part.len() as u32);
        nanos = nanos.checked_add(frac * unit_nanos / scale)?;
    }
    Some(nanos)
}
