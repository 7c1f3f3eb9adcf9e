//! procpush_agent: samples `/proc`, ranks processes by memory and CPU, and
//! pushes the result to a Prometheus remote-write endpoint.

pub mod config;
pub mod encoder;
pub mod error;
pub mod host;
pub mod procfs;
pub mod proto;
pub mod publisher;
pub mod ranker;
pub mod sampler;
pub mod scanner;
pub mod types;
