//! Remote-write protobuf messages generated by `build.rs` from `proto/remote.proto`.

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/prometheus.rs"));
}

pub use pb::{Label, Sample, TimeSeries, WriteRequest};
