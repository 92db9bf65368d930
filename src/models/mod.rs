// Domain models: probe measurements, persisted samples, derived buckets

mod bucket;
mod sample;

pub use bucket::BucketExtremes;
pub use sample::{FAILED_MS, LOG_HEADER, Measurement, Sample, TIMESTAMP_FORMAT};
