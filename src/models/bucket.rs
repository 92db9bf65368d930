// Best/worst 15-minute buckets for one target. Derived on demand, never persisted.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Bucket label format used by the JSON surface.
const BUCKET_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketExtremes {
    /// Start of the bucket with the lowest mean page load.
    #[serde(serialize_with = "serialize_bucket")]
    pub best: Option<NaiveDateTime>,
    /// Start of the bucket with the highest mean page load.
    #[serde(serialize_with = "serialize_bucket")]
    pub worst: Option<NaiveDateTime>,
}

impl BucketExtremes {
    pub const NONE: BucketExtremes = BucketExtremes {
        best: None,
        worst: None,
    };
}

fn serialize_bucket<S: Serializer>(
    bucket: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bucket {
        Some(start) => serializer.collect_str(&start.format(BUCKET_LABEL_FORMAT)),
        None => serializer.serialize_none(),
    }
}
