// Measurement (prober output) and Sample (one persisted log row)

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Value stored in every latency field of a failed measurement.
pub const FAILED_MS: f64 = -1.0;

/// Header row of the durable log. Column order is the row order of every record.
pub const LOG_HEADER: [&str; 6] = [
    "timestamp",
    "site",
    "connection_ms",
    "latency_ms",
    "response_ms",
    "page_load_ms",
];

/// Local wall-clock timestamp format, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Phase latencies of one fetch, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Time to establish the transport connection.
    pub connection_ms: f64,
    /// Time from request start to the first response byte (TTFB).
    pub latency_ms: f64,
    /// Time spent receiving the body after the first byte.
    pub response_ms: f64,
    /// Total time for the full transfer.
    pub page_load_ms: f64,
}

impl Measurement {
    /// Sentinel for a failed probe: all four fields are [`FAILED_MS`].
    pub const FAILED: Measurement = Measurement {
        connection_ms: FAILED_MS,
        latency_ms: FAILED_MS,
        response_ms: FAILED_MS,
        page_load_ms: FAILED_MS,
    };

    /// Builds a measurement from phase offsets relative to request start.
    /// `response_ms` is derived as `page_load_ms - latency_ms`, clamped at zero.
    pub fn from_phases(connection_ms: f64, latency_ms: f64, page_load_ms: f64) -> Self {
        Self {
            connection_ms: connection_ms.max(0.0),
            latency_ms: latency_ms.max(0.0),
            response_ms: (page_load_ms - latency_ms).max(0.0),
            page_load_ms: page_load_ms.max(0.0),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.page_load_ms < 0.0
    }
}

/// One time-stamped measurement of one target. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub target: String,
    pub connection_ms: f64,
    pub latency_ms: f64,
    pub response_ms: f64,
    pub page_load_ms: f64,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, target: impl Into<String>, m: Measurement) -> Self {
        Self {
            timestamp,
            target: target.into(),
            connection_ms: m.connection_ms,
            latency_ms: m.latency_ms,
            response_ms: m.response_ms,
            page_load_ms: m.page_load_ms,
        }
    }

    /// Failed samples carry the sentinel and are excluded from aggregation.
    pub fn is_failed(&self) -> bool {
        self.page_load_ms < 0.0
    }

    /// Log row in header order: timestamp, site, then four two-decimal numbers.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            self.target.clone(),
            format!("{:.2}", self.connection_ms),
            format!("{:.2}", self.latency_ms),
            format!("{:.2}", self.response_ms),
            format!("{:.2}", self.page_load_ms),
        ]
    }

    /// Parses one log row. Returns `None` for rows with a bad timestamp,
    /// a missing column, or a non-numeric latency field.
    pub fn from_record(record: &csv::StringRecord) -> Option<Self> {
        let timestamp =
            NaiveDateTime::parse_from_str(record.get(0)?.trim(), TIMESTAMP_FORMAT).ok()?;
        let target = record.get(1)?.to_string();
        let field = |i: usize| record.get(i)?.trim().parse::<f64>().ok();
        Some(Self {
            timestamp,
            target,
            connection_ms: field(2)?,
            latency_ms: field(3)?,
            response_ms: field(4)?,
            page_load_ms: field(5)?,
        })
    }
}
