// Shared test helpers

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use loadwatch::collector::Collector;
use loadwatch::models::{Measurement, Sample};
use loadwatch::monitor::Monitor;
use loadwatch::prober::Probe;
use loadwatch::sample_store::SampleStore;
use loadwatch::scheduler::Scheduler;
use loadwatch::targets::TargetSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 1)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

pub fn sample(ts: NaiveDateTime, target: &str, page_load_ms: f64) -> Sample {
    Sample::new(
        ts,
        target,
        Measurement::from_phases(page_load_ms / 4.0, page_load_ms / 2.0, page_load_ms),
    )
}

pub fn failed(ts: NaiveDateTime, target: &str) -> Sample {
    Sample::new(ts, target, Measurement::FAILED)
}

/// Returns a fixed measurement and records every target it was asked about.
#[derive(Clone, Default)]
pub struct RecordingProber {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub failing: Vec<String>,
    /// Real time each measurement takes.
    pub delay: Option<Duration>,
}

impl RecordingProber {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Probe for RecordingProber {
    async fn measure(&self, target: &str) -> Measurement {
        self.calls.lock().unwrap().push(target.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.iter().any(|t| t == target) {
            Measurement::FAILED
        } else {
            Measurement::from_phases(10.0, 50.0, 150.0)
        }
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SampleStore>,
    pub prober: RecordingProber,
    pub monitor: Arc<Monitor<RecordingProber>>,
}

pub async fn harness(targets: &[&str]) -> Harness {
    harness_with(targets, RecordingProber::default()).await
}

pub async fn harness_with(targets: &[&str], prober: RecordingProber) -> Harness {
    harness_in(targets, prober, Tz::UTC).await
}

pub async fn harness_in(targets: &[&str], prober: RecordingProber, tz: Tz) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SampleStore::new(dir.path().join("load_time_log.csv")));
    store.init().await.unwrap();
    let monitor = Arc::new(Monitor::new(
        TargetSet::new(targets.iter().copied()),
        Arc::new(Scheduler::new(10)),
        Collector::new(prober.clone(), store.clone(), tz),
    ));
    Harness {
        dir,
        store,
        prober,
        monitor,
    }
}
