// Bucket aggregation tests: window, failed-sample exclusion, means, tie-breaks

mod common;

use chrono::{NaiveDateTime, TimeDelta};
use common::{at, failed, sample};
use loadwatch::aggregator::best_worst_buckets;
use loadwatch::models::BucketExtremes;

#[test]
fn best_and_worst_across_two_buckets() {
    let samples = vec![
        sample(at(9, 5, 0), "A", 150.0),
        sample(at(9, 20, 0), "A", 300.0),
    ];
    let out = best_worst_buckets(&samples, at(10, 0, 0));
    assert_eq!(
        out["A"],
        BucketExtremes {
            best: Some(at(9, 0, 0)),
            worst: Some(at(9, 15, 0)),
        }
    );
}

#[test]
fn bucket_mean_uses_all_samples_in_bucket() {
    // 09:00 bucket: mean(100, 500) = 300; 09:15 bucket: 250
    let samples = vec![
        sample(at(9, 1, 0), "A", 100.0),
        sample(at(9, 14, 59), "A", 500.0),
        sample(at(9, 16, 0), "A", 250.0),
    ];
    let out = best_worst_buckets(&samples, at(12, 0, 0));
    assert_eq!(out["A"].best, Some(at(9, 15, 0)));
    assert_eq!(out["A"].worst, Some(at(9, 0, 0)));
}

#[test]
fn failed_samples_are_excluded() {
    let samples = vec![
        sample(at(9, 0, 0), "A", 200.0),
        failed(at(9, 15, 0), "A"),
        sample(at(9, 30, 0), "A", 100.0),
    ];
    let out = best_worst_buckets(&samples, at(10, 0, 0));
    assert_eq!(out["A"].best, Some(at(9, 30, 0)));
    assert_eq!(out["A"].worst, Some(at(9, 0, 0)));
}

#[test]
fn only_failed_or_stale_samples_yield_none() {
    let now = at(12, 0, 0);
    let samples = vec![
        failed(at(11, 0, 0), "down"),
        sample(now - TimeDelta::hours(25), "stale", 100.0),
    ];
    let out = best_worst_buckets(&samples, now);
    assert_eq!(out["down"], BucketExtremes::NONE);
    assert_eq!(out["stale"], BucketExtremes::NONE);
}

#[test]
fn samples_older_than_24h_are_ignored() {
    let now = at(12, 0, 0);
    let samples = vec![
        sample(now - TimeDelta::hours(30), "A", 5_000.0),
        sample(now - TimeDelta::hours(2), "A", 100.0),
        sample(now - TimeDelta::hours(1), "A", 120.0),
    ];
    let out = best_worst_buckets(&samples, now);
    assert_eq!(out["A"].best, Some(at(10, 0, 0)));
    assert_eq!(out["A"].worst, Some(at(11, 0, 0)));
}

#[test]
fn ties_resolve_to_earliest_bucket() {
    let samples = vec![
        sample(at(9, 45, 0), "A", 200.0),
        sample(at(9, 0, 0), "A", 100.0),
        sample(at(9, 30, 0), "A", 100.0),
        sample(at(9, 15, 0), "A", 200.0),
    ];
    let out = best_worst_buckets(&samples, at(10, 0, 0));
    assert_eq!(out["A"].best, Some(at(9, 0, 0)));
    assert_eq!(out["A"].worst, Some(at(9, 15, 0)));
}

#[test]
fn single_bucket_is_both_best_and_worst() {
    let samples = vec![sample(at(9, 3, 0), "A", 80.0)];
    let out = best_worst_buckets(&samples, at(9, 10, 0));
    assert_eq!(out["A"].best, Some(at(9, 0, 0)));
    assert_eq!(out["A"].worst, Some(at(9, 0, 0)));
}

#[test]
fn targets_are_aggregated_independently() {
    let samples = vec![
        sample(at(8, 0, 0), "A", 100.0),
        sample(at(8, 0, 0), "B", 900.0),
        sample(at(8, 30, 0), "A", 400.0),
        sample(at(8, 30, 0), "B", 10.0),
    ];
    let out = best_worst_buckets(&samples, at(9, 0, 0));
    assert_eq!(out["A"].best, Some(at(8, 0, 0)));
    assert_eq!(out["A"].worst, Some(at(8, 30, 0)));
    assert_eq!(out["B"].best, Some(at(8, 30, 0)));
    assert_eq!(out["B"].worst, Some(at(8, 0, 0)));
}

#[test]
fn best_mean_never_exceeds_worst_mean() {
    let loads = [310.0, 95.5, 120.25, 640.0, 95.5, 77.0, 410.0, 300.0];
    let samples: Vec<_> = loads
        .iter()
        .enumerate()
        .map(|(i, load)| sample(at(1, 0, 0) + TimeDelta::minutes(7 * i as i64), "A", *load))
        .collect();
    let now = at(3, 0, 0);
    let out = best_worst_buckets(&samples, now);

    let mean_of = |start: NaiveDateTime| {
        let in_bucket: Vec<f64> = samples
            .iter()
            .filter(|s| loadwatch::aggregator::floor_to_bucket(s.timestamp) == start)
            .map(|s| s.page_load_ms)
            .collect();
        in_bucket.iter().sum::<f64>() / in_bucket.len() as f64
    };
    let best = mean_of(out["A"].best.unwrap());
    let worst = mean_of(out["A"].worst.unwrap());
    assert!(best <= worst);

    let all_means: Vec<f64> = samples
        .iter()
        .map(|s| mean_of(loadwatch::aggregator::floor_to_bucket(s.timestamp)))
        .collect();
    let min = all_means.iter().copied().fold(f64::INFINITY, f64::min);
    let max = all_means.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best, min);
    assert_eq!(worst, max);
}

#[test]
fn empty_input_is_empty_output() {
    assert!(best_worst_buckets(&[], at(0, 0, 0)).is_empty());
}
