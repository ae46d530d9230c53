//! Behavior-driven tests for the snapshot cache
//!
//! These tests verify HOW the cache behaves across a build: what readers see
//! before and after it, how failures and cancellation surface, and that
//! concurrent callers share a single build.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dmda_core::{
    BuildState, FixtureSource, QuerySpec, Record, SnapshotCache, SourceError, SourceErrorKind,
    WarmupError,
};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

fn numbered_records(count: i64) -> Vec<Record> {
    (0..count)
        .map(|n| Record {
            work_year: Some(2020 + n % 4),
            job_title: Some(format!("Role {n}")),
            salary_in_usd: Some(50_000 + n),
            ..Record::default()
        })
        .collect()
}

fn cache_over(source: &FixtureSource) -> SnapshotCache {
    SnapshotCache::new(Arc::new(source.clone()), QuerySpec::default())
}

// =============================================================================
// Snapshot Cache: Successful Builds
// =============================================================================

#[tokio::test]
async fn when_build_succeeds_snapshot_holds_every_row_in_source_order() {
    // Given: A source producing 25 rows
    let records = numbered_records(25);
    let source = FixtureSource::new(records.clone());
    let cache = cache_over(&source);

    // When: Warmup completes
    let summary = cache
        .warmup(CancellationToken::new())
        .await
        .expect("build should succeed");

    // Then: The snapshot is exactly the source rows, in order
    assert_eq!(summary.rows, 25);
    assert_eq!(cache.snapshot().await.as_slice(), records.as_slice());
    assert_eq!(cache.status().as_str(), "ready");
}

#[tokio::test]
async fn when_snapshot_is_read_twice_after_build_both_reads_match() {
    // Given: A warmed cache
    let source = FixtureSource::new(numbered_records(4));
    let cache = cache_over(&source);
    cache
        .warmup(CancellationToken::new())
        .await
        .expect("build should succeed");

    // When: The snapshot is read repeatedly with no build in between
    let first = cache.snapshot().await;
    let second = cache.snapshot().await;

    // Then: Both reads are identical
    assert_eq!(first, second);
}

#[tokio::test]
async fn when_three_known_records_are_served_snapshot_matches_field_for_field() {
    // Given: Three fully populated records
    let records = vec![
        Record {
            work_year: Some(2023),
            experience_level: Some(String::from("SE")),
            employment_type: Some(String::from("FT")),
            job_title: Some(String::from("Principal Data Scientist")),
            salary: Some(80_000),
            salary_currency: Some(String::from("EUR")),
            salary_in_usd: Some(85_847),
            employee_residence: Some(String::from("ES")),
            remote_ratio: Some(100),
            company_location: Some(String::from("ES")),
            company_size: Some(String::from("L")),
            title_tokens: Some(vec![
                String::from("principal"),
                String::from("data"),
                String::from("scientist"),
            ]),
            title_role: Some(String::from("scientist")),
            title_domain: Some(String::from("data")),
            title_honorific: Some(String::from("principal")),
        },
        Record {
            work_year: Some(2022),
            experience_level: Some(String::from("MI")),
            job_title: Some(String::from("ML Engineer")),
            salary_in_usd: Some(30_000),
            company_size: Some(String::from("S")),
            ..Record::default()
        },
        Record {
            work_year: Some(2021),
            job_title: Some(String::from("Data Analyst")),
            remote_ratio: Some(0),
            ..Record::default()
        },
    ];
    let source = FixtureSource::new(records.clone());
    let cache = cache_over(&source);

    // When: The cache is warmed and read
    cache
        .warmup(CancellationToken::new())
        .await
        .expect("build should succeed");
    let snapshot = cache.snapshot().await;

    // Then: Every field survives unchanged
    assert_eq!(snapshot.len(), 3);
    for (served, expected) in snapshot.iter().zip(&records) {
        assert_eq!(served, expected);
    }
}

#[tokio::test]
async fn when_source_is_empty_build_is_ready_with_zero_rows() {
    // Given: A source with no rows
    let source = FixtureSource::new(Vec::new());
    let cache = cache_over(&source);

    // When: Warmup completes
    let summary = cache
        .warmup(CancellationToken::new())
        .await
        .expect("empty build should succeed");

    // Then: The cache is ready and empty
    assert_eq!(summary.rows, 0);
    assert!(cache.snapshot().await.is_empty());
    assert!(matches!(cache.status(), BuildState::Ready(_)));
}

// =============================================================================
// Snapshot Cache: Reads During a Build
// =============================================================================

#[tokio::test]
async fn when_build_is_running_snapshot_returns_empty_without_waiting() {
    // Given: A slow source that takes well over a second to drain
    let source =
        FixtureSource::new(numbered_records(40)).with_row_delay(Duration::from_millis(50));
    let cache = cache_over(&source);
    let warming = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.warmup(CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(120)).await;

    // When: A reader asks for the snapshot mid-build
    let started = Instant::now();
    let snapshot = cache.snapshot().await;

    // Then: It gets an empty sequence immediately
    assert!(snapshot.is_empty(), "partial rows must not be visible");
    assert!(started.elapsed() < Duration::from_millis(100));
    assert_eq!(cache.status(), BuildState::Building);

    warming.abort();
}

// =============================================================================
// Snapshot Cache: Failures
// =============================================================================

#[tokio::test]
async fn when_source_fails_after_some_rows_warmup_reports_error_and_snapshot_stays_empty() {
    // Given: A source that fails after yielding 3 of 10 rows
    let source = FixtureSource::new(numbered_records(10)).fail_after(
        3,
        SourceError::row_decode("row 3: column 'salary' is not an integer: 'n/a'"),
    );
    let cache = cache_over(&source);

    // When: Warmup runs
    let outcome = cache.warmup(CancellationToken::new()).await;

    // Then: The error is surfaced and no partial rows are published
    let error = outcome.expect_err("build should fail");
    match &error {
        WarmupError::Build(source_error) => {
            assert_eq!(source_error.kind(), SourceErrorKind::RowDecode);
            assert!(source_error.message().starts_with("row 3:"));
        }
        other => panic!("expected a build failure, got {other:?}"),
    }
    assert!(cache.snapshot().await.is_empty());
    assert_eq!(cache.status().as_str(), "failed");
}

#[tokio::test]
async fn when_query_is_rejected_warmup_returns_that_exact_error() {
    // Given: A source whose query fails immediately
    let rejection = SourceError::query_execution("Not found: Table holy-diver-297719:x.y");
    let source = FixtureSource::failing_query(rejection.clone());
    let cache = cache_over(&source);

    // When: Warmup runs
    let outcome = cache.warmup(CancellationToken::new()).await;

    // Then: The same error comes back and nothing is cached
    assert_eq!(outcome, Err(WarmupError::Build(rejection)));
    assert!(cache.snapshot().await.is_empty());
}

#[tokio::test]
async fn when_build_has_failed_later_warmups_report_the_same_failure_without_rebuilding() {
    // Given: A cache whose build failed
    let source = FixtureSource::failing_query(SourceError::connection("connection refused"));
    let cache = cache_over(&source);
    let first = cache.warmup(CancellationToken::new()).await;

    // When: Warmup is requested again
    let second = cache.warmup(CancellationToken::new()).await;

    // Then: The stored failure is returned and no new query is issued
    assert_eq!(first, second);
    assert_eq!(source.queries_issued(), 1);
}

// =============================================================================
// Snapshot Cache: Cancellation and Timeouts
// =============================================================================

#[tokio::test]
async fn when_triggering_caller_cancels_build_stops_pulling_rows() {
    // Given: A slow source and a caller-owned cancellation token
    let source =
        FixtureSource::new(numbered_records(100)).with_row_delay(Duration::from_millis(10));
    let cache = cache_over(&source);
    let cancel = CancellationToken::new();
    let warming = {
        let cache = cache.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { cache.warmup(cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(45)).await;

    // When: The caller cancels
    cancel.cancel();
    let outcome = warming.await.expect("warmup task should not panic");

    // Then: Warmup reports cancellation and the fetch stops promptly
    assert_eq!(outcome, Err(WarmupError::Cancelled));
    let settled = cache.warmup(CancellationToken::new()).await;
    let error = settled.expect_err("build should end cancelled");
    assert!(error.is_cancellation());

    let pulled = source.rows_pulled();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(source.rows_pulled(), pulled, "rows kept flowing after cancel");
    assert!(pulled < 100);
    assert!(cache.snapshot().await.is_empty());
}

#[tokio::test]
async fn when_joining_caller_cancels_only_its_wait_ends() {
    // Given: A build started by one caller, joined by a second
    let source =
        FixtureSource::new(numbered_records(10)).with_row_delay(Duration::from_millis(10));
    let cache = cache_over(&source);
    let owner = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.warmup(CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(15)).await;
    let joiner_cancel = CancellationToken::new();
    let joiner = {
        let cache = cache.clone();
        let cancel = joiner_cancel.clone();
        tokio::spawn(async move { cache.warmup(cancel).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    // When: The joining caller cancels
    joiner_cancel.cancel();

    // Then: Only the joiner stops waiting; the build still completes
    let joined = joiner.await.expect("joiner should not panic");
    assert_eq!(joined, Err(WarmupError::Cancelled));
    let owned = owner.await.expect("owner should not panic");
    assert_eq!(owned.map(|s| s.rows), Ok(10));
    assert_eq!(cache.snapshot().await.len(), 10);
}

#[tokio::test]
async fn when_build_outlasts_timeout_warmup_reports_timed_out() {
    // Given: A source far slower than the timeout
    let source =
        FixtureSource::new(numbered_records(100)).with_row_delay(Duration::from_millis(20));
    let cache = cache_over(&source);

    // When: Warmup is bounded to 50ms
    let outcome = cache.warmup_within(Duration::from_millis(50)).await;

    // Then: It times out, and the cache holds no partial rows
    assert_eq!(outcome, Err(WarmupError::TimedOut(Duration::from_millis(50))));
    assert!(cache.snapshot().await.is_empty());
}

// =============================================================================
// Snapshot Cache: Concurrency
// =============================================================================

#[tokio::test]
async fn when_many_callers_warm_up_concurrently_one_build_serves_them_all() {
    // Given: A moderately slow source and eight concurrent callers
    let source =
        FixtureSource::new(numbered_records(12)).with_row_delay(Duration::from_millis(2));
    let cache = cache_over(&source);

    // When: They all call warmup at once
    let outcomes = join_all((0..8).map(|_| {
        let cache = cache.clone();
        async move { cache.warmup(CancellationToken::new()).await }
    }))
    .await;

    // Then: One query ran, and every caller saw the same result
    assert_eq!(source.queries_issued(), 1);
    let first = outcomes[0].clone().expect("build should succeed");
    for outcome in outcomes {
        assert_eq!(outcome, Ok(first));
    }
    assert_eq!(cache.snapshot().await.len(), 12);
}

#[tokio::test]
async fn when_readers_poll_during_build_they_see_either_nothing_or_everything() {
    // Given: A build in progress and a reader polling in a loop
    let source =
        FixtureSource::new(numbered_records(20)).with_row_delay(Duration::from_millis(1));
    let cache = cache_over(&source);
    let warming = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.warmup(CancellationToken::new()).await })
    };

    // When: Snapshots are taken until the build finishes
    let mut observed = Vec::new();
    while !cache.status().is_terminal() {
        observed.push(cache.snapshot().await.len());
        tokio::task::yield_now().await;
    }
    warming
        .await
        .expect("warmup task should not panic")
        .expect("build should succeed");
    observed.push(cache.snapshot().await.len());

    // Then: No reader ever saw a partial result
    assert!(observed.iter().all(|len| *len == 0 || *len == 20), "{observed:?}");
    assert_eq!(observed.last(), Some(&20));
}
