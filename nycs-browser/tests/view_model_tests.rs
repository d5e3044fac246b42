//! Integration tests for the schools view model
//!
//! Tests cover:
//! - Join of schools with scores after a fetch cycle
//! - Loading flag lifecycle
//! - Concurrent (not sequential) dataset fetches
//! - Per-dataset failure capture and stale data retention
//! - Last-write-wins filtering under rapid query changes
//! - Idempotent repeated fetches
//! - Overlapping fetch cycles and queries typed during a fetch

use async_trait::async_trait;
use nycs_browser::{FetchError, SchoolRepository, SchoolsViewModel, SearchOptions};
use nycs_common::{School, ScoreRecord};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Test helper: repository returning canned results after an optional delay
struct FakeRepository {
    schools: Result<Vec<School>, FetchError>,
    scores: Result<Vec<ScoreRecord>, FetchError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeRepository {
    fn new(schools: Vec<School>, scores: Vec<ScoreRecord>) -> Self {
        Self {
            schools: Ok(schools),
            scores: Ok(scores),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing_schools(mut self, error: FetchError) -> Self {
        self.schools = Err(error);
        self
    }

    fn failing_scores(mut self, error: FetchError) -> Self {
        self.scores = Err(error);
        self
    }

    async fn pause(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl SchoolRepository for FakeRepository {
    async fn get_schools(&self) -> Result<Vec<School>, FetchError> {
        self.pause().await;
        self.schools.clone()
    }

    async fn get_scores(&self) -> Result<Vec<ScoreRecord>, FetchError> {
        self.pause().await;
        self.scores.clone()
    }
}

fn example_schools() -> Vec<School> {
    vec![School::new("1", "PS 1", "M"), School::new("2", "PS 2", "K")]
}

fn example_scores() -> Vec<ScoreRecord> {
    vec![ScoreRecord::new("1", "500", "510", "490")]
}

fn example_repository() -> Arc<FakeRepository> {
    Arc::new(FakeRepository::new(example_schools(), example_scores()))
}

fn ids(vm: &SchoolsViewModel) -> Vec<String> {
    vm.filtered_view()
        .iter()
        .map(|e| e.school.dbn.clone())
        .collect()
}

// =============================================================================
// Fetch cycle
// =============================================================================

#[tokio::test]
async fn test_fetch_joins_schools_with_scores() {
    let mut vm = SchoolsViewModel::new(SearchOptions::default());
    vm.fetch_data(example_repository()).await.unwrap();

    let view = vm.filtered_view();
    assert_eq!(view.len(), 2);
    assert_eq!(
        view.get("1").unwrap().scores,
        Some(ScoreRecord::new("1", "500", "510", "490"))
    );
    assert!(view.get("2").unwrap().scores.is_none());
    assert!(!vm.fetch_status().is_degraded());
    assert!(vm.fetch_status().completed_at.is_some());

    vm.on_search_criteria_changed("PS");
    vm.wait_for_filter().await;
    assert_eq!(ids(&vm), vec!["1", "2"]);

    vm.on_search_criteria_changed("K");
    vm.wait_for_filter().await;
    assert_eq!(ids(&vm), vec!["2"]);

    // Unfiltered join is untouched by searching
    assert_eq!(vm.joined_view().len(), 2);
}

#[tokio::test]
async fn test_loading_is_set_before_fetch_returns() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    let mut loading = vm.subscribe_loading();
    assert!(!*loading.borrow_and_update());

    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .with_delay(Duration::from_millis(50)),
    );
    let handle = vm.fetch_data(repo);

    assert!(vm.is_loading());
    assert!(loading.has_changed().unwrap());
    assert!(*loading.borrow_and_update());

    handle.await.unwrap();

    assert!(!vm.is_loading());
    assert!(!*loading.borrow_and_update());
}

#[tokio::test]
async fn test_datasets_fetched_concurrently() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .with_delay(Duration::from_millis(300)),
    );

    let shared: Arc<dyn SchoolRepository> = repo.clone();

    let start = Instant::now();
    vm.fetch_data(shared).await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    // Sequential fetches would take at least 600ms
    assert!(
        elapsed < Duration::from_millis(550),
        "fetch cycle took {:?}",
        elapsed
    );
}

#[tokio::test]
async fn test_scores_failure_still_publishes_schools() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .failing_scores(FetchError::Network("connection refused".to_string())),
    );

    vm.fetch_data(repo).await.unwrap();

    assert!(!vm.is_loading());
    let view = vm.filtered_view();
    assert_eq!(view.len(), 2);
    assert!(view.iter().all(|e| e.scores.is_none()));

    let status = vm.fetch_status();
    assert!(status.is_degraded());
    assert!(status.schools_error.is_none());
    assert_eq!(
        status.scores_error,
        Some(FetchError::Network("connection refused".to_string()))
    );
}

#[tokio::test]
async fn test_schools_failure_yields_empty_view() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .failing_schools(FetchError::Decode("expected value at line 1".to_string())),
    );

    vm.fetch_data(repo).await.unwrap();

    assert!(!vm.is_loading());
    assert!(vm.filtered_view().is_empty());
    assert!(matches!(
        vm.fetch_status().schools_error,
        Some(FetchError::Decode(_))
    ));
}

#[tokio::test]
async fn test_failed_refetch_keeps_previous_data() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    vm.fetch_data(example_repository()).await.unwrap();

    // Second cycle: schools fail, scores come back updated
    let repo = Arc::new(
        FakeRepository::new(vec![], vec![ScoreRecord::new("2", "600", "610", "620")])
            .failing_schools(FetchError::Api(500, "Internal Server Error".to_string())),
    );
    vm.fetch_data(repo).await.unwrap();

    let view = vm.filtered_view();
    assert_eq!(view.len(), 2, "previous schools retained");
    assert!(view.get("1").unwrap().scores.is_none());
    assert_eq!(view.get("2").unwrap().scores.as_ref().unwrap().math_avg, "610");
    assert!(vm.fetch_status().schools_error.is_some());
    assert!(vm.fetch_status().scores_error.is_none());
}

#[tokio::test]
async fn test_fetch_applies_current_query() {
    let mut vm = SchoolsViewModel::new(SearchOptions::default());

    vm.on_search_criteria_changed("K");
    vm.wait_for_filter().await;
    assert!(vm.filtered_view().is_empty());

    vm.fetch_data(example_repository()).await.unwrap();
    assert_eq!(ids(&vm), vec!["2"]);
}

#[tokio::test]
async fn test_repeated_fetch_is_idempotent() {
    let mut vm = SchoolsViewModel::new(SearchOptions::default());
    vm.on_search_criteria_changed("PS 1");
    vm.wait_for_filter().await;

    let repo: Arc<dyn SchoolRepository> = example_repository();
    vm.fetch_data(Arc::clone(&repo)).await.unwrap();
    let first = vm.filtered_view();

    vm.fetch_data(repo).await.unwrap();
    let second = vm.filtered_view();

    assert_eq!(*first, *second);
    assert_eq!(second.len(), 1);
}

fn named_repository(name: &str, delay: Duration) -> Arc<FakeRepository> {
    Arc::new(FakeRepository::new(vec![School::new("1", name, "M")], vec![]).with_delay(delay))
}

fn school_name(vm: &SchoolsViewModel) -> String {
    vm.joined_view().get("1").unwrap().school.school_name.clone()
}

#[tokio::test]
async fn test_loading_clears_after_filtered_view_is_published() {
    let vm = SchoolsViewModel::new(SearchOptions::default());
    let mut loading = vm.subscribe_loading();
    let filtered = vm.subscribe_filtered();

    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .with_delay(Duration::from_millis(20)),
    );
    let handle = vm.fetch_data(repo);

    loading.wait_for(|loading| !*loading).await.unwrap();
    assert_eq!(filtered.borrow().len(), 2);

    handle.await.unwrap();
}

#[tokio::test]
async fn test_joined_view_is_published() {
    let mut vm = SchoolsViewModel::new(SearchOptions::default());
    let mut joined = vm.subscribe_joined();
    assert!(joined.borrow_and_update().is_empty());

    vm.fetch_data(example_repository()).await.unwrap();
    assert!(joined.has_changed().unwrap());
    assert_eq!(joined.borrow_and_update().len(), 2);

    // Searching only touches the filtered view
    vm.on_search_criteria_changed("K");
    vm.wait_for_filter().await;
    assert!(!joined.has_changed().unwrap());
    assert_eq!(ids(&vm), vec!["2"]);
}

// =============================================================================
// Overlapping fetch cycles
// =============================================================================

#[tokio::test]
async fn test_slow_older_cycle_does_not_overwrite_newer() {
    let vm = SchoolsViewModel::new(SearchOptions::default());

    let older = vm.fetch_data(named_repository("old", Duration::from_millis(300)));
    let newer = vm.fetch_data(named_repository("new", Duration::from_millis(50)));

    newer.await.unwrap();
    assert!(!vm.is_loading());
    assert_eq!(school_name(&vm), "new");

    older.await.unwrap();
    assert!(!vm.is_loading());
    assert_eq!(school_name(&vm), "new");
    assert_eq!(
        vm.filtered_view().get("1").unwrap().school.school_name,
        "new"
    );
}

#[tokio::test]
async fn test_fast_older_cycle_keeps_loading_set() {
    let vm = SchoolsViewModel::new(SearchOptions::default());

    let older = vm.fetch_data(named_repository("old", Duration::from_millis(50)));
    let newer = vm.fetch_data(named_repository("new", Duration::from_millis(300)));

    older.await.unwrap();
    assert!(vm.is_loading(), "newer cycle still in flight");
    assert!(vm.joined_view().is_empty());
    assert_eq!(vm.fetch_status().completed_at, None);

    newer.await.unwrap();
    assert!(!vm.is_loading());
    assert_eq!(school_name(&vm), "new");
}

#[tokio::test]
async fn test_query_typed_during_fetch_applies_to_results() {
    let mut vm = SchoolsViewModel::new(SearchOptions::default());
    let repo = Arc::new(
        FakeRepository::new(example_schools(), example_scores())
            .with_delay(Duration::from_millis(100)),
    );

    let fetch = vm.fetch_data(repo);
    vm.on_search_criteria_changed("K");
    vm.wait_for_filter().await;

    // Nothing fetched yet
    assert!(vm.filtered_view().is_empty());
    assert!(vm.is_loading());

    fetch.await.unwrap();
    assert_eq!(vm.search_criteria(), "K");
    assert_eq!(ids(&vm), vec!["2"]);
}

// =============================================================================
// Search
// =============================================================================

fn large_dataset() -> (Vec<School>, Vec<ScoreRecord>) {
    let boroughs = ["M", "K", "Q", "X", "R"];
    let names = ["Manhattan Center", "Marble Hill", "Brooklyn Tech", "Queens Gateway"];

    let schools = (0..5000)
        .map(|i| {
            School::new(
                format!("{:05}", i),
                format!("{} {}", names[i % names.len()], i),
                boroughs[i % boroughs.len()],
            )
        })
        .collect();
    let scores = (0..5000)
        .step_by(3)
        .map(|i| ScoreRecord::new(format!("{:05}", i), "450", "460", "470"))
        .collect();

    (schools, scores)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rapid_queries_publish_last_one() {
    let (schools, scores) = large_dataset();
    let mut vm = SchoolsViewModel::with_data(schools, scores, false, SearchOptions::default());
    let mut filtered = vm.subscribe_filtered();

    for query in ["M", "Ma", "Man"] {
        vm.on_search_criteria_changed(query);
    }
    assert_eq!(vm.search_criteria(), "Man");
    vm.wait_for_filter().await;

    let view = Arc::clone(&filtered.borrow_and_update());
    assert_eq!(view.len(), 1250);
    assert!(view
        .iter()
        .all(|e| e.school.school_name.contains("Man") || e.school.boro.contains("Man")));

    // Superseded tasks must not publish afterwards
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!filtered.has_changed().unwrap());
    assert_eq!(*vm.filtered_view(), *view);
}

#[tokio::test]
async fn test_clearing_query_restores_full_view() {
    let (schools, scores) = large_dataset();
    let mut vm = SchoolsViewModel::with_data(schools, scores, false, SearchOptions::default());

    vm.on_search_criteria_changed("Queens");
    vm.wait_for_filter().await;
    assert_eq!(vm.filtered_view().len(), 1250);

    vm.on_search_criteria_changed("  ");
    vm.wait_for_filter().await;
    assert_eq!(*vm.filtered_view(), *vm.joined_view());
    assert_eq!(vm.filtered_view().len(), 5000);
}

#[tokio::test]
async fn test_debounced_queries_publish_last_one() {
    let mut vm = SchoolsViewModel::with_data(
        example_schools(),
        example_scores(),
        false,
        SearchOptions {
            debounce: Duration::from_millis(50),
            ..SearchOptions::default()
        },
    );
    let mut filtered = vm.subscribe_filtered();

    vm.on_search_criteria_changed("P");
    vm.on_search_criteria_changed("PS");
    vm.on_search_criteria_changed("PS 2");

    // Nothing lands before the debounce elapses
    assert!(!filtered.has_changed().unwrap());

    vm.wait_for_filter().await;
    assert!(filtered.has_changed().unwrap());
    assert_eq!(ids(&vm), vec!["2"]);
}

#[tokio::test]
async fn test_borough_name_matching_option() {
    let mut raw = SchoolsViewModel::with_data(
        example_schools(),
        example_scores(),
        false,
        SearchOptions::default(),
    );
    raw.on_search_criteria_changed("Manhattan");
    raw.wait_for_filter().await;
    assert!(raw.filtered_view().is_empty());

    let mut expanded = SchoolsViewModel::with_data(
        example_schools(),
        example_scores(),
        false,
        SearchOptions {
            match_borough_name: true,
            ..SearchOptions::default()
        },
    );
    expanded.on_search_criteria_changed("Manhattan");
    expanded.wait_for_filter().await;
    assert_eq!(ids(&expanded), vec!["1"]);
}
