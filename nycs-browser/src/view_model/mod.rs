//! Schools view model
//!
//! Owns the view state the presentation layer renders:
//! - `loading`: a fetch cycle is in progress
//! - `joined`: the unfiltered join of the last fetched datasets
//! - `filtered`: the joined view restricted to the current search query
//! - `fetch_status`: per-dataset outcome of the last fetch cycle
//!
//! Each is published through a `tokio::sync::watch` channel; subscribers see
//! the current value and are notified on change.
//!
//! **Fetch cycle:** both datasets are requested concurrently and captured
//! individually, so one failing never discards the other. A failed dataset
//! keeps its previous snapshot. Cycles may overlap; only the most recently
//! started one may replace the snapshot or clear `loading`, the results of
//! older cycles are dropped when they finish.
//!
//! **Search:** every query change cancels the in-flight filter task and
//! starts a new one. Each filter request gets an epoch number; a result is
//! only published if its epoch is still current when the publish happens,
//! checked inside the watch channel's write so a superseded result can never
//! overwrite a newer one.
//!
//! All operations that spawn work must be called from within a tokio runtime.

pub mod filter;
pub mod join;

pub use filter::{filter_view, SearchOptions};
pub use join::{JoinedEntry, JoinedView};

use crate::services::{FetchError, SchoolRepository};
use chrono::{DateTime, Utc};
use nycs_common::{School, ScoreRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of the most recent fetch cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchStatus {
    /// Set when the schools request failed; previous schools are kept
    pub schools_error: Option<FetchError>,
    /// Set when the scores request failed; previous scores are kept
    pub scores_error: Option<FetchError>,
    /// When the last cycle finished, `None` before the first one
    pub completed_at: Option<DateTime<Utc>>,
}

impl FetchStatus {
    /// True when the last cycle failed to refresh at least one dataset
    pub fn is_degraded(&self) -> bool {
        self.schools_error.is_some() || self.scores_error.is_some()
    }
}

/// Last successfully fetched datasets
#[derive(Debug, Clone, Default)]
struct Snapshot {
    schools: Arc<Vec<School>>,
    scores: Arc<Vec<ScoreRecord>>,
}

struct SharedState {
    search: watch::Sender<String>,
    loading: watch::Sender<bool>,
    snapshot: watch::Sender<Snapshot>,
    joined: watch::Sender<Arc<JoinedView>>,
    filtered: watch::Sender<Arc<JoinedView>>,
    status: watch::Sender<FetchStatus>,
    /// Epoch of the newest filter request
    epoch: AtomicU64,
    /// Number of the most recently started fetch cycle
    fetch_cycle: AtomicU64,
}

impl SharedState {
    fn new(snapshot: Snapshot, loading: bool) -> Self {
        let joined = Arc::new(JoinedView::join(&snapshot.schools, &snapshot.scores));
        Self {
            search: watch::Sender::new(String::new()),
            loading: watch::Sender::new(loading),
            snapshot: watch::Sender::new(snapshot),
            joined: watch::Sender::new(Arc::clone(&joined)),
            filtered: watch::Sender::new(joined),
            status: watch::Sender::new(FetchStatus::default()),
            epoch: AtomicU64::new(0),
            fetch_cycle: AtomicU64::new(0),
        }
    }

    fn next_fetch_cycle(&self) -> u64 {
        self.fetch_cycle.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current_cycle(&self, cycle: u64) -> bool {
        self.fetch_cycle.load(Ordering::SeqCst) == cycle
    }

    fn next_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn joined(&self) -> Arc<JoinedView> {
        Arc::clone(&self.joined.borrow())
    }

    /// Merge a cycle's results into the snapshot, returning the new join
    ///
    /// `None` when a newer cycle has started; nothing is written then.
    fn apply_fetch(
        &self,
        cycle: u64,
        schools: Result<Vec<School>, FetchError>,
        scores: Result<Vec<ScoreRecord>, FetchError>,
    ) -> Option<Arc<JoinedView>> {
        let mut joined = None;
        self.snapshot.send_if_modified(|snapshot| {
            if !self.is_current_cycle(cycle) {
                return false;
            }
            if let Ok(schools) = schools {
                snapshot.schools = Arc::new(schools);
            }
            if let Ok(scores) = scores {
                snapshot.scores = Arc::new(scores);
            }
            joined = Some(Arc::new(JoinedView::join(&snapshot.schools, &snapshot.scores)));
            true
        });
        joined
    }

    /// Replace `target` with `value` only while `cycle` is the newest fetch
    fn publish_for_cycle<T>(&self, cycle: u64, target: &watch::Sender<T>, value: T) -> bool {
        target.send_if_modified(|current| {
            if !self.is_current_cycle(cycle) {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Publish `view` only if `epoch` is still the newest filter request
    fn publish_filtered(&self, epoch: u64, view: Arc<JoinedView>) -> bool {
        self.filtered.send_if_modified(|current| {
            if !self.is_current(epoch) {
                return false;
            }
            *current = view;
            true
        })
    }
}

struct FilterJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// View-state coordinator for the schools list
pub struct SchoolsViewModel {
    state: Arc<SharedState>,
    options: SearchOptions,
    filter_job: Option<FilterJob>,
}

impl SchoolsViewModel {
    /// Empty view model, not loading
    pub fn new(options: SearchOptions) -> Self {
        Self {
            state: Arc::new(SharedState::new(Snapshot::default(), false)),
            options,
            filter_job: None,
        }
    }

    /// View model seeded with preset data, published unfiltered
    pub fn with_data(
        schools: Vec<School>,
        scores: Vec<ScoreRecord>,
        loading: bool,
        options: SearchOptions,
    ) -> Self {
        let snapshot = Snapshot {
            schools: Arc::new(schools),
            scores: Arc::new(scores),
        };

        Self {
            state: Arc::new(SharedState::new(snapshot, loading)),
            options,
            filter_job: None,
        }
    }

    /// Start one fetch cycle
    ///
    /// `loading` is set before this returns. The returned handle completes
    /// once the joined and filtered views for this cycle are published, or
    /// once its results are dropped because a newer cycle was started.
    pub fn fetch_data(&self, repository: Arc<dyn SchoolRepository>) -> JoinHandle<()> {
        let cycle = self.state.next_fetch_cycle();
        self.state.loading.send_replace(true);

        let state = Arc::clone(&self.state);
        let options = SearchOptions {
            debounce: std::time::Duration::ZERO,
            ..self.options
        };

        tokio::spawn(async move {
            info!(cycle, "Fetch cycle started");

            let (schools, scores) =
                tokio::join!(repository.get_schools(), repository.get_scores());

            let status = FetchStatus {
                schools_error: schools.as_ref().err().cloned(),
                scores_error: scores.as_ref().err().cloned(),
                completed_at: Some(Utc::now()),
            };

            let Some(joined) = state.apply_fetch(cycle, schools, scores) else {
                debug!(cycle, "Fetch cycle superseded, results dropped");
                return;
            };

            if let Some(e) = &status.schools_error {
                warn!(cycle, error = %e, "Schools fetch failed, keeping previous data");
            }
            if let Some(e) = &status.scores_error {
                warn!(cycle, error = %e, "Scores fetch failed, keeping previous data");
            }
            info!(
                cycle,
                schools = joined.len(),
                with_scores = joined.scored_count(),
                degraded = status.is_degraded(),
                "Fetch cycle complete"
            );

            if !state.publish_for_cycle(cycle, &state.joined, joined)
                || !state.publish_for_cycle(cycle, &state.status, status)
            {
                debug!(cycle, "Fetch cycle superseded, results dropped");
                return;
            }

            let epoch = state.next_epoch();
            let query = state.search.borrow().clone();
            run_filter(Arc::clone(&state), epoch, query, options, CancellationToken::new()).await;

            // Filtered view first, so `loading == false` never shows the old list
            state.publish_for_cycle(cycle, &state.loading, false);
        })
    }

    /// Record a new search query and refilter in the background
    ///
    /// The query is visible through [`search_criteria`](Self::search_criteria)
    /// immediately; the filtered view follows once the new filter task
    /// publishes.
    pub fn on_search_criteria_changed(&mut self, query: impl Into<String>) {
        let query = query.into();
        self.state.search.send_replace(query.clone());

        if let Some(job) = self.filter_job.take() {
            job.token.cancel();
        }

        let epoch = self.state.next_epoch();
        let token = CancellationToken::new();
        debug!(epoch, query = %query, "Scheduling filter");

        let handle = tokio::spawn(run_filter(
            Arc::clone(&self.state),
            epoch,
            query,
            self.options,
            token.clone(),
        ));
        self.filter_job = Some(FilterJob { token, handle });
    }

    /// Wait for the most recently scheduled filter task to finish
    pub async fn wait_for_filter(&mut self) {
        if let Some(job) = self.filter_job.take() {
            if let Err(e) = job.handle.await {
                warn!(error = %e, "Filter task failed");
            }
        }
    }

    pub fn search_criteria(&self) -> String {
        self.state.search.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        *self.state.loading.borrow()
    }

    pub fn filtered_view(&self) -> Arc<JoinedView> {
        Arc::clone(&self.state.filtered.borrow())
    }

    /// Unfiltered join of the last fetched datasets
    pub fn joined_view(&self) -> Arc<JoinedView> {
        self.state.joined()
    }

    pub fn fetch_status(&self) -> FetchStatus {
        self.state.status.borrow().clone()
    }

    pub fn search_options(&self) -> SearchOptions {
        self.options
    }

    pub fn subscribe_loading(&self) -> watch::Receiver<bool> {
        self.state.loading.subscribe()
    }

    pub fn subscribe_joined(&self) -> watch::Receiver<Arc<JoinedView>> {
        self.state.joined.subscribe()
    }

    pub fn subscribe_filtered(&self) -> watch::Receiver<Arc<JoinedView>> {
        self.state.filtered.subscribe()
    }

    pub fn subscribe_fetch_status(&self) -> watch::Receiver<FetchStatus> {
        self.state.status.subscribe()
    }

    pub fn subscribe_search(&self) -> watch::Receiver<String> {
        self.state.search.subscribe()
    }
}

impl Drop for SchoolsViewModel {
    fn drop(&mut self) {
        if let Some(job) = self.filter_job.take() {
            job.token.cancel();
        }
    }
}

async fn run_filter(
    state: Arc<SharedState>,
    epoch: u64,
    query: String,
    options: SearchOptions,
    token: CancellationToken,
) {
    if !options.debounce.is_zero() {
        tokio::select! {
            _ = token.cancelled() => {
                debug!(epoch, "Filter cancelled during debounce");
                return;
            }
            _ = tokio::time::sleep(options.debounce) => {}
        }
    }

    let joined = state.joined();
    let is_stale = || token.is_cancelled() || !state.is_current(epoch);

    let Some(view) = filter::filter_cooperative(&joined, &query, &options, is_stale).await else {
        debug!(epoch, "Filter superseded");
        return;
    };

    let count = view.len();
    if state.publish_filtered(epoch, view) {
        debug!(epoch, query = %query, count, "Filtered view published");
    } else {
        debug!(epoch, "Filter result discarded, newer query pending");
    }
}
