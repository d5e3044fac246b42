//! Search filtering over a joined view
//!
//! Matching is case-sensitive substring containment against the school name
//! and the raw borough code. A blank query keeps everything.

use super::join::{JoinedEntry, JoinedView};
use nycs_common::config::SearchConfig;
use std::sync::Arc;
use std::time::Duration;

/// Entries scanned between cancellation checks
pub const FILTER_CHUNK_SIZE: usize = 128;

/// Tunables for search filtering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Also match against the expanded borough name ("Brooklyn" for `K`)
    pub match_borough_name: bool,
    /// Wait this long after a keystroke before filtering
    pub debounce: Duration,
}

impl From<&SearchConfig> for SearchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            match_borough_name: config.match_borough_name,
            debounce: Duration::from_millis(config.debounce_ms),
        }
    }
}

pub fn is_blank(query: &str) -> bool {
    query.trim().is_empty()
}

/// Whether `entry` is kept for `query`
pub fn matches(entry: &JoinedEntry, query: &str, options: &SearchOptions) -> bool {
    if is_blank(query) {
        return true;
    }

    let school = &entry.school;
    school.school_name.contains(query)
        || school.boro.contains(query)
        || (options.match_borough_name && school.borough().full_name().contains(query))
}

/// Filter `view` synchronously
pub fn filter_view(view: &JoinedView, query: &str, options: &SearchOptions) -> JoinedView {
    if is_blank(query) {
        return view.clone();
    }

    JoinedView::from_entries(
        view.iter()
            .filter(|e| matches(e, query, options))
            .cloned()
            .collect(),
    )
}

/// Filter `view` in chunks, yielding to the runtime between them
///
/// Returns `None` as soon as `is_stale` reports the work was superseded.
pub async fn filter_cooperative<F>(
    view: &Arc<JoinedView>,
    query: &str,
    options: &SearchOptions,
    is_stale: F,
) -> Option<Arc<JoinedView>>
where
    F: Fn() -> bool,
{
    if is_blank(query) {
        return (!is_stale()).then(|| Arc::clone(view));
    }

    let mut kept = Vec::new();
    for chunk in view.entries().chunks(FILTER_CHUNK_SIZE) {
        if is_stale() {
            return None;
        }
        kept.extend(chunk.iter().filter(|e| matches(e, query, options)).cloned());
        tokio::task::yield_now().await;
    }

    if is_stale() {
        return None;
    }
    Some(Arc::new(JoinedView::from_entries(kept)))
}
