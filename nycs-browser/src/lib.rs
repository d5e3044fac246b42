//! nycs-browser library interface
//!
//! Fetches the NYC school directory and SAT results, joins them by `dbn`,
//! and serves a searchable view to the terminal presenter.

pub mod logging;
pub mod presenter;
pub mod services;
pub mod view_model;

pub use crate::services::{ApiSchoolRepository, FetchError, NycOpenDataClient, SchoolRepository};
pub use crate::view_model::{FetchStatus, JoinedEntry, JoinedView, SchoolsViewModel, SearchOptions};

use nycs_common::config::AppConfig;
use std::sync::Arc;

/// Repository talking to the API described by `config`
pub fn build_repository(config: &AppConfig) -> Arc<dyn SchoolRepository> {
    Arc::new(ApiSchoolRepository::new(NycOpenDataClient::new(&config.api)))
}
