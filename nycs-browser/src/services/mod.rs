//! Data access services
//!
//! - `api_client`: HTTP client for the NYC open-data datasets
//! - `repository`: substitutable data source used by the view model

pub mod api_client;
pub mod repository;

pub use api_client::{FetchError, NycOpenDataClient};
pub use repository::{ApiSchoolRepository, SchoolRepository};
