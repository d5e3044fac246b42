//! School data repository
//!
//! The view model only talks to a [`SchoolRepository`]; the production
//! implementation forwards to [`NycOpenDataClient`] unchanged. Tests swap in
//! their own implementations.

use super::api_client::{FetchError, NycOpenDataClient};
use async_trait::async_trait;
use nycs_common::{School, ScoreRecord};

/// Source of the school directory and SAT results
#[async_trait]
pub trait SchoolRepository: Send + Sync {
    /// Get all schools
    async fn get_schools(&self) -> Result<Vec<School>, FetchError>;

    /// Get all SAT score records
    async fn get_scores(&self) -> Result<Vec<ScoreRecord>, FetchError>;
}

/// Repository backed by the open-data API
#[derive(Debug, Clone)]
pub struct ApiSchoolRepository {
    client: NycOpenDataClient,
}

impl ApiSchoolRepository {
    pub fn new(client: NycOpenDataClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchoolRepository for ApiSchoolRepository {
    async fn get_schools(&self) -> Result<Vec<School>, FetchError> {
        self.client.fetch_schools().await
    }

    async fn get_scores(&self) -> Result<Vec<ScoreRecord>, FetchError> {
        self.client.fetch_scores().await
    }
}
