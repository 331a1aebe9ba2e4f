use crate::client::{ApiClient, ApiResponse};
use crate::query::Query;
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

pub use by_title::ByTitle;
pub use details::Details;
pub use search::Search;

mod by_title;
mod common;
mod details;
mod search;

/// A typed question to the API: validates input, builds the [`Query`] and
/// shapes the shared [`ApiResponse`] into its own output.
pub trait Lookup: Send + Sync {
    type Output;

    fn name(&self) -> &'static str;

    /// The query to send, or the message to report without touching the network.
    fn build_query(&self) -> Result<Query, &'static str>;

    fn extract(&self, response: Arc<ApiResponse>) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieSummary {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Year")]
    pub year: String,
    #[serde(rename = "imdbID")]
    pub imdb_id: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Poster", default)]
    pub poster: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    pub page: u32,
    /// `movie`, `series` or `episode`.
    pub kind: Option<String>,
    pub year: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            page: 1,
            kind: None,
            year: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    #[serde(flatten)]
    pub response: Arc<ApiResponse>,
    pub movies: Vec<MovieSummary>,
    pub total_results: u64,
}

impl SearchResults {
    fn empty(response: Arc<ApiResponse>) -> Self {
        Self {
            response,
            movies: Vec::new(),
            total_results: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MovieDetails {
    #[serde(flatten)]
    pub response: Arc<ApiResponse>,
    pub movie: Option<Value>,
}

impl<T: Transport> ApiClient<T> {
    pub async fn lookup<L: Lookup>(&self, lookup: &L) -> L::Output {
        match lookup.build_query() {
            Ok(query) => lookup.extract(self.request(&query, true).await),
            Err(message) => {
                tracing::debug!("{} lookup rejected: {}", lookup.name(), message);
                lookup.extract(Arc::new(ApiResponse::failed(message)))
            }
        }
    }

    pub async fn search_movies(&self, term: &str, options: SearchOptions) -> SearchResults {
        self.lookup(&Search::new(term, options)).await
    }

    pub async fn movie_details(&self, imdb_id: &str) -> MovieDetails {
        self.lookup(&Details::new(imdb_id)).await
    }

    pub async fn movie_by_title(&self, title: &str, year: Option<&str>) -> MovieDetails {
        self.lookup(&ByTitle::new(title, year.map(str::to_string)))
            .await
    }
}
