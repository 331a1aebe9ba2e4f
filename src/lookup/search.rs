use crate::client::ApiResponse;
use crate::lookup::common::{extract_count, required};
use crate::lookup::{Lookup, MovieSummary, SearchOptions, SearchResults};
use crate::query::Query;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Search {
    term: String,
    options: SearchOptions,
}

impl Search {
    pub fn new(term: impl Into<String>, options: SearchOptions) -> Self {
        Self {
            term: term.into(),
            options,
        }
    }
}

impl Lookup for Search {
    type Output = SearchResults;

    fn name(&self) -> &'static str {
        "search"
    }

    fn build_query(&self) -> Result<Query, &'static str> {
        let term = required(&self.term).ok_or("Search term is required")?;

        Ok(Query::new()
            .param("s", term)
            .param("page", self.options.page)
            .param("type", self.options.kind.as_deref())
            .param("y", self.options.year.as_deref()))
    }

    fn extract(&self, response: Arc<ApiResponse>) -> SearchResults {
        let data = match response.data.as_ref().filter(|_| response.success) {
            Some(data) => data,
            None => return SearchResults::empty(response),
        };

        let movies = match data.get("Search").and_then(|items| items.as_array()) {
            Some(items) => items
                .iter()
                .filter_map(|item| {
                    serde_json::from_value::<MovieSummary>(item.clone())
                        .map_err(|err| tracing::warn!("skipping malformed search item: {}", err))
                        .ok()
                })
                .collect(),
            None => Vec::new(),
        };
        let total_results = extract_count(data.get("totalResults"));

        SearchResults {
            response,
            movies,
            total_results,
        }
    }
}
