use crate::client::ApiResponse;
use crate::lookup::common::{record, required};
use crate::lookup::{Lookup, MovieDetails};
use crate::query::Query;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ByTitle {
    title: String,
    year: Option<String>,
}

impl ByTitle {
    pub fn new(title: impl Into<String>, year: Option<String>) -> Self {
        Self {
            title: title.into(),
            year,
        }
    }
}

impl Lookup for ByTitle {
    type Output = MovieDetails;

    fn name(&self) -> &'static str {
        "by_title"
    }

    fn build_query(&self) -> Result<Query, &'static str> {
        let title = required(&self.title).ok_or("Title is required")?;
        Ok(Query::new()
            .param("t", title)
            .param("y", self.year.as_deref()))
    }

    fn extract(&self, response: Arc<ApiResponse>) -> MovieDetails {
        let movie = record(&response);
        MovieDetails { response, movie }
    }
}
