use crate::client::ApiResponse;
use crate::lookup::common::{record, required};
use crate::lookup::{Lookup, MovieDetails};
use crate::query::Query;
use std::sync::Arc;

/// Full record for one IMDb identifier, with the long plot.
#[derive(Debug, Clone)]
pub struct Details {
    imdb_id: String,
}

impl Details {
    pub fn new(imdb_id: impl Into<String>) -> Self {
        Self {
            imdb_id: imdb_id.into(),
        }
    }
}

impl Lookup for Details {
    type Output = MovieDetails;

    fn name(&self) -> &'static str {
        "details"
    }

    fn build_query(&self) -> Result<Query, &'static str> {
        let imdb_id = required(&self.imdb_id).ok_or("IMDb ID is required")?;
        Ok(Query::new().param("i", imdb_id).param("plot", "full"))
    }

    fn extract(&self, response: Arc<ApiResponse>) -> MovieDetails {
        let movie = record(&response);
        MovieDetails { response, movie }
    }
}
