//! Cached, de-duplicated, retrying client for the OMDb movie API.
//!
//! [`ApiClient`] is constructed by the caller and shared by cloning. Every
//! lookup goes through [`ApiClient::request`], which serves fresh results
//! from an in-memory TTL cache, coalesces concurrent identical queries into
//! one upstream call, and retries transport failures with a fixed delay.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod lookup;
pub mod query;
pub mod transport;

pub use cache::{CacheEntry, CacheStatus, ResponseCache};
pub use client::{ApiClient, ApiResponse};
pub use config::{ClientConfig, ConfigOverrides};
pub use error::{Connectivity, ErrorKind, ErrorReport, NetworkState, RequestError};
pub use events::{EventObservers, RequestEvent, SubscriptionId};
pub use lookup::{
    ByTitle, Details, Lookup, MovieDetails, MovieSummary, Search, SearchOptions, SearchResults,
};
pub use query::{CacheKey, Query};
pub use transport::{HttpTransport, Transport};
