use cached_omdb::ConfigOverrides;
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(version, about = "Query the OMDb movie API through a caching client")]
pub struct Cli {
    #[arg(long, env = "OMDB_BASE_URL")]
    pub base_url: Option<Url>,

    #[arg(long, env = "OMDB_API_KEY")]
    pub api_key: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Fixed delay between attempts in milliseconds
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// How long a successful response stays cached, in milliseconds
    #[arg(long)]
    pub cache_ttl_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search titles by keyword
    Search {
        term: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// movie, series or episode
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        year: Option<String>,
    },
    /// Full record for an IMDb id
    Details { imdb_id: String },
    /// Best match for an exact title
    Title {
        title: String,
        #[arg(long)]
        year: Option<String>,
    },
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            timeout: self.timeout_ms.map(Duration::from_millis),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay_ms.map(Duration::from_millis),
            cache_ttl: self.cache_ttl_ms.map(Duration::from_millis),
            cache_capacity: None,
        }
    }
}

