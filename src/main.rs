use anyhow::{Context, Result};
use cached_omdb::{ApiClient, ClientConfig, RequestEvent, SearchOptions};
use clap::Parser;
use env_logger::Env;
use serde::Serialize;

mod cli;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render result")?;
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let arg = cli::Cli::parse();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = ClientConfig::default().apply(arg.overrides());
    tracing::info!("Using endpoint {}", config.base_url);

    let client = ApiClient::http(config).context("failed to create http client")?;
    client.observers().subscribe(|event| match event {
        RequestEvent::Started { query } => {
            tracing::debug!("request started: {}", query.cache_key())
        }
        RequestEvent::Succeeded { .. } => tracing::debug!("request succeeded"),
        RequestEvent::Failed { error } => tracing::warn!("request failed: {}", error),
    });

    let success = match arg.command {
        cli::Command::Search {
            term,
            page,
            kind,
            year,
        } => {
            let results = client
                .search_movies(&term, SearchOptions { page, kind, year })
                .await;
            print_json(&results)?;
            results.response.success
        }
        cli::Command::Details { imdb_id } => {
            let details = client.movie_details(&imdb_id).await;
            print_json(&details)?;
            details.response.success
        }
        cli::Command::Title { title, year } => {
            let details = client.movie_by_title(&title, year.as_deref()).await;
            print_json(&details)?;
            details.response.success
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}
