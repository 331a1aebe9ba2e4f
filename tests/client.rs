use async_trait::async_trait;
use cached_omdb::error::{OFFLINE_MESSAGE, TIMEOUT_MESSAGE};
use cached_omdb::{
    ApiClient, ClientConfig, ConfigOverrides, NetworkState, Query, RequestError, RequestEvent,
    SearchOptions, Transport,
};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

struct Step {
    delay: Duration,
    outcome: Result<Value, RequestError>,
}

#[derive(Default)]
struct Script {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<(Instant, Url)>>,
}

/// Replays queued outcomes in order, then answers every further call with a
/// successful body.
#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Script>,
}

impl ScriptedTransport {
    fn push(&self, outcome: Result<Value, RequestError>) -> &Self {
        self.push_delayed(Duration::ZERO, outcome)
    }

    fn push_delayed(&self, delay: Duration, outcome: Result<Value, RequestError>) -> &Self {
        self.script
            .steps
            .lock()
            .unwrap()
            .push_back(Step { delay, outcome });
        self
    }

    fn calls(&self) -> usize {
        self.script.calls.lock().unwrap().len()
    }

    fn call_times(&self) -> Vec<Instant> {
        self.script
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| *at)
            .collect()
    }

    fn last_url(&self) -> Option<Url> {
        self.script
            .calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, url)| url.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get_json(&self, url: Url) -> Result<Value, RequestError> {
        self.script.calls.lock().unwrap().push((Instant::now(), url));
        let step = self.script.steps.lock().unwrap().pop_front();
        match step {
            Some(step) => {
                tokio::time::sleep(step.delay).await;
                step.outcome
            }
            None => Ok(found()),
        }
    }
}

fn found() -> Value {
    json!({
        "Search": [
            {"Title": "Batman Begins", "Year": "2005", "imdbID": "tt0372784", "Type": "movie", "Poster": "N/A"}
        ],
        "totalResults": "1",
        "Response": "True"
    })
}

fn not_found() -> Value {
    json!({"Response": "False", "Error": "Movie not found!"})
}

fn network_error() -> RequestError {
    RequestError::Network("connection refused".into())
}

fn batman() -> Query {
    Query::new().param("s", "batman")
}

fn client(transport: &ScriptedTransport) -> ApiClient<ScriptedTransport> {
    ApiClient::new(ClientConfig::default(), transport.clone())
}

#[tokio::test(start_paused = true)]
async fn equivalent_queries_share_one_call() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    let first = client
        .request(&Query::new().param("s", "batman").param("page", 1u32), true)
        .await;
    let second = client
        .request(
            &Query::new()
                .param("page", "1")
                .param("type", "")
                .param("s", "batman"),
            true,
        )
        .await;

    assert!(first.success);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_make_one_call() {
    let transport = ScriptedTransport::default();
    transport.push_delayed(Duration::from_millis(500), Ok(found()));
    let client = client(&transport);
    let query = batman();

    let (a, b, c) = tokio::join!(
        client.request(&query, true),
        client.request(&query, true),
        client.request(&query, true),
    );

    assert_eq!(transport.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&b, &c));
    assert_eq!(client.in_flight_len(), 0);
}

#[tokio::test(start_paused = true)]
async fn distinct_queries_run_independently() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    let q_batman = batman();
    let q_superman = Query::new().param("s", "superman");
    let (a, b) = tokio::join!(
        client.request(&q_batman, true),
        client.request(&q_superman, true),
    );

    assert!(a.success && b.success);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_is_fetched_again_and_replaced() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    let first = client.request(&batman(), true).await;
    tokio::time::advance(Duration::from_millis(300_001)).await;
    let second = client.request(&batman(), true).await;
    let third = client.request(&batman(), true).await;

    assert_eq!(transport.calls(), 2);
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&second, &third));
}

#[tokio::test(start_paused = true)]
async fn application_failure_is_neither_retried_nor_cached() {
    let transport = ScriptedTransport::default();
    transport.push(Ok(not_found())).push(Ok(not_found()));
    let client = client(&transport);
    let query = Query::new().param("s", "zzzzqqq");

    let first = client.request(&query, true).await;
    assert!(!first.success);
    assert_eq!(first.error.as_deref(), Some("Movie not found!"));
    assert_eq!(first.data, None);
    assert_eq!(transport.calls(), 1);

    let second = client.request(&query, true).await;
    assert!(!second.success);
    assert_eq!(transport.calls(), 2);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_with_fixed_delay() {
    let transport = ScriptedTransport::default();
    transport.push(Err(network_error())).push(Err(network_error()));
    let client = client(&transport);

    let response = client.request(&batman(), true).await;

    assert!(response.success);
    assert_eq!(transport.calls(), 3);
    let times = transport.call_times();
    for gap in times.windows(2).map(|pair| pair[1] - pair[0]) {
        assert!(gap >= Duration::from_millis(1_000), "gap too short: {gap:?}");
        assert!(gap < Duration::from_millis(1_010), "gap too long: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn retries_stop_after_the_configured_maximum() {
    let transport = ScriptedTransport::default();
    for _ in 0..4 {
        transport.push(Err(RequestError::Status {
            code: 503,
            reason: "Service Unavailable".into(),
        }));
    }
    let client = client(&transport);

    let response = client.request(&batman(), true).await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("HTTP 503: Service Unavailable"));
    assert_eq!(transport.calls(), 4);
    assert_eq!(client.in_flight_len(), 0);
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_is_surfaced_without_retry() {
    let transport = ScriptedTransport::default();
    transport.push_delayed(Duration::from_secs(11), Ok(found()));
    let client = client(&transport);
    let started = Instant::now();

    let response = client.request(&batman(), true).await;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some(TIMEOUT_MESSAGE));
    assert_eq!(transport.calls(), 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn settled_attempt_does_not_leave_a_timer_behind() {
    let transport = ScriptedTransport::default();
    transport
        .push_delayed(Duration::from_secs(9), Err(network_error()))
        .push_delayed(Duration::from_secs(9), Ok(found()));
    let client = client(&transport);

    let response = client.request(&batman(), true).await;

    // The first attempt's ten second deadline would land inside the second attempt.
    assert!(response.success);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn clear_cache_forces_a_new_call() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    client.request(&batman(), true).await;
    client.clear_cache();
    client.request(&batman(), true).await;

    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn bypassing_the_cache_neither_reads_nor_writes_it() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    client.request(&batman(), false).await;
    assert!(client.cache().is_empty());

    client.request(&batman(), true).await;
    client.request(&batman(), false).await;
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn unreadable_body_is_reported_without_retry() {
    let transport = ScriptedTransport::default();
    transport.push(Err(RequestError::Decode(
        "expected value at line 1 column 1".into(),
    )));
    let client = client(&transport);
    let started = Instant::now();

    let response = client.request(&batman(), true).await;

    assert!(!response.success);
    assert_eq!(
        response.error.as_deref(),
        Some("invalid response body: expected value at line 1 column 1")
    );
    assert_eq!(transport.calls(), 1);
    assert!(started.elapsed() < Duration::from_millis(1_000));
    assert!(client.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn computation_finishes_after_its_only_waiter_is_dropped() {
    let transport = ScriptedTransport::default();
    transport.push_delayed(Duration::from_millis(500), Ok(found()));
    let client = client(&transport);

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.request(&batman(), true).await })
    };

    while transport.calls() == 0 {
        tokio::task::yield_now().await;
    }
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(client.in_flight_len(), 0);
    assert_eq!(client.cache().len(), 1);

    let cached = client.request(&batman(), true).await;
    assert!(cached.success);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_requests_aborts_the_shared_computation() {
    let transport = ScriptedTransport::default();
    transport.push_delayed(Duration::from_secs(5), Ok(found()));
    let client = client(&transport);

    let waiters: Vec<_> = (0..2)
        .map(|_| {
            let client = client.clone();
            tokio::spawn(async move { client.request(&batman(), true).await })
        })
        .collect();

    while transport.calls() == 0 {
        tokio::task::yield_now().await;
    }
    client.cancel_requests();

    for waiter in waiters {
        let response = waiter.await.unwrap();
        assert_eq!(response.error.as_deref(), Some(TIMEOUT_MESSAGE));
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(client.in_flight_len(), 0);

    let after = client.request(&batman(), true).await;
    assert!(after.success);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_retry_delay_stops_retrying() {
    let transport = ScriptedTransport::default();
    transport.push(Err(network_error()));
    let client = client(&transport);

    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.request(&batman(), true).await })
    };

    while transport.calls() == 0 {
        tokio::task::yield_now().await;
    }
    client.cancel_requests();

    let response = pending.await.unwrap();
    assert!(!response.success);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn offline_state_changes_the_message() {
    let transport = ScriptedTransport::default();
    transport.push(Err(network_error()));
    let network = Arc::new(NetworkState::default());
    network.set_online(false);
    let config = ClientConfig::default().apply(ConfigOverrides {
        max_retries: Some(0),
        ..Default::default()
    });
    let client = ApiClient::with_connectivity(config, transport.clone(), network);

    let response = client.request(&batman(), true).await;

    assert_eq!(response.error.as_deref(), Some(OFFLINE_MESSAGE));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn lifecycle_events_are_emitted() {
    let transport = ScriptedTransport::default();
    transport.push(Ok(not_found()));
    let client = client(&transport);
    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = seen.clone();
        client
            .observers()
            .subscribe(move |event: &RequestEvent| seen.lock().unwrap().push(event.clone()));
    }
    client.observers().subscribe(|_| panic!("broken subscriber"));

    let failed = client.request(&batman(), true).await;
    let succeeded = client.request(&batman(), true).await;
    client.request(&batman(), true).await;

    assert!(!failed.success);
    assert!(succeeded.success);
    let seen = seen.lock().unwrap();
    let names: Vec<&str> = seen.iter().map(RequestEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "api:request:start",
            "api:request:error",
            "api:request:start",
            "api:request:success",
        ]
    );
    assert_eq!(seen[0], RequestEvent::Started { query: batman() });
}

#[tokio::test(start_paused = true)]
async fn url_carries_api_key_and_query() {
    let transport = ScriptedTransport::default();
    let config = ClientConfig::default().apply(ConfigOverrides {
        base_url: Some(Url::parse("http://localhost:8080/").unwrap()),
        api_key: Some("test-key".into()),
        ..Default::default()
    });
    let client = ApiClient::new(config, transport.clone());

    client.request(&batman(), true).await;

    let url = transport.last_url().unwrap();
    assert_eq!(url.as_str(), "http://localhost:8080/?apikey=test-key&s=batman");
}

#[tokio::test(start_paused = true)]
async fn search_movies_parses_results() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    let results = client
        .search_movies("  batman  ", SearchOptions::default())
        .await;

    assert!(results.response.success);
    assert_eq!(results.total_results, 1);
    assert_eq!(results.movies[0].title, "Batman Begins");
    let url = transport.last_url().unwrap();
    assert!(url.query().unwrap().ends_with("&page=1&s=batman"));
}

#[tokio::test(start_paused = true)]
async fn invalid_lookups_never_reach_the_network() {
    let transport = ScriptedTransport::default();
    let client = client(&transport);

    let search = client.search_movies("   ", SearchOptions::default()).await;
    let details = client.movie_details("").await;
    let by_title = client.movie_by_title(" ", None).await;

    assert_eq!(search.response.error.as_deref(), Some("Search term is required"));
    assert_eq!(details.response.error.as_deref(), Some("IMDb ID is required"));
    assert_eq!(by_title.response.error.as_deref(), Some("Title is required"));
    assert!(details.movie.is_none());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn movie_details_returns_the_record() {
    let transport = ScriptedTransport::default();
    transport.push(Ok(json!({
        "Title": "Batman Begins",
        "imdbID": "tt0372784",
        "Plot": "After training with his mentor, Batman begins his fight to free crime-ridden Gotham City from corruption.",
        "Response": "True"
    })));
    let client = client(&transport);

    let details = client.movie_details("tt0372784").await;

    assert!(details.response.success);
    assert_eq!(details.movie.unwrap()["Title"], "Batman Begins");
    assert!(transport
        .last_url()
        .unwrap()
        .query()
        .unwrap()
        .contains("i=tt0372784&plot=full"));
}
