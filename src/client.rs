use crate::cache::{CacheStatus, ResponseCache};
use crate::config::ClientConfig;
use crate::error::{Connectivity, NetworkState, RequestError, FALLBACK_MESSAGE};
use crate::events::{EventObservers, RequestEvent};
use crate::query::{CacheKey, Query};
use crate::transport::{HttpTransport, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Outcome of [`ApiClient::request`]. Failures of every kind end up here as
/// `success: false` with a message fit for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Returns the upstream's own error message when a well-formed body reports
/// failure (`"Response": "False"`).
fn application_failure(body: &Value) -> Option<String> {
    match body.get("Response") {
        Some(Value::String(flag)) if flag.eq_ignore_ascii_case("false") => Some(
            body.get("Error")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or(FALLBACK_MESSAGE)
                .to_string(),
        ),
        _ => None,
    }
}

type Computation = Shared<BoxFuture<'static, Arc<ApiResponse>>>;

struct InFlightEntry {
    id: u64,
    computation: Computation,
}

struct ClientState<T> {
    config: ClientConfig,
    transport: T,
    cache: ResponseCache,
    in_flight: DashMap<CacheKey, InFlightEntry>,
    next_computation: AtomicU64,
    cancel: Mutex<CancellationToken>,
    observers: EventObservers,
    connectivity: Arc<dyn Connectivity>,
}

/// Removes its computation from the in-flight registry however the task ends.
struct InFlightGuard<T: Transport> {
    state: Arc<ClientState<T>>,
    key: CacheKey,
    id: u64,
}

impl<T: Transport> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        self.state
            .in_flight
            .remove_if(&self.key, |_, entry| entry.id == self.id);
    }
}

/// Cached, de-duplicated, retrying access to the upstream API.
///
/// Cloning is cheap and every clone shares the same cache, in-flight
/// registry and observers.
pub struct ApiClient<T> {
    state: Arc<ClientState<T>>,
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl ApiClient<HttpTransport> {
    pub fn http(config: ClientConfig) -> Result<Self, RequestError> {
        Ok(Self::new(config, HttpTransport::new()?))
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_connectivity(config, transport, Arc::new(NetworkState::default()))
    }

    pub fn with_connectivity(
        config: ClientConfig,
        transport: T,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        let cache = ResponseCache::new(config.cache_ttl, config.cache_capacity);
        Self {
            state: Arc::new(ClientState {
                config,
                transport,
                cache,
                in_flight: DashMap::new(),
                next_computation: AtomicU64::new(0),
                cancel: Mutex::new(CancellationToken::new()),
                observers: EventObservers::new(),
                connectivity,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.state.config
    }

    pub fn observers(&self) -> &EventObservers {
        &self.state.observers
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.state.cache
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.in_flight.len()
    }

    /// Resolve `query`, from the cache when allowed and fresh, otherwise by
    /// joining or starting the one upstream computation for its key.
    pub async fn request(&self, query: &Query, use_cache: bool) -> Arc<ApiResponse> {
        let key = query.cache_key();

        match self.state.cache.lookup(&key, use_cache) {
            CacheStatus::Cached(response) => {
                tracing::debug!("cache hit for key {}", key);
                return response;
            }
            CacheStatus::Missed => tracing::debug!("cache missed for key {}", key),
            CacheStatus::NotAvailable => tracing::debug!("cache not available for key {}", key),
        }

        let computation = match self.state.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!("request already in progress for key {}, waiting", key);
                entry.get().computation.clone()
            }
            Entry::Vacant(entry) => {
                let id = self.state.next_computation.fetch_add(1, Ordering::Relaxed);
                let computation = self.start(id, key, query.clone(), use_cache);
                entry.insert(InFlightEntry {
                    id,
                    computation: computation.clone(),
                });
                computation
            }
        };

        computation.await
    }

    /// Spawns the computation so it settles even if every waiter goes away.
    /// Called with the registry slot for `key` held, so the guard cannot
    /// remove the entry before it is inserted.
    fn start(&self, id: u64, key: CacheKey, query: Query, use_cache: bool) -> Computation {
        let state = self.state.clone();
        let cancel = self.current_token();
        let guard = InFlightGuard {
            state: state.clone(),
            key: key.clone(),
            id,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            state.execute(&key, query, use_cache, cancel).await
        });

        async move {
            match task.await {
                Ok(response) => response,
                Err(err) => {
                    tracing::error!("request task failed: {}", err);
                    Arc::new(ApiResponse::failed(FALLBACK_MESSAGE))
                }
            }
        }
        .boxed()
        .shared()
    }

    fn current_token(&self) -> CancellationToken {
        self.state
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop every cached response. Computations in flight are unaffected.
    pub fn clear_cache(&self) {
        self.state.cache.clear();
        tracing::info!("api cache cleared");
    }

    /// Abort every outstanding computation. Requests issued afterwards get a
    /// fresh cancellation token and proceed normally.
    pub fn cancel_requests(&self) {
        let mut token = self
            .state
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        token.cancel();
        *token = CancellationToken::new();
    }
}

impl<T: Transport> ClientState<T> {
    async fn execute(
        &self,
        key: &CacheKey,
        query: Query,
        use_cache: bool,
        cancel: CancellationToken,
    ) -> Arc<ApiResponse> {
        let url = query.to_url(&self.config);
        self.observers.emit(&RequestEvent::Started { query });

        let body = match self.fetch_with_retry(key, url, &cancel).await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!("api request error for key {}: {}", key, err);
                self.observers.emit(&RequestEvent::Failed {
                    error: err.to_string(),
                });
                let message = err.user_message(self.connectivity.is_online());
                return Arc::new(ApiResponse::failed(message));
            }
        };

        if let Some(message) = application_failure(&body) {
            tracing::info!("upstream rejected key {}: {}", key, message);
            self.observers.emit(&RequestEvent::Failed {
                error: message.clone(),
            });
            return Arc::new(ApiResponse::failed(message));
        }

        let response = Arc::new(ApiResponse::ok(body.clone()));
        if use_cache {
            self.cache.store(key.clone(), response.clone());
        }
        self.observers.emit(&RequestEvent::Succeeded { data: body });
        response
    }

    /// One attempt plus up to `max_retries` more, `retry_delay` apart.
    /// Timeouts, cancellation and unreadable bodies end the loop at once.
    async fn fetch_with_retry(
        &self,
        key: &CacheKey,
        url: Url,
        cancel: &CancellationToken,
    ) -> Result<Value, RequestError> {
        let timeout = self.config.timeout;
        let mut retries_remaining = self.config.max_retries;

        loop {
            // The timer lives inside this future and is dropped with it once
            // the attempt settles.
            let attempt = tokio::time::timeout(timeout, self.transport.get_json(url.clone()));

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(RequestError::Cancelled),
                outcome = attempt => outcome.unwrap_or(Err(RequestError::Timeout(timeout))),
            };

            let err = match outcome {
                Ok(body) => return Ok(body),
                Err(err) => err,
            };

            if !err.is_retryable() || retries_remaining == 0 {
                return Err(err);
            }

            tracing::warn!(
                "retrying key {} after error: {} ({} attempts left)",
                key,
                err,
                retries_remaining
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RequestError::Cancelled),
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
            retries_remaining -= 1;
        }
    }
}
