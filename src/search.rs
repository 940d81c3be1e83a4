use crate::error::SearchError;
use crate::fetcher::Fetcher;
use crate::models::Listing;
use crate::query;
use crate::scrapers::AmazonExtractor;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub listings: Vec<Listing>,
    pub loading: bool,
    pub error_message: Option<String>,
}

/// Runs searches and publishes their state.
///
/// Every call to [`Searcher::search`] takes a new generation. A search only
/// writes state while it is still the latest one, so a slow response cannot
/// overwrite the results of a search started after it.
pub struct Searcher {
    fetcher: Arc<dyn Fetcher>,
    state: watch::Sender<SearchState>,
    generation: AtomicU64,
}

impl Searcher {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        let (state, _) = watch::channel(SearchState::default());

        Self {
            fetcher,
            state,
            generation: AtomicU64::new(0),
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> SearchState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SearchState> {
        self.state.subscribe()
    }

    /// Runs one search and returns the state visible once it completes
    pub async fn search(&self, query: &str) -> SearchState {
        let query = query.trim();
        if query.is_empty() {
            self.begin(|state| {
                state.listings.clear();
                state.loading = false;
                state.error_message = Some(SearchError::EmptyQuery.to_string());
            });
            return self.state();
        }

        let generation = self.begin(|state| {
            state.loading = true;
            state.error_message = None;
        });

        tracing::info!("Searching used listings for '{}'", query);

        match self.fetch_listings(query).await {
            Ok(listings) => {
                if listings.is_empty() {
                    tracing::info!("No used listings found for '{}'", query);
                } else {
                    tracing::info!("Found {} used listings for '{}'", listings.len(), query);
                }

                self.publish(generation, |state| {
                    state.error_message = listings
                        .is_empty()
                        .then(|| format!("No used listings found for \"{}\".", query));
                    state.listings = listings;
                    state.loading = false;
                });
            }
            Err(e) => {
                tracing::warn!("Search for '{}' failed: {}", query, e);

                self.publish(generation, |state| {
                    state.listings.clear();
                    state.error_message = Some(format!("Search failed: {}", e));
                    state.loading = false;
                });
            }
        }

        self.state()
    }

    async fn fetch_listings(&self, query: &str) -> Result<Vec<Listing>, SearchError> {
        let url = query::build_search_url(query);
        let html = self.fetcher.fetch(&url).await?;

        // Parsing is CPU-bound and the parsed document is not Send
        tokio::task::spawn_blocking(move || AmazonExtractor::extract(&html))
            .await
            .map_err(|e| SearchError::Internal(e.to_string()))
    }

    /// Starts a new generation and applies its first update.
    /// Both happen under the channel's write lock, so no other search can
    /// publish between them.
    fn begin(&self, update: impl FnOnce(&mut SearchState)) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            update(state);
        });
        generation
    }

    /// Applies `update` unless a newer search has started since `generation`.
    /// The check runs under the write lock, where generations are issued.
    fn publish(&self, generation: u64, update: impl FnOnce(&mut SearchState)) -> bool {
        let published = self.state.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(state);
            true
        });

        if !published {
            tracing::debug!("Search #{} was superseded, dropping its result", generation);
        }
        published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    const TWO_CARD_FIXTURE: &str = r#"
        <html><body><div class="s-main-slot">
            <div class="s-result-item" data-component-type="s-search-result">
                <h2><a href="/gp/product/B0VALID"><span>  EVGA GeForce RTX 3080 (Renewed)  </span></a></h2>
                <span class="a-price"><span class="a-offscreen"> $489.00 </span></span>
                <span class="a-color-base">FREE Shipping</span>
            </div>
            <div class="s-result-item" data-component-type="s-search-result">
                <h2><a href="/gp/product/B0BLANK"><span>MSI RTX 3070 (Used)</span></a></h2>
                <span class="a-price"><span class="a-offscreen">   </span></span>
            </div>
        </div></body></html>
    "#;

    /// Returns a canned body and records requested URLs
    struct StubFetcher {
        response: Result<String, SearchError>,
        calls: AtomicUsize,
        urls: Mutex<Vec<String>>,
    }

    impl StubFetcher {
        fn new(response: Result<&str, SearchError>) -> Arc<Self> {
            Arc::new(Self {
                response: response.map(str::to_string),
                calls: AtomicUsize::new(0),
                urls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<String, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.urls.lock().unwrap().push(url.to_string());
            self.response.clone()
        }
    }

    /// Holds requests for "slow" until released
    struct GatedFetcher {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Fetcher for GatedFetcher {
        async fn fetch(&self, url: &str) -> Result<String, SearchError> {
            let title = if url.contains("k=slow") {
                self.gate.notified().await;
                "Slow result"
            } else {
                "Fast result"
            };

            Ok(format!(
                r#"<div class="s-result-item" data-component-type="s-search-result">
                    <h2><a href="/dp/X"><span>{}</span></a></h2>
                    <span class="a-price"><span class="a-offscreen">$1.00</span></span></div>"#,
                title
            ))
        }
    }

    #[tokio::test]
    async fn test_blank_query_never_fetches() {
        let fetcher = StubFetcher::new(Ok(TWO_CARD_FIXTURE));
        let searcher = Searcher::new(fetcher.clone());

        for query in ["", "   ", "\t\n"] {
            let state = searcher.search(query).await;
            assert!(state.listings.is_empty());
            assert!(!state.loading);
            assert_eq!(state.error_message.as_deref(), Some("Enter something to search."));
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_blank_query_clears_previous_listings() {
        let searcher = Searcher::new(StubFetcher::new(Ok(TWO_CARD_FIXTURE)));

        assert_eq!(searcher.search("graphics card").await.listings.len(), 1);

        let state = searcher.search(" ").await;
        assert!(state.listings.is_empty());
        assert_eq!(state.error_message.as_deref(), Some("Enter something to search."));
    }

    #[tokio::test]
    async fn test_end_to_end_graphics_card() {
        let fetcher = StubFetcher::new(Ok(TWO_CARD_FIXTURE));
        let searcher = Searcher::new(fetcher.clone());

        let state = searcher.search("graphics card").await;

        let urls = fetcher.urls.lock().unwrap().clone();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("k=graphics+card"));
        assert!(urls[0].contains("rh=p_n_condition-type%3A6461716011"));

        assert!(!state.loading);
        assert_eq!(state.error_message, None);
        assert_eq!(
            state.listings,
            vec![Listing {
                title: "EVGA GeForce RTX 3080 (Renewed)".to_string(),
                price: "$489.00".to_string(),
                shipping: "FREE Shipping".to_string(),
                url: "https://www.amazon.com/gp/product/B0VALID".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_query_is_trimmed_before_encoding() {
        let fetcher = StubFetcher::new(Ok(TWO_CARD_FIXTURE));
        let searcher = Searcher::new(fetcher.clone());

        searcher.search("  ssd  ").await;

        let urls = fetcher.urls.lock().unwrap().clone();
        assert!(urls[0].contains("k=ssd&"));
    }

    #[tokio::test]
    async fn test_empty_results_message() {
        let searcher = Searcher::new(StubFetcher::new(Ok("<html><body>No results</body></html>")));

        let state = searcher.search("unobtainium").await;
        assert!(state.listings.is_empty());
        assert!(!state.loading);
        assert_eq!(
            state.error_message.as_deref(),
            Some("No used listings found for \"unobtainium\".")
        );
    }

    #[tokio::test]
    async fn test_http_status_failure() {
        let searcher = Searcher::new(StubFetcher::new(Err(SearchError::HttpStatus(503))));

        let state = searcher.search("laptop").await;
        assert!(state.listings.is_empty());
        assert!(!state.loading);
        assert_eq!(state.error_message.as_deref(), Some("Search failed: HTTP 503"));
    }

    #[tokio::test]
    async fn test_transport_failure_then_recovery() {
        let failing = Searcher::new(StubFetcher::new(Err(SearchError::Transport(
            "connection reset".to_string(),
        ))));
        let state = failing.search("laptop").await;
        assert_eq!(state.error_message.as_deref(), Some("Search failed: connection reset"));

        // The same searcher keeps working after a failure
        let state = failing.search("laptop").await;
        assert!(!state.loading);
        assert_eq!(failing.state(), state);
    }

    #[tokio::test]
    async fn test_subscribers_see_final_state() {
        let searcher = Searcher::new(StubFetcher::new(Ok(TWO_CARD_FIXTURE)));
        let mut rx = searcher.subscribe();

        searcher.search("graphics card").await;

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.listings.len(), 1);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn test_loading_is_set_while_fetching() {
        let gate = Arc::new(Notify::new());
        let searcher = Searcher::new(Arc::new(GatedFetcher { gate: gate.clone() }));

        let observe = async {
            tokio::task::yield_now().await;
            let during = searcher.state();
            gate.notify_one();
            during
        };

        let (finished, during) = tokio::join!(searcher.search("slow"), observe);

        assert!(during.loading);
        assert_eq!(during.error_message, None);
        assert!(!finished.loading);
        assert_eq!(finished.listings[0].title, "Slow result");
    }

    #[test]
    fn test_publish_after_newer_generation_is_dropped() {
        let searcher = Searcher::new(StubFetcher::new(Ok(TWO_CARD_FIXTURE)));

        let older = searcher.begin(|state| state.loading = true);
        let newer = searcher.begin(|state| {
            state.loading = true;
            state.error_message = None;
        });
        assert!(newer > older);

        let stale = searcher.publish(older, |state| {
            state.listings = vec![Listing {
                title: "Stale".to_string(),
                price: "$1.00".to_string(),
                shipping: "Shipping not shown".to_string(),
                url: "https://www.amazon.com/dp/STALE".to_string(),
            }];
            state.loading = false;
        });
        assert!(!stale);

        let state = searcher.state();
        assert!(state.loading);
        assert!(state.listings.is_empty());

        assert!(searcher.publish(newer, |state| state.loading = false));
        assert!(!searcher.state().loading);
    }

    #[test]
    fn test_dropped_publish_does_not_notify_subscribers() {
        let searcher = Searcher::new(StubFetcher::new(Ok(TWO_CARD_FIXTURE)));
        let older = searcher.begin(|_| {});
        searcher.begin(|_| {});

        let rx = searcher.subscribe();

        searcher.publish(older, |state| state.loading = true);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_empty_message_uses_trimmed_query() {
        let searcher = Searcher::new(StubFetcher::new(Ok("<html></html>")));

        let state = searcher.search("  gpu  ").await;
        assert_eq!(
            state.error_message.as_deref(),
            Some("No used listings found for \"gpu\".")
        );
    }

    #[tokio::test]
    async fn test_superseded_search_is_discarded() {
        let gate = Arc::new(Notify::new());
        let searcher = Searcher::new(Arc::new(GatedFetcher { gate: gate.clone() }));

        let newer = async {
            let state = searcher.search("fast").await;
            gate.notify_one();
            state
        };

        // The slow search starts first but completes last
        let (_, fast_state) = tokio::join!(searcher.search("slow"), newer);

        assert_eq!(fast_state.listings[0].title, "Fast result");

        let final_state = searcher.state();
        assert!(!final_state.loading);
        assert_eq!(final_state.listings.len(), 1);
        assert_eq!(final_state.listings[0].title, "Fast result");
    }
}
