use futures::stream::{FuturesUnordered, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::model::{Offer, SourceError};
use crate::normalizer::normalize_text;
use crate::scraper::registry::SourceRegistry;
use crate::scraper::traits::OfferSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct ActiveSource {
    name: String,
    inner: Arc<dyn OfferSource>,
}

/// Fans a query out to every configured source and merges what comes back.
///
/// Each source runs on its own task. A source that errors, panics, times out
/// or returns malformed offers contributes nothing; the others are unaffected.
pub struct SourceAggregator {
    sources: Vec<ActiveSource>,
    status: BTreeMap<String, SourceStatus>,
    timeout: Duration,
}

impl SourceAggregator {
    /// Instantiates `requested` sources from `registry`, or all of them when
    /// `requested` is `None`. Unknown names are skipped.
    pub fn new(registry: &SourceRegistry, requested: Option<&[String]>, timeout: Duration) -> Self {
        let names: Vec<String> = match requested {
            Some(list) => list
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| {
                    let known = registry.contains(n);
                    if !known {
                        debug!("Ignoring unknown source '{}'", n);
                    }
                    known
                })
                .collect(),
            None => registry.names(),
        };

        let mut sources = Vec::new();
        let mut status = BTreeMap::new();
        for name in names {
            if status.contains_key(&name) {
                continue;
            }
            match registry.create(&name) {
                Some(Ok(inner)) => {
                    status.insert(name.clone(), SourceStatus { available: true, error: None });
                    sources.push(ActiveSource { name, inner });
                }
                Some(Err(e)) => {
                    warn!("Source '{}' could not be constructed: {}", name, e);
                    status.insert(
                        name,
                        SourceStatus {
                            available: false,
                            error: Some(e.to_string()),
                        },
                    );
                }
                None => {}
            }
        }

        info!(
            "Aggregator initialized with sources: {:?}",
            sources.iter().map(|s| s.name.as_str()).collect::<Vec<_>>()
        );

        Self {
            sources,
            status,
            timeout,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Every configured source, whether or not it has been queried.
    pub fn get_status(&self) -> BTreeMap<String, SourceStatus> {
        self.status.clone()
    }

    pub async fn get_offers(&self, query: &str) -> Vec<Offer> {
        self.get_offers_until(query, std::future::pending()).await
    }

    /// Like [`get_offers`](Self::get_offers), but stops waiting once `cancel`
    /// resolves and returns what the finished sources produced.
    pub async fn get_offers_until<C>(&self, query: &str, cancel: C) -> Vec<Offer>
    where
        C: Future<Output = ()>,
    {
        let started = Instant::now();
        info!("Searching '{}' across {} sources", query, self.sources.len());

        let mut aborts = Vec::with_capacity(self.sources.len());
        let mut pending: FuturesUnordered<_> = self
            .sources
            .iter()
            .enumerate()
            .map(|(idx, source)| {
                let handle = spawn_search(source, query);
                aborts.push(handle.abort_handle());
                async move { (idx, self.await_source(source, handle, started).await) }
            })
            .collect();

        let mut slots: Vec<Option<Vec<Offer>>> = vec![None; self.sources.len()];
        tokio::pin!(cancel);

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((idx, offers)) => slots[idx] = Some(offers),
                    None => break,
                },
                _ = &mut cancel => {
                    warn!(
                        "Search '{}' cancelled with {} sources still running",
                        query,
                        pending.len()
                    );
                    break;
                }
            }
        }
        drop(pending);
        for abort in &aborts {
            abort.abort();
        }

        let per_source: BTreeMap<&str, usize> = self
            .sources
            .iter()
            .zip(&slots)
            .map(|(s, slot)| (s.name.as_str(), slot.as_ref().map_or(0, Vec::len)))
            .collect();
        let merged: Vec<Offer> = slots.into_iter().flatten().flatten().collect();

        info!(
            "Search completed: query='{}', total_results={}, stores={:?}, time={:.2}s",
            query,
            merged.len(),
            per_source,
            started.elapsed().as_secs_f64()
        );
        merged
    }

    /// Offers from a single source; empty when the name is not configured.
    pub async fn get_offers_from(&self, query: &str, source_name: &str) -> Vec<Offer> {
        let key = source_name.trim().to_lowercase();
        match self.sources.iter().find(|s| s.name == key) {
            Some(source) => {
                let started = Instant::now();
                self.await_source(source, spawn_search(source, query), started).await
            }
            None => {
                warn!(
                    "Source '{}' not found. Available: {:?}",
                    source_name,
                    self.source_names()
                );
                Vec::new()
            }
        }
    }

    /// Waits for one spawned search and applies the timeout and validity
    /// checks. Results arriving after the deadline are discarded.
    async fn await_source(
        &self,
        source: &ActiveSource,
        handle: JoinHandle<Result<Vec<Offer>, SourceError>>,
        started: Instant,
    ) -> Vec<Offer> {
        let abort = handle.abort_handle();
        let offers = match timeout(self.timeout, handle).await {
            Ok(Ok(Ok(offers))) if started.elapsed() <= self.timeout => offers,
            Ok(Ok(Ok(_))) | Err(_) => {
                abort.abort();
                warn!("{}: timed out after {:?}", source.name, self.timeout);
                return Vec::new();
            }
            Ok(Ok(Err(e))) => {
                warn!("{}: search failed: {}", source.name, e);
                return Vec::new();
            }
            Ok(Err(e)) if e.is_panic() => {
                error!("{}: search panicked", source.name);
                return Vec::new();
            }
            Ok(Err(e)) => {
                warn!("{}: search task ended: {}", source.name, e);
                return Vec::new();
            }
        };

        if let Some(problem) = offers.iter().find_map(malformed) {
            warn!("{}: discarding malformed response ({})", source.name, problem);
            return Vec::new();
        }

        let offers: Vec<Offer> = offers
            .into_iter()
            .map(|mut offer| {
                if offer.store.trim().is_empty() {
                    offer.store = source.name.clone();
                }
                if offer.normalized_name.is_none() {
                    offer.normalized_name = Some(normalize_text(&offer.name));
                }
                offer
            })
            .collect();

        info!(
            "{}: {} results in {:.2}s",
            source.name,
            offers.len(),
            started.elapsed().as_secs_f64()
        );
        offers
    }
}

fn spawn_search(
    source: &ActiveSource,
    query: &str,
) -> JoinHandle<Result<Vec<Offer>, SourceError>> {
    let inner = source.inner.clone();
    let query = query.to_string();
    tokio::spawn(async move { inner.search(&query).await })
}

fn malformed(offer: &Offer) -> Option<String> {
    if offer.name.trim().is_empty() {
        return Some("offer without a name".to_string());
    }
    match offer.price {
        Some(p) if p < Decimal::ZERO => Some(format!("negative price {} for '{}'", p, offer.name)),
        _ => None,
    }
}
