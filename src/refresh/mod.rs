// Refresh workflow: spec -> sources -> scorer -> catalog, one shopping list at a time.

pub mod worker;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::basket::{BasketAssignment, BasketOptimizer};
use crate::config::{AppConfig, RetryConfig, ShoppingItemConfig, ShoppingListConfig};
use crate::matching::{CategoryRuleEngine, OfferScorer, ProductSpec, ProductSpecBuilder};
use crate::model::{CatalogError, Offer, ScoredOffer};
use crate::normalizer::TextNormalizer;
use crate::scraper::SourceAggregator;
use crate::storage::SqliteCatalog;

pub use worker::{RefreshWorker, StopSignal, stop_channel};

#[derive(Debug, Clone, Serialize)]
pub struct ItemRefresh {
    pub name: String,
    pub query: String,
    pub attempts: u32,
    pub offers_count: usize,
    pub offers_passed_filter: usize,
    pub selected: Option<ScoredOffer>,
    pub ranked: Vec<ScoredOffer>,
    pub spec: ProductSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemError {
    pub item: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub list: String,
    pub updated_items: usize,
    pub items: Vec<ItemRefresh>,
    pub errors: Vec<ItemError>,
    pub cancelled: bool,
    pub refreshed_at: DateTime<Utc>,
}

/// Owns the matching building blocks and runs them for shopping lists.
pub struct RefreshService {
    normalizer: Arc<TextNormalizer>,
    builder: ProductSpecBuilder,
    scorer: OfferScorer,
    optimizer: BasketOptimizer,
    aggregator: Arc<SourceAggregator>,
    catalog: Arc<Mutex<SqliteCatalog>>,
    retry: RetryConfig,
    top_k: usize,
}

impl RefreshService {
    pub fn new(
        config: &AppConfig,
        aggregator: Arc<SourceAggregator>,
        catalog: Arc<Mutex<SqliteCatalog>>,
    ) -> Self {
        let normalizer = Arc::new(TextNormalizer::new(&config.matching.synonyms));
        let rules = Arc::new(CategoryRuleEngine::new(&config.matching.categories));
        Self {
            builder: ProductSpecBuilder::new(normalizer.clone(), rules.clone()),
            scorer: OfferScorer::new(rules, config.matching.weights.clone()),
            optimizer: BasketOptimizer::new(normalizer.clone()),
            normalizer,
            aggregator,
            catalog,
            retry: config.retry.clone(),
            top_k: config.top_k,
        }
    }

    pub fn catalog(&self) -> Arc<Mutex<SqliteCatalog>> {
        self.catalog.clone()
    }

    pub async fn refresh_list(&self, list: &ShoppingListConfig, stop: &StopSignal) -> RefreshSummary {
        info!("Refreshing list '{}' ({} items)", list.name, list.items.len());
        let mut summary = RefreshSummary {
            list: list.name.clone(),
            updated_items: 0,
            items: Vec::new(),
            errors: Vec::new(),
            cancelled: false,
            refreshed_at: Utc::now(),
        };

        for item in &list.items {
            if stop.is_stopped() {
                summary.cancelled = true;
                break;
            }

            let refreshed = self.refresh_item(item, stop).await;
            if let Some(best) = &refreshed.selected {
                match self.record(item, &best.offer).await {
                    Ok(true) => summary.updated_items += 1,
                    Ok(false) => info!("'{}': best offer has no price, not recorded", item.name),
                    Err(e) => {
                        warn!("'{}': catalog update failed: {}", item.name, e);
                        summary.errors.push(ItemError {
                            item: item.name.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
            summary.items.push(refreshed);
        }

        summary.cancelled = stop.is_stopped();
        summary.refreshed_at = Utc::now();
        info!(
            "List '{}' refreshed: {} updated, {} errors",
            list.name,
            summary.updated_items,
            summary.errors.len()
        );
        summary
    }

    async fn refresh_item(&self, item: &ShoppingItemConfig, stop: &StopSignal) -> ItemRefresh {
        let spec = self.builder.build(
            &item.name,
            item.brand.as_deref(),
            item.category.as_deref(),
            &item.variants,
        );
        let query = spec.search_query();
        let (offers, attempts) = self.fetch_with_retry(&query, stop).await;

        let outcome = self.scorer.rank(&spec, &offers, self.top_k);
        match &outcome.best {
            Some(best) => info!(
                "'{}': best '{}' at {} ({:?}), score {:.2}",
                item.name, best.offer.name, best.offer.store, best.offer.price, best.score
            ),
            None => info!("'{}': no acceptable offer among {}", item.name, offers.len()),
        }

        ItemRefresh {
            name: item.name.clone(),
            query,
            attempts,
            offers_count: outcome.offers_scanned,
            offers_passed_filter: outcome.offers_passed_filter,
            selected: outcome.best,
            ranked: outcome.ranked,
            spec,
        }
    }

    /// Queries the sources, retrying with backoff while nothing comes back.
    async fn fetch_with_retry(&self, query: &str, stop: &StopSignal) -> (Vec<Offer>, u32) {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let offers = self.aggregator.get_offers_until(query, stop.stopped()).await;
            if !offers.is_empty() || attempt >= max_attempts || stop.is_stopped() {
                return (offers, attempt);
            }

            let delay = backoff_delay(&self.retry, attempt);
            warn!(
                "No offers for '{}' (attempt {}/{}), retrying in {:?}",
                query, attempt, max_attempts, delay
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = stop.stopped() => return (offers, attempt),
            }
            attempt += 1;
        }
    }

    async fn record(&self, item: &ShoppingItemConfig, offer: &Offer) -> Result<bool, CatalogError> {
        let normalized = self.normalizer.normalize(&item.name);
        let mut catalog = self.catalog.lock().await;
        catalog.record_offer(&item.name, &normalized, item.category.as_deref(), offer)
    }

    /// Basket comparison of the list's items over its stores, or over every
    /// configured source when the list names none.
    pub async fn compare_list(
        &self,
        list: &ShoppingListConfig,
    ) -> Result<BasketAssignment, CatalogError> {
        let items: Vec<String> = list.items.iter().map(|i| i.name.clone()).collect();
        let stores: Vec<String> = if list.stores.is_empty() {
            self.aggregator
                .source_names()
                .into_iter()
                .map(str::to_string)
                .collect()
        } else {
            list.stores.clone()
        };

        let catalog = self.catalog.lock().await;
        self.optimizer.compare(&items, &stores, &*catalog)
    }
}

/// Exponential backoff with up to one base delay of random jitter.
fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let base = retry.base_delay_ms;
    let exp = base.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    let jitter = if base == 0 { 0 } else { rand::rng().random_range(0..=base) };
    Duration::from_millis(exp.saturating_add(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_stays_jittered() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_delay_ms: 100,
        };
        for attempt in 1..=4u32 {
            let delay = backoff_delay(&retry, attempt).as_millis() as u64;
            let floor = 100 * (1 << (attempt - 1));
            assert!(delay >= floor && delay <= floor + 100, "attempt {attempt}: {delay}");
        }
    }

    #[test]
    fn zero_base_means_no_wait() {
        let retry = RetryConfig {
            max_attempts: 2,
            base_delay_ms: 0,
        };
        assert_eq!(backoff_delay(&retry, 3), Duration::ZERO);
    }
}
