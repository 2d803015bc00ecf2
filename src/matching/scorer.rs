use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::ScoringWeights;
use crate::matching::rules::CategoryRuleEngine;
use crate::matching::spec::ProductSpec;
use crate::model::{Offer, ScoredOffer};
use crate::normalizer::normalize_text;

/// Result of ranking one pool of offers against one spec.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub best: Option<ScoredOffer>,
    pub ranked: Vec<ScoredOffer>,
    pub offers_scanned: usize,
    pub offers_passed_filter: usize,
}

/// Score components for a single offer, for debugging rankings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub category: f64,
    pub brand: f64,
    pub variants: f64,
    pub token_overlap: f64,
    pub price_bonus: f64,
    pub penalty: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.category + self.brand + self.variants + self.token_overlap + self.price_bonus
            + self.penalty
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Explanation {
    Rejected { category: String, term: String },
    Scored { score: f64, breakdown: ScoreBreakdown },
}

#[derive(Debug, Clone)]
pub struct OfferScorer {
    rules: Arc<CategoryRuleEngine>,
    weights: ScoringWeights,
}

impl OfferScorer {
    pub fn new(rules: Arc<CategoryRuleEngine>, weights: ScoringWeights) -> Self {
        Self { rules, weights }
    }

    /// First forbidden term of any matched category found in `blob`.
    ///
    /// Matching is by substring, so a term also hits inside longer words.
    fn hard_reject(&self, spec: &ProductSpec, blob: &str) -> Option<(String, String)> {
        for code in spec.matched_rules.keys() {
            let Some(terms) = self.rules.get(code) else {
                continue;
            };
            if let Some(term) = terms.forbidden.iter().find(|t| blob.contains(t.as_str())) {
                return Some((code.clone(), term.clone()));
            }
        }
        None
    }

    pub fn is_rejected(&self, spec: &ProductSpec, offer: &Offer) -> bool {
        self.hard_reject(spec, &offer.search_blob()).is_some()
    }

    fn breakdown(
        &self,
        spec: &ProductSpec,
        offer: &Offer,
        blob: &str,
        price_rank: f64,
    ) -> ScoreBreakdown {
        let w = &self.weights;

        let category = if spec.matched_rules.is_empty() {
            0.0
        } else {
            let declared = offer
                .category
                .as_deref()
                .map(normalize_text)
                .unwrap_or_default();
            let declared_match = !declared.is_empty()
                && spec.matched_rules.keys().any(|code| declared.contains(code.as_str()));
            if declared_match { w.category } else { w.category * 0.6 }
        };

        let brand = match &spec.brand {
            Some(b) if blob.contains(b.as_str()) => w.brand,
            _ => 0.0,
        };

        let variant_hits = spec
            .variants
            .iter()
            .filter(|v| !v.is_empty() && blob.contains(v.as_str()))
            .count();

        let words: HashSet<&str> = blob.split(' ').collect();
        let overlap = spec
            .tokens
            .iter()
            .filter(|t| words.contains(t.as_str()))
            .count();

        let mut penalty = 0.0;
        for code in spec.matched_rules.keys() {
            if let Some(terms) = self.rules.get(code) {
                let found = terms.forbidden.iter().filter(|t| blob.contains(t.as_str())).count();
                penalty += found as f64 * w.irrelevant_penalty;
            }
        }

        ScoreBreakdown {
            category,
            brand,
            variants: variant_hits as f64 * w.variant,
            token_overlap: overlap as f64 * w.token_overlap,
            price_bonus: price_rank * w.price_bonus,
            penalty,
        }
    }

    /// Hard-filters, scores and ranks `offers`.
    ///
    /// Ranking is score descending, then price ascending with unpriced offers
    /// last, then input order.
    pub fn rank(&self, spec: &ProductSpec, offers: &[Offer], top_k: usize) -> MatchOutcome {
        let offers_scanned = offers.len();

        let survivors: Vec<(usize, &Offer, String)> = offers
            .iter()
            .enumerate()
            .filter_map(|(idx, offer)| {
                let blob = offer.search_blob();
                match self.hard_reject(spec, &blob) {
                    Some((code, term)) => {
                        debug!("Rejected '{}' ({}): forbidden '{}'", offer.name, code, term);
                        None
                    }
                    None => Some((idx, offer, blob)),
                }
            })
            .collect();

        if survivors.is_empty() {
            return MatchOutcome {
                best: None,
                ranked: Vec::new(),
                offers_scanned,
                offers_passed_filter: 0,
            };
        }

        // Cheaper offers earn a larger share of the price bonus.
        let mut by_price: Vec<usize> = (0..survivors.len()).collect();
        by_price.sort_by(|&a, &b| compare_price(survivors[a].1, survivors[b].1));
        let pool = survivors.len() as f64;
        let mut price_rank = vec![0.0; survivors.len()];
        for (position, &i) in by_price.iter().enumerate() {
            price_rank[i] = (pool - position as f64) / pool;
        }

        let mut scored: Vec<(usize, ScoredOffer)> = survivors
            .iter()
            .zip(price_rank)
            .map(|((idx, offer, blob), rank)| {
                let score = self.breakdown(spec, offer, blob, rank).total();
                (
                    *idx,
                    ScoredOffer {
                        offer: (*offer).clone(),
                        score,
                    },
                )
            })
            .collect();

        scored.sort_by(|(ia, a), (ib, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| compare_price(&a.offer, &b.offer))
                .then_with(|| ia.cmp(ib))
        });

        let offers_passed_filter = scored.len();
        let best = scored.first().map(|(_, s)| s.clone());
        let ranked = scored.into_iter().take(top_k).map(|(_, s)| s).collect();

        MatchOutcome {
            best,
            ranked,
            offers_scanned,
            offers_passed_filter,
        }
    }

    /// Why `offer` would be rejected, or how its score is made up.
    ///
    /// The price bonus uses a neutral rank of 0.5 since no pool is given.
    pub fn explain(&self, spec: &ProductSpec, offer: &Offer) -> Explanation {
        let blob = offer.search_blob();
        if let Some((category, term)) = self.hard_reject(spec, &blob) {
            return Explanation::Rejected { category, term };
        }
        let breakdown = self.breakdown(spec, offer, &blob, 0.5);
        Explanation::Scored {
            score: breakdown.total(),
            breakdown,
        }
    }
}

fn compare_price(a: &Offer, b: &Offer) -> Ordering {
    match (a.price, b.price) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
