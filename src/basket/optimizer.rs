use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::basket::catalog::{Catalog, ProductId, StoreId};
use crate::model::CatalogError;
use crate::normalizer::TextNormalizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemAssignment {
    pub name: String,
    pub store: String,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreTotal {
    pub store: String,
    pub total: Decimal,
}

/// Cheapest store per item, plus the best single-store basket total.
///
/// `store_totals` lists every resolved store in request order, including
/// stores that won no item (total zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketAssignment {
    pub items: Vec<ItemAssignment>,
    pub store_totals: Vec<StoreTotal>,
    pub overall_total: Decimal,
    pub unmatched: Vec<String>,
}

impl BasketAssignment {
    fn all_unmatched(items: &[String]) -> Self {
        Self {
            items: Vec::new(),
            store_totals: Vec::new(),
            overall_total: Decimal::ZERO,
            unmatched: items.to_vec(),
        }
    }

    pub fn store_total(&self, store: &str) -> Option<Decimal> {
        self.store_totals
            .iter()
            .find(|t| t.store == store)
            .map(|t| t.total)
    }

    pub fn assignment(&self, item: &str) -> Option<&ItemAssignment> {
        self.items.iter().find(|a| a.name == item)
    }
}

struct ResolvedStore {
    id: StoreId,
    label: String,
}

#[derive(Debug, Clone)]
pub struct BasketOptimizer {
    normalizer: Arc<TextNormalizer>,
}

impl BasketOptimizer {
    pub fn new(normalizer: Arc<TextNormalizer>) -> Self {
        Self { normalizer }
    }

    /// Assigns each requested item to its cheapest requested store.
    ///
    /// Items are processed in request order. A price tie goes to the store
    /// with the lowest running subtotal so far, then the lowest store id.
    /// Unknown stores are dropped silently; unknown or unpriced items end up
    /// in `unmatched`.
    pub fn compare<C>(
        &self,
        items: &[String],
        stores: &[String],
        catalog: &C,
    ) -> Result<BasketAssignment, CatalogError>
    where
        C: Catalog + ?Sized,
    {
        let mut products: Vec<Option<ProductId>> = Vec::with_capacity(items.len());
        for item in items {
            let id = catalog.resolve_item(&self.normalizer.normalize(item))?;
            if id.is_none() {
                debug!("Item '{}' not in catalog", item);
            }
            products.push(id);
        }

        let mut resolved: Vec<ResolvedStore> = Vec::new();
        for store in stores {
            match catalog.resolve_store(&self.normalizer.normalize_plain(store))? {
                Some(id) if !resolved.iter().any(|s| s.id == id) => resolved.push(ResolvedStore {
                    id,
                    label: store.clone(),
                }),
                Some(_) => {}
                None => debug!("Dropping unknown store '{}'", store),
            }
        }

        if resolved.is_empty() {
            info!("No requested store is known; {} items unmatched", items.len());
            return Ok(BasketAssignment::all_unmatched(items));
        }

        let mut product_ids: Vec<ProductId> = products.iter().flatten().copied().collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let store_ids: Vec<StoreId> = resolved.iter().map(|s| s.id).collect();

        let mut matrix: HashMap<(ProductId, StoreId), Decimal> = HashMap::new();
        if !product_ids.is_empty() {
            for row in catalog.prices_for(&product_ids, &store_ids)? {
                matrix
                    .entry((row.product_id, row.store_id))
                    .and_modify(|p| *p = (*p).min(row.price))
                    .or_insert(row.price);
            }
        }

        let mut running: Vec<Decimal> = vec![Decimal::ZERO; resolved.len()];
        let mut assigned: Vec<ItemAssignment> = Vec::new();
        let mut assigned_products: Vec<ProductId> = Vec::new();
        let mut unmatched: Vec<String> = Vec::new();

        for (item, product) in items.iter().zip(&products) {
            let Some(product) = *product else {
                unmatched.push(item.clone());
                continue;
            };

            let candidates: Vec<(usize, Decimal)> = resolved
                .iter()
                .enumerate()
                .filter_map(|(i, s)| matrix.get(&(product, s.id)).map(|p| (i, *p)))
                .collect();

            let Some(min_price) = candidates.iter().map(|(_, p)| *p).min() else {
                debug!("Item '{}' has no price at the requested stores", item);
                unmatched.push(item.clone());
                continue;
            };

            let winner = candidates
                .iter()
                .filter(|(_, p)| *p == min_price)
                .map(|(i, _)| *i)
                .min_by(|&a, &b| {
                    running[a]
                        .cmp(&running[b])
                        .then_with(|| resolved[a].id.cmp(&resolved[b].id))
                });
            let Some(winner) = winner else {
                unmatched.push(item.clone());
                continue;
            };

            running[winner] += min_price;
            assigned_products.push(product);
            assigned.push(ItemAssignment {
                name: item.clone(),
                store: resolved[winner].label.clone(),
                price: min_price,
            });
        }

        let store_totals: Vec<StoreTotal> = resolved
            .iter()
            .zip(&running)
            .map(|(s, total)| StoreTotal {
                store: s.label.clone(),
                total: *total,
            })
            .collect();

        let overall_total = if assigned_products.is_empty() {
            Decimal::ZERO
        } else {
            resolved
                .iter()
                .filter_map(|s| {
                    assigned_products
                        .iter()
                        .map(|p| matrix.get(&(*p, s.id)).copied())
                        .sum::<Option<Decimal>>()
                })
                .filter(|total| *total > Decimal::ZERO)
                .min()
                .unwrap_or(Decimal::ZERO)
        };

        info!(
            "Compared {} items across {} stores: {} assigned, {} unmatched, overall {}",
            items.len(),
            resolved.len(),
            assigned.len(),
            unmatched.len(),
            overall_total
        );

        Ok(BasketAssignment {
            items: assigned,
            store_totals,
            overall_total,
            unmatched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basket::catalog::PriceRow;
    use crate::config::MatchingConfig;
    use rust_decimal_macros::dec;

    #[derive(Default)]
    struct MemoryCatalog {
        products: Vec<(String, ProductId)>,
        stores: Vec<(String, StoreId)>,
        prices: Vec<PriceRow>,
    }

    impl MemoryCatalog {
        fn product(mut self, name: &str, id: ProductId) -> Self {
            self.products.push((name.to_string(), id));
            self
        }

        fn store(mut self, name: &str, id: StoreId) -> Self {
            self.stores.push((name.to_string(), id));
            self
        }

        fn price(mut self, product_id: ProductId, store_id: StoreId, price: Decimal) -> Self {
            self.prices.push(PriceRow {
                product_id,
                store_id,
                price,
            });
            self
        }
    }

    impl Catalog for MemoryCatalog {
        fn resolve_item(&self, name: &str) -> Result<Option<ProductId>, CatalogError> {
            Ok(self.products.iter().find(|(n, _)| n == name).map(|(_, id)| *id))
        }

        fn resolve_store(&self, name: &str) -> Result<Option<StoreId>, CatalogError> {
            Ok(self.stores.iter().find(|(n, _)| n == name).map(|(_, id)| *id))
        }

        fn prices_for(
            &self,
            products: &[ProductId],
            stores: &[StoreId],
        ) -> Result<Vec<PriceRow>, CatalogError> {
            Ok(self
                .prices
                .iter()
                .filter(|r| products.contains(&r.product_id) && stores.contains(&r.store_id))
                .copied()
                .collect())
        }
    }

    const WALMART: StoreId = 1;
    const TARGET: StoreId = 2;
    const KROGER: StoreId = 3;
    const MILK: ProductId = 10;
    const BREAD: ProductId = 11;
    const EGGS: ProductId = 12;
    const BUTTER: ProductId = 13;

    fn optimizer() -> BasketOptimizer {
        BasketOptimizer::new(Arc::new(TextNormalizer::new(&MatchingConfig::default().synonyms)))
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn grocery_catalog() -> MemoryCatalog {
        MemoryCatalog::default()
            .store("walmart", WALMART)
            .store("target", TARGET)
            .store("kroger", KROGER)
            .product("milk", MILK)
            .product("bread", BREAD)
            .product("eggs", EGGS)
            .product("butter", BUTTER)
            .price(MILK, WALMART, dec!(2.99))
            .price(MILK, TARGET, dec!(2.49))
            .price(MILK, KROGER, dec!(2.79))
            .price(BREAD, WALMART, dec!(1.99))
            .price(BREAD, TARGET, dec!(2.19))
            .price(BREAD, KROGER, dec!(1.89))
            .price(EGGS, WALMART, dec!(3.49))
            .price(EGGS, TARGET, dec!(3.29))
            .price(EGGS, KROGER, dec!(3.69))
    }

    #[test]
    fn picks_cheapest_store_per_item() {
        let result = optimizer()
            .compare(
                &strings(&["Milk", "Bread", "Eggs"]),
                &strings(&["Walmart", "Target", "Kroger"]),
                &grocery_catalog(),
            )
            .unwrap();

        assert!(result.unmatched.is_empty());
        assert_eq!(result.assignment("Milk").unwrap().store, "Target");
        assert_eq!(result.assignment("Bread").unwrap().store, "Kroger");
        assert_eq!(result.assignment("Eggs").unwrap().price, dec!(3.29));
        assert_eq!(result.store_total("Target"), Some(dec!(5.78)));
        assert_eq!(result.store_total("Kroger"), Some(dec!(1.89)));
        assert_eq!(result.store_total("Walmart"), Some(dec!(0)));
        // Target: 2.49 + 2.19 + 3.29
        assert_eq!(result.overall_total, dec!(7.97));
    }

    #[test]
    fn tie_goes_to_lower_running_subtotal() {
        let catalog = MemoryCatalog::default()
            .store("walmart", WALMART)
            .store("target", TARGET)
            .product("milk", MILK)
            .product("butter", BUTTER)
            .price(MILK, TARGET, dec!(2.49))
            .price(BUTTER, WALMART, dec!(4.00))
            .price(BUTTER, TARGET, dec!(4.00));

        let result = optimizer()
            .compare(&strings(&["Milk", "Butter"]), &strings(&["Walmart", "Target"]), &catalog)
            .unwrap();

        assert_eq!(result.assignment("Milk").unwrap().store, "Target");
        let butter = result.assignment("Butter").unwrap();
        assert_eq!(butter.store, "Walmart");
        assert_eq!(butter.price, dec!(4.00));
        assert_eq!(result.store_total("Target"), Some(dec!(2.49)));
        assert_eq!(result.store_total("Walmart"), Some(dec!(4.00)));
    }

    #[test]
    fn equal_subtotals_fall_back_to_store_id() {
        let catalog = MemoryCatalog::default()
            .store("b store", 7)
            .store("a store", 9)
            .product("salt", 1)
            .price(1, 7, dec!(0.50))
            .price(1, 9, dec!(0.50));
        let result = optimizer()
            .compare(&strings(&["Salt"]), &strings(&["A Store", "B Store"]), &catalog)
            .unwrap();
        assert_eq!(result.items[0].store, "B Store");
    }

    #[test]
    fn reordering_items_moves_ties_but_not_prices() {
        let catalog = MemoryCatalog::default()
            .store("walmart", WALMART)
            .store("target", TARGET)
            .product("milk", MILK)
            .product("butter", BUTTER)
            .price(MILK, TARGET, dec!(2.49))
            .price(BUTTER, WALMART, dec!(4.00))
            .price(BUTTER, TARGET, dec!(4.00));
        let stores = strings(&["Walmart", "Target"]);

        let forward = optimizer().compare(&strings(&["Milk", "Butter"]), &stores, &catalog).unwrap();
        let reverse = optimizer().compare(&strings(&["Butter", "Milk"]), &stores, &catalog).unwrap();

        assert_eq!(forward.assignment("Butter").unwrap().store, "Walmart");
        // Butter first: both subtotals are zero, Walmart has the lower id.
        assert_eq!(reverse.assignment("Butter").unwrap().store, "Walmart");

        let mut a: Vec<Decimal> = forward.items.iter().map(|i| i.price).collect();
        let mut b: Vec<Decimal> = reverse.items.iter().map(|i| i.price).collect();
        a.sort();
        b.sort();
        assert_eq!(a, b);
        assert_eq!(forward.unmatched, reverse.unmatched);
    }

    #[test]
    fn unknown_items_and_unpriced_items_are_unmatched_in_request_order() {
        let catalog = grocery_catalog().product("caviar", 99);
        let result = optimizer()
            .compare(
                &strings(&["Caviar", "Milk", "NonexistentProduct", "Bread"]),
                &strings(&["Walmart", "Target", "Kroger"]),
                &catalog,
            )
            .unwrap();
        assert_eq!(result.unmatched, vec!["Caviar", "NonexistentProduct"]);
        let names: Vec<&str> = result.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Bread"]);
    }

    #[test]
    fn unknown_store_is_silently_dropped() {
        let items = strings(&["Milk", "Bread"]);
        let optimizer = optimizer();
        let catalog = grocery_catalog();
        let with_ghost = optimizer
            .compare(&items, &strings(&["Walmart", "Ghostmart"]), &catalog)
            .unwrap();
        let without = optimizer.compare(&items, &strings(&["Walmart"]), &catalog).unwrap();
        assert_eq!(with_ghost, without);
    }

    #[test]
    fn no_known_store_leaves_everything_unmatched() {
        let items = strings(&["Milk", "Bread"]);
        let result = optimizer()
            .compare(&items, &strings(&["Ghostmart"]), &grocery_catalog())
            .unwrap();
        assert_eq!(result.unmatched, items);
        assert!(result.items.is_empty());
        assert!(result.store_totals.is_empty());
        assert_eq!(result.overall_total, Decimal::ZERO);
    }

    #[test]
    fn duplicate_price_rows_keep_minimum() {
        let catalog = MemoryCatalog::default()
            .store("dia", 1)
            .product("pan", 5)
            .price(5, 1, dec!(1.20))
            .price(5, 1, dec!(0.95))
            .price(5, 1, dec!(1.10));
        let result = optimizer()
            .compare(&strings(&["Pan"]), &strings(&["Dia"]), &catalog)
            .unwrap();
        assert_eq!(result.items[0].price, dec!(0.95));
    }

    #[test]
    fn overall_total_is_best_complete_single_store_basket() {
        let catalog = MemoryCatalog::default()
            .store("a", 1)
            .store("b", 2)
            .product("x", 10)
            .product("y", 11)
            .price(10, 1, dec!(1.00))
            .price(11, 1, dec!(4.00))
            .price(10, 2, dec!(2.00))
            .price(11, 2, dec!(2.50));
        let result = optimizer()
            .compare(&strings(&["X", "Y"]), &strings(&["A", "B"]), &catalog)
            .unwrap();

        // Greedy split: X at A, Y at B.
        assert_eq!(result.assignment("X").unwrap().store, "A");
        assert_eq!(result.assignment("Y").unwrap().store, "B");
        // A complete = 5.00, B complete = 4.50
        assert_eq!(result.overall_total, dec!(4.50));
    }

    #[test]
    fn incomplete_stores_do_not_count_for_overall_total() {
        let catalog = MemoryCatalog::default()
            .store("a", 1)
            .store("b", 2)
            .product("x", 10)
            .product("y", 11)
            .price(10, 1, dec!(1.00))
            .price(11, 2, dec!(2.00));
        let result = optimizer()
            .compare(&strings(&["X", "Y"]), &strings(&["A", "B"]), &catalog)
            .unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.overall_total, Decimal::ZERO);
    }

    #[test]
    fn synonyms_apply_to_items_only() {
        let catalog = MemoryCatalog::default()
            .store("rocket", 1)
            .product("bell pepper", 3)
            .price(3, 1, dec!(0.80));
        let result = optimizer()
            .compare(&strings(&["Capsicum"]), &strings(&["Rocket"]), &catalog)
            .unwrap();
        assert_eq!(result.items[0].store, "Rocket");
        assert_eq!(result.items[0].price, dec!(0.80));
    }

    #[test]
    fn compare_is_deterministic() {
        let items = strings(&["Eggs", "Milk", "Bread", "Milk"]);
        let stores = strings(&["Kroger", "Walmart", "Target"]);
        let catalog = grocery_catalog();
        let first = optimizer().compare(&items, &stores, &catalog).unwrap();
        let second = optimizer().compare(&items, &stores, &catalog).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn serializes_to_wire_shape() {
        let result = optimizer()
            .compare(&strings(&["Milk", "Tofu"]), &strings(&["Target"]), &grocery_catalog())
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["items"][0]["name"], "Milk");
        assert_eq!(json["items"][0]["store"], "Target");
        assert_eq!(json["items"][0]["price"], 2.49);
        assert_eq!(json["storeTotals"][0]["store"], "Target");
        assert_eq!(json["overallTotal"], 2.49);
        assert_eq!(json["unmatched"][0], "Tofu");
    }
}
