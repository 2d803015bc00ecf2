use rust_decimal::Decimal;

use crate::model::CatalogError;

pub type ProductId = i64;
pub type StoreId = i64;

/// One stored price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRow {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub price: Decimal,
}

/// Read-only view of products, stores and prices used by the optimizer.
///
/// Lookups take already-normalized names and match them exactly.
pub trait Catalog {
    fn resolve_item(&self, normalized_name: &str) -> Result<Option<ProductId>, CatalogError>;

    fn resolve_store(&self, normalized_name: &str) -> Result<Option<StoreId>, CatalogError>;

    /// All price rows for the given pairs. May contain several rows for the
    /// same (product, store).
    fn prices_for(
        &self,
        products: &[ProductId],
        stores: &[StoreId],
    ) -> Result<Vec<PriceRow>, CatalogError>;
}

impl<T: Catalog + ?Sized> Catalog for &T {
    fn resolve_item(&self, normalized_name: &str) -> Result<Option<ProductId>, CatalogError> {
        (**self).resolve_item(normalized_name)
    }

    fn resolve_store(&self, normalized_name: &str) -> Result<Option<StoreId>, CatalogError> {
        (**self).resolve_store(normalized_name)
    }

    fn prices_for(
        &self,
        products: &[ProductId],
        stores: &[StoreId],
    ) -> Result<Vec<PriceRow>, CatalogError> {
        (**self).prices_for(products, stores)
    }
}
