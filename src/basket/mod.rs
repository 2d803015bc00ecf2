// Basket module: catalog seam and the store-assignment optimizer.

pub mod catalog;
pub mod optimizer;

pub use catalog::{Catalog, PriceRow, ProductId, StoreId};
pub use optimizer::{BasketAssignment, BasketOptimizer, ItemAssignment, StoreTotal};
