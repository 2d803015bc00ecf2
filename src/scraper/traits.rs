use crate::model::{Offer, SourceError};

/// A retail source that can list candidate offers for a text query.
#[async_trait::async_trait]
pub trait OfferSource: Send + Sync {
    /// Stable identifier, also used as `Offer::store` when a listing omits it.
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<Offer>, SourceError>;
}
