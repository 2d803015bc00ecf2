use std::sync::Arc;

use crate::model::SourceError;
use crate::scraper::traits::OfferSource;

pub type SourceFactory =
    Box<dyn Fn() -> Result<Arc<dyn OfferSource>, SourceError> + Send + Sync>;

/// Name to constructor table, filled once at start-up and handed to the
/// aggregator.
#[derive(Default)]
pub struct SourceRegistry {
    factories: Vec<(String, SourceFactory)>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under the lowercased `name`, replacing any
    /// earlier registration with that name.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn OfferSource>, SourceError> + Send + Sync + 'static,
    {
        let key = name.trim().to_lowercase();
        let boxed: SourceFactory = Box::new(factory);
        match self.factories.iter_mut().find(|(n, _)| *n == key) {
            Some(slot) => slot.1 = boxed,
            None => self.factories.push((key, boxed)),
        }
    }

    /// Registers an already-built source.
    pub fn register_source(&mut self, source: Arc<dyn OfferSource>) {
        let name = source.name().to_string();
        self.register(&name, move || Ok(source.clone()));
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.factories.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = name.trim().to_lowercase();
        self.factories.iter().any(|(n, _)| *n == key)
    }

    /// Builds the source registered as `name`, or `None` if unknown.
    pub fn create(&self, name: &str) -> Option<Result<Arc<dyn OfferSource>, SourceError>> {
        let key = name.trim().to_lowercase();
        self.factories
            .iter()
            .find(|(n, _)| *n == key)
            .map(|(_, factory)| factory())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Offer;

    struct Named(&'static str);

    #[async_trait::async_trait]
    impl OfferSource for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(&self, _query: &str) -> Result<Vec<Offer>, SourceError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn names_are_case_insensitive_and_ordered() {
        let mut registry = SourceRegistry::new();
        registry.register_source(Arc::new(Named("Mercadona")));
        registry.register_source(Arc::new(Named("dia")));
        assert_eq!(registry.names(), vec!["mercadona", "dia"]);
        assert!(registry.contains("MERCADONA"));
        assert!(registry.create("Dia").is_some());
        assert!(registry.create("ghost").is_none());
    }

    #[test]
    fn re_registering_replaces_factory() {
        let mut registry = SourceRegistry::new();
        registry.register("lidl", || Err(SourceError::Timeout));
        registry.register_source(Arc::new(Named("lidl")));
        assert_eq!(registry.len(), 1);
        assert!(matches!(registry.create("lidl"), Some(Ok(_))));
    }
}
