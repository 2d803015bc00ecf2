// Matching module: spec construction, category rules and offer scoring.

pub mod rules;
pub mod scorer;
pub mod spec;

pub use rules::{CategoryRuleEngine, MatchedRules, RuleMatch};
pub use scorer::{Explanation, MatchOutcome, OfferScorer, ScoreBreakdown};
pub use spec::{ProductSpec, ProductSpecBuilder};
