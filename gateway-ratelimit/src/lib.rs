pub mod algorithm;
pub mod evaluator;
pub mod key;

pub use algorithm::RateLimitState;
pub use evaluator::{RateLimitDecision, RateLimitEvaluator};
pub use key::KeyContext;
