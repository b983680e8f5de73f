pub(crate) mod freshness_checker;
pub mod narrow_phase;
pub mod pair_cache;

pub use narrow_phase::{FlushSummary, NarrowPhase};
pub use pair_cache::{CollidablePair, PairCache, PairCacheEntry};
