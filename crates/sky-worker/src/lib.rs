//! The worker pool: per-provider scoring, escalation/overdrive dispatch,
//! cooperative cancellation, and the stats aggregator.

pub mod error;
pub mod pool;
pub mod score;
pub mod stats;

pub use error::{WorkerError, WorkerResult};
pub use pool::{Worker, WorkerPool};
pub use score::{Health, LatencyEstimator};
pub use stats::{StatEvent, StatsAggregator};
