use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use sky_primitives::{Cost, Hash, RequestBudget};
use sky_provider::ProviderClient;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::score::{score, Health, LatencyEstimator};

/// How much longer than the latency estimate the pool waits before
/// escalating a still-outstanding request to a second worker.
const ESCALATION_ALPHA: f64 = 0.5;

pub struct Worker {
    provider: Arc<dyn ProviderClient>,
    latency: LatencyEstimator,
    health: Health,
    in_flight: AtomicUsize,
    queue_limit: usize,
}

impl Worker {
    #[must_use]
    pub fn new(provider: Arc<dyn ProviderClient>, queue_limit: usize) -> Self {
        Self {
            provider,
            latency: LatencyEstimator::default(),
            health: Health::default(),
            in_flight: AtomicUsize::new(0),
            queue_limit,
        }
    }

    fn is_below_queue_limit(&self) -> bool {
        self.in_flight.load(Ordering::Relaxed) < self.queue_limit
    }

    fn score(&self, expected_cost: Cost, price_per_ms: Cost) -> f64 {
        score(
            expected_cost,
            self.latency.estimate(),
            price_per_ms,
            self.health.value(),
        )
    }
}

/// One worker per healthy provider session. Dispatches download-by-root
/// requests, racing and escalating across workers by score and overdrive
/// budget.
pub struct WorkerPool {
    workers: Vec<Arc<Worker>>,
    health_threshold: f64,
    max_overdrive: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ProviderClient>>, queue_limit: usize) -> Self {
        Self {
            workers: providers
                .into_iter()
                .map(|p| Arc::new(Worker::new(p, queue_limit)))
                .collect(),
            health_threshold: 0.1,
            max_overdrive: 3,
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn healthy_worker_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.health.is_healthy(self.health_threshold))
            .count()
    }

    /// Ranks currently-eligible workers (healthy, under their queue limit)
    /// best-scoring first for a request of `expected_cost` at `price_per_ms`.
    fn ranked_candidates(&self, expected_cost: Cost, price_per_ms: Cost) -> Vec<Arc<Worker>> {
        let mut candidates: Vec<_> = self
            .workers
            .iter()
            .filter(|w| w.health.is_healthy(self.health_threshold) && w.is_below_queue_limit())
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            a.score(expected_cost, price_per_ms)
                .total_cmp(&b.score(expected_cost, price_per_ms))
        });
        candidates
    }

    /// Fetches `[offset, offset+length)` of the sector addressed by `root`,
    /// racing and escalating across workers until one succeeds, the deadline
    /// passes, or `cancel` fires.
    pub async fn fetch_root(
        &self,
        root: Hash,
        offset: u32,
        length: u32,
        budget: &RequestBudget,
        cancel: &CancellationToken,
    ) -> WorkerResult<Vec<u8>> {
        let expected_cost = Cost::from(length);
        let candidates = self.ranked_candidates(expected_cost, budget.price_per_ms());
        if candidates.is_empty() {
            return Err(WorkerError::NotEnoughWorkers {
                needed: 1,
                available: self.healthy_worker_count(),
            });
        }

        let mut remaining = candidates.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut errors = Vec::new();
        let mut dispatched = 0usize;

        let dispatch = |worker: Arc<Worker>| {
            let started = tokio::time::Instant::now();
            async move {
                worker.in_flight.fetch_add(1, Ordering::Relaxed);
                let result = worker.provider.read_sector_by_root(root, offset, length).await;
                worker.in_flight.fetch_sub(1, Ordering::Relaxed);
                match &result {
                    Ok(_) => {
                        worker.health.record_success();
                        worker.latency.record(started.elapsed());
                    }
                    Err(_) => worker.health.record_failure(),
                }
                (worker.provider.provider_id(), result)
            }
        };

        if let Some(first) = remaining.next() {
            let next_escalation = first.latency.estimate().mul_f64(1.0 + ESCALATION_ALPHA);
            in_flight.push(dispatch(first));
            dispatched += 1;

            loop {
                let escalation_timer = sleep(next_escalation);
                tokio::select! {
                    () = cancel.cancelled() => return Err(WorkerError::Cancelled),
                    () = sleep(budget.time_left()) => return Err(WorkerError::Timeout),
                    Some((provider_id, outcome)) = in_flight.next() => {
                        match outcome {
                            Ok(bytes) => return Ok(bytes),
                            Err(err) => {
                                warn!(%provider_id, %err, "worker failed, awaiting remaining candidates");
                                errors.push(err.to_string());
                                if in_flight.is_empty() && remaining.len() == 0 {
                                    return Err(WorkerError::AllFailed(errors.join("; ")));
                                }
                            }
                        }
                    }
                    () = escalation_timer, if dispatched < self.max_overdrive => {
                        if let Some(next) = remaining.next() {
                            debug!(dispatched, "escalating to a second worker");
                            in_flight.push(dispatch(next));
                            dispatched += 1;
                        }
                    }
                }
            }
        } else {
            Err(WorkerError::NotEnoughWorkers {
                needed: 1,
                available: 0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use sky_primitives::PublicKey;
    use sky_provider::client::memory::MemoryProvider;
    use sky_provider::PriceTable;

    use super::*;

    fn price() -> PriceTable {
        PriceTable {
            read_cost_per_byte: 1,
            write_cost_per_byte: 1,
            read_base_cost: 0,
            write_base_cost: 0,
            registry_read_cost: 0,
            registry_write_cost: 0,
        }
    }

    #[tokio::test]
    async fn fetches_from_the_only_worker() {
        let provider = Arc::new(MemoryProvider::new(PublicKey::new([1u8; 32]), price()));
        let root = provider.write_sector(b"hello world").await.unwrap();

        let pool = WorkerPool::new(vec![provider], 4);
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let bytes = pool
            .fetch_root(root, 0, 5, &budget, &cancel)
            .await
            .unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn no_workers_is_not_enough_workers() {
        let pool = WorkerPool::new(vec![], 4);
        let budget = RequestBudget::unbounded();
        let cancel = CancellationToken::new();

        let err = pool
            .fetch_root(Hash::ZERO, 0, 1, &budget, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::NotEnoughWorkers { .. }));
    }
}
