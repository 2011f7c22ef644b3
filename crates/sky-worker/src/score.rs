use std::time::Duration;

use parking_lot::Mutex;
use sky_primitives::Cost;

/// Exponentially smoothed latency estimate plus a decayed tail-latency
/// estimate, updated from each completed job.
pub struct LatencyEstimator {
    inner: Mutex<LatencyState>,
}

struct LatencyState {
    mean_ms: f64,
    p99_ms: f64,
}

const SMOOTHING_ALPHA: f64 = 0.2;
/// How fast the p99 estimate decays back down after a slow sample; kept slow
/// so a single outlier doesn't get forgotten before the next one arrives.
const P99_DECAY: f64 = 0.05;
const DEFAULT_ESTIMATE_MS: f64 = 200.0;

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self {
            inner: Mutex::new(LatencyState {
                mean_ms: DEFAULT_ESTIMATE_MS,
                p99_ms: DEFAULT_ESTIMATE_MS,
            }),
        }
    }
}

impl LatencyEstimator {
    pub fn record(&self, sample: Duration) {
        let sample_ms = sample.as_secs_f64() * 1000.0;
        let mut state = self.inner.lock();
        state.mean_ms = SMOOTHING_ALPHA * sample_ms + (1.0 - SMOOTHING_ALPHA) * state.mean_ms;
        if sample_ms > state.p99_ms {
            state.p99_ms = sample_ms;
        } else {
            state.p99_ms = P99_DECAY * sample_ms + (1.0 - P99_DECAY) * state.p99_ms;
        }
    }

    #[must_use]
    pub fn estimate(&self) -> Duration {
        Duration::from_secs_f64(self.inner.lock().mean_ms / 1000.0)
    }

    #[must_use]
    pub fn p99(&self) -> Duration {
        Duration::from_secs_f64(self.inner.lock().p99_ms / 1000.0)
    }
}

/// Health decays multiplicatively on failure and recovers additively on
/// success, so a worker that fails repeatedly drops out of rotation quickly
/// but earns its way back in gradually rather than snapping to fully healthy
/// on one lucky response.
pub struct Health {
    value: Mutex<f64>,
}

const FAILURE_DECAY: f64 = 0.5;
const RECOVERY_STEP: f64 = 0.1;
const MIN_HEALTH: f64 = 0.01;

impl Default for Health {
    fn default() -> Self {
        Self {
            value: Mutex::new(1.0),
        }
    }
}

impl Health {
    pub fn record_success(&self) {
        let mut v = self.value.lock();
        *v = (*v + RECOVERY_STEP).min(1.0);
    }

    pub fn record_failure(&self) {
        let mut v = self.value.lock();
        *v = (*v * FAILURE_DECAY).max(MIN_HEALTH);
    }

    #[must_use]
    pub fn value(&self) -> f64 {
        *self.value.lock()
    }

    #[must_use]
    pub fn is_healthy(&self, threshold: f64) -> bool {
        self.value() >= threshold
    }
}

/// `expected_cost + latency_estimate * price_per_ms`, penalized by the
/// inverse of health so a struggling worker sinks in the ranking without
/// being excluded outright while it's still above the health threshold.
#[must_use]
pub fn score(expected_cost: Cost, latency: Duration, price_per_ms: Cost, health: f64) -> f64 {
    let latency_cost = latency.as_secs_f64() * 1000.0 * price_per_ms as f64;
    (expected_cost as f64 + latency_cost) / health.max(MIN_HEALTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_estimate_tracks_samples() {
        let est = LatencyEstimator::default();
        for _ in 0..50 {
            est.record(Duration::from_millis(10));
        }
        assert!(est.estimate() < Duration::from_millis(50));
    }

    #[test]
    fn health_decays_on_failure_and_recovers() {
        let health = Health::default();
        health.record_failure();
        assert!(health.value() < 1.0);
        for _ in 0..20 {
            health.record_success();
        }
        assert!((health.value() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn lower_health_increases_score() {
        let healthy = score(100, Duration::from_millis(10), 1, 1.0);
        let unhealthy = score(100, Duration::from_millis(10), 1, 0.5);
        assert!(unhealthy > healthy);
    }
}
