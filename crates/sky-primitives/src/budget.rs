use std::time::{Duration, Instant};

use crate::error::SkyError;

/// Spend in the portal's internal accounting unit (hastings-equivalent); the
/// unit itself is opaque to the core, collaborators define the exchange rate.
pub type Cost = u128;

/// The `(deadline, price_per_ms, budget)` triple every public call carries.
#[derive(Debug, Clone, Copy)]
pub struct RequestBudget {
    deadline: Instant,
    price_per_ms: Cost,
    remaining: Cost,
}

impl RequestBudget {
    #[must_use]
    pub fn new(timeout: Duration, price_per_ms: Cost, budget: Cost) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            price_per_ms,
            remaining: budget,
        }
    }

    /// A budget with no deadline and unlimited spend, for tests and internal callers.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            deadline: Instant::now() + Duration::from_secs(3600),
            price_per_ms: Cost::MAX,
            remaining: Cost::MAX,
        }
    }

    #[must_use]
    pub fn price_per_ms(&self) -> Cost {
        self.price_per_ms
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn time_left(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    #[must_use]
    pub fn remaining(&self) -> Cost {
        self.remaining
    }

    /// Deducts `cost` from the remaining budget, context-tagged for the
    /// `InsufficientBudget` error path.
    pub fn spend(&mut self, cost: Cost, context: &'static str) -> Result<(), SkyError> {
        if cost > self.remaining {
            return Err(SkyError::InsufficientBudget { context });
        }
        self.remaining -= cost;
        Ok(())
    }

    /// Fails fast with `Timeout` if the deadline has passed.
    pub fn check_deadline(&self, context: &'static str) -> Result<(), SkyError> {
        if self.is_expired() {
            return Err(SkyError::Timeout { context });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_past_budget_is_rejected() {
        let mut budget = RequestBudget::new(Duration::from_secs(1), 10, 100);
        assert!(budget.spend(60, "test").is_ok());
        assert!(budget.spend(60, "test").is_err());
    }

    #[test]
    fn deadline_elapses() {
        let budget = RequestBudget::new(Duration::from_millis(1), 0, 0);
        std::thread::sleep(Duration::from_millis(5));
        assert!(budget.is_expired());
        assert!(budget.check_deadline("test").is_err());
    }
}
