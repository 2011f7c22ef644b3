use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sky_primitives::Cost;

/// A provider's quoted costs, fetched lazily and refreshed before expiry.
/// All prices are in the portal's opaque cost unit.
#[derive(Clone, Copy, Debug)]
pub struct PriceTable {
    pub read_cost_per_byte: Cost,
    pub write_cost_per_byte: Cost,
    pub read_base_cost: Cost,
    pub write_base_cost: Cost,
    pub registry_read_cost: Cost,
    pub registry_write_cost: Cost,
}

impl PriceTable {
    #[must_use]
    pub fn read_cost(&self, bytes: usize) -> Cost {
        self.read_base_cost + self.read_cost_per_byte * bytes as Cost
    }

    #[must_use]
    pub fn write_cost(&self, bytes: usize) -> Cost {
        self.write_base_cost + self.write_cost_per_byte * bytes as Cost
    }
}

/// A short-lived cache in front of a provider's `price_table` RPC.
///
/// Held behind a single short-lived lock: callers take the lock only to
/// read or install a fresh table, never while awaiting the provider.
pub struct PriceCache {
    ttl: Duration,
    state: Mutex<Option<(Instant, PriceTable)>>,
}

impl PriceCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(None),
        }
    }

    /// Returns the cached table if it hasn't expired.
    #[must_use]
    pub fn get(&self) -> Option<PriceTable> {
        let state = self.state.lock();
        match *state {
            Some((fetched_at, table)) if fetched_at.elapsed() < self.ttl => Some(table),
            _ => None,
        }
    }

    pub fn install(&self, table: PriceTable) {
        *self.state.lock() = Some((Instant::now(), table));
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.get().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PriceTable {
        PriceTable {
            read_cost_per_byte: 1,
            write_cost_per_byte: 2,
            read_base_cost: 10,
            write_base_cost: 20,
            registry_read_cost: 5,
            registry_write_cost: 5,
        }
    }

    #[test]
    fn expires_after_ttl() {
        let cache = PriceCache::new(Duration::from_millis(1));
        cache.install(sample());
        assert!(cache.get().is_some());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get().is_none());
        assert!(cache.is_expired());
    }

    #[test]
    fn cost_formulas() {
        let table = sample();
        assert_eq!(table.read_cost(100), 10 + 100);
        assert_eq!(table.write_cost(100), 20 + 200);
    }
}
