use std::time::Duration;

use parking_lot::Mutex;

/// Global mutable state (performance stats) isolated behind an aggregator
/// with a single mutex; callers submit events, they never get a shared
/// pointer into the counters themselves.
#[derive(Default)]
pub struct StatsAggregator {
    inner: Mutex<Counters>,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct Counters {
    pub sector_reads: u64,
    pub sector_read_failures: u64,
    pub sector_writes: u64,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
    pub escalations: u64,
}

/// One event submitted by a worker, chunk reconstruction, or upload dispatch.
pub enum StatEvent {
    SectorRead { bytes: u64, latency: Duration },
    SectorReadFailed,
    SectorWritten { bytes: u64 },
    Escalated,
}

impl StatsAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: StatEvent) {
        let mut counters = self.inner.lock();
        match event {
            StatEvent::SectorRead { bytes, .. } => {
                counters.sector_reads += 1;
                counters.bytes_downloaded += bytes;
            }
            StatEvent::SectorReadFailed => counters.sector_read_failures += 1,
            StatEvent::SectorWritten { bytes } => {
                counters.sector_writes += 1;
                counters.bytes_uploaded += bytes;
            }
            StatEvent::Escalated => counters.escalations += 1,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Counters {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_across_events() {
        let stats = StatsAggregator::new();
        stats.record(StatEvent::SectorRead {
            bytes: 100,
            latency: Duration::from_millis(5),
        });
        stats.record(StatEvent::SectorReadFailed);
        stats.record(StatEvent::SectorWritten { bytes: 50 });

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.sector_reads, 1);
        assert_eq!(snapshot.sector_read_failures, 1);
        assert_eq!(snapshot.bytes_downloaded, 100);
        assert_eq!(snapshot.bytes_uploaded, 50);
    }
}
