use std::sync::Arc;
use std::time::Instant;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use sky_primitives::{Hash, PublicKey, RequestBudget, SkyError};
use sky_provider::ProviderClient;
use sky_worker::LatencyEstimator;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::entry::RegistryEntry;
use crate::error::RegistryResult;

/// Providers an update is fanned out to in parallel.
const MIN_UPDATE_PROVIDERS: usize = 5;
/// ACKs required before an update is considered durable.
const MIN_UPDATE_SUCCESSES: usize = 3;
/// Providers raced on every read.
const READ_PROVIDER_FANOUT: usize = 5;
/// Agreeing replies required to short-circuit a read before its window elapses.
const READ_QUORUM: usize = 3;

/// Signs and dispatches `entry` to `MIN_UPDATE_PROVIDERS` providers, returning
/// once `MIN_UPDATE_SUCCESSES` of them ACK acceptance.
///
/// A provider ACKs by applying the total order itself; a provider that
/// rejects with `SameRevNum`, `LowerRevNum` or `InsufficientWork` is not a
/// transport failure, just a losing entry under the order.
pub async fn update(
    providers: &[Arc<dyn ProviderClient>],
    owner: PublicKey,
    entry: &RegistryEntry,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> RegistryResult<()> {
    if !entry.verify(&owner) {
        return Err(SkyError::SignatureInvalid { context: "registry::update" });
    }
    budget.check_deadline("registry::update")?;

    if providers.len() < MIN_UPDATE_PROVIDERS {
        return Err(SkyError::NotEnoughWorkers { context: "registry::update" });
    }

    let entry_bytes = entry.encode();
    let mut in_flight = FuturesUnordered::new();
    for provider in &providers[..MIN_UPDATE_PROVIDERS] {
        let provider = Arc::clone(provider);
        let entry_bytes = entry_bytes.clone();
        in_flight.push(async move {
            let result = provider.update_registry(owner, entry_bytes).await;
            (provider.provider_id(), result)
        });
    }

    let mut successes = 0usize;
    let mut errors = Vec::new();

    loop {
        if successes >= MIN_UPDATE_SUCCESSES {
            return Ok(());
        }
        tokio::select! {
            () = cancel.cancelled() => return Err(SkyError::Cancelled { context: "registry::update" }),
            () = sleep(budget.time_left()) => return Err(SkyError::Timeout { context: "registry::update" }),
            next = in_flight.next() => {
                match next {
                    Some((_, Ok(()))) => successes += 1,
                    Some((provider_id, Err(err))) => {
                        warn!(%provider_id, %err, "provider rejected registry update");
                        errors.push(err.to_string());
                    }
                    None => {
                        warn!(errors = errors.join("; "), "registry update quorum not reached");
                        return Err(SkyError::NoSuccessfulUpdates { context: "registry::update" });
                    }
                }
                if in_flight.is_empty() && successes < MIN_UPDATE_SUCCESSES {
                    warn!(errors = errors.join("; "), "registry update quorum not reached");
                    return Err(SkyError::NoSuccessfulUpdates { context: "registry::update" });
                }
            }
        }
    }
}

/// Races up to `READ_PROVIDER_FANOUT` providers for the entry at
/// `(owner, data_key)`, returning the highest entry (by the total order)
/// seen either once `READ_QUORUM` providers agree on the same bytes or once
/// a p99-derived background-read window elapses.
pub async fn read(
    providers: &[Arc<dyn ProviderClient>],
    owner: PublicKey,
    data_key: Hash,
    latency: &LatencyEstimator,
    budget: &RequestBudget,
    cancel: &CancellationToken,
) -> RegistryResult<RegistryEntry> {
    budget.check_deadline("registry::read")?;
    if providers.is_empty() {
        return Err(SkyError::NotEnoughWorkers { context: "registry::read" });
    }

    let fanout = providers.len().min(READ_PROVIDER_FANOUT);
    let window = latency.p99().min(budget.time_left());

    let mut in_flight = FuturesUnordered::new();
    for provider in &providers[..fanout] {
        let provider = Arc::clone(provider);
        in_flight.push(async move {
            let started = Instant::now();
            let result = provider.read_registry(owner, data_key).await;
            (provider.provider_id(), started.elapsed(), result)
        });
    }

    let mut best: Option<RegistryEntry> = None;
    let mut best_bytes: Option<Vec<u8>> = None;
    let mut agreeing = 0usize;
    let mut any_not_found = false;
    let mut window_fired = false;

    let deadline_timer = sleep(budget.time_left());
    tokio::pin!(deadline_timer);
    let window_timer = sleep(window);
    tokio::pin!(window_timer);

    loop {
        tokio::select! {
            () = cancel.cancelled() => return Err(SkyError::Cancelled { context: "registry::read" }),
            () = &mut deadline_timer => return Err(SkyError::Timeout { context: "registry::read" }),
            () = &mut window_timer, if !window_fired => {
                window_fired = true;
                if best.is_some() || any_not_found {
                    return finish(best);
                }
            }
            next = in_flight.next() => {
                match next {
                    None => return finish(best),
                    Some((provider_id, elapsed, result)) => {
                        latency.record(elapsed);
                        match result {
                            Ok(Some(bytes)) => {
                                match RegistryEntry::decode(&bytes) {
                                    Ok(candidate) if candidate.verify(&owner) => {
                                        if best_bytes.as_deref() == Some(bytes.as_slice()) {
                                            agreeing += 1;
                                        } else if best.as_ref().map_or(true, |b| candidate.dominates(b, owner)) {
                                            best = Some(candidate);
                                            best_bytes = Some(bytes);
                                            agreeing = 1;
                                        }
                                        if agreeing >= READ_QUORUM {
                                            return finish(best);
                                        }
                                    }
                                    _ => warn!(%provider_id, "registry reply failed to decode or verify, ignoring"),
                                }
                            }
                            Ok(None) => any_not_found = true,
                            Err(err) => warn!(%provider_id, %err, "registry read failed"),
                        }
                        if in_flight.is_empty() && window_fired && (best.is_some() || any_not_found) {
                            return finish(best);
                        }
                    }
                }
            }
        }
    }
}

fn finish(best: Option<RegistryEntry>) -> RegistryResult<RegistryEntry> {
    best.ok_or(SkyError::NotFound { context: "registry::read" })
}
