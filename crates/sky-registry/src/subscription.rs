use std::sync::Arc;

use futures_util::StreamExt;
use sky_primitives::{Hash, PublicKey, SkyError};
use sky_provider::ProviderClient;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::entry::RegistryEntry;
use crate::error::RegistryResult;

const CHANNEL_CAPACITY: usize = 32;

/// A live subscription to one key on one provider. Every entry whose
/// revision advances on the key arrives on [`Subscription::recv`]; dropping
/// the subscription is how a caller unsubscribes.
pub struct Subscription {
    receiver: mpsc::Receiver<RegistryEntry>,
    _cancel: DropGuard,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<RegistryEntry> {
        self.receiver.recv().await
    }
}

/// Opens a long-lived stream to the first provider in `providers` for
/// `(owner, data_key)`, decoding and forwarding every notification it pushes
/// onto a single consumer channel.
///
/// A subscription session lives on one provider, matching the single
/// serialized connection every other provider operation goes through; the
/// core does not itself multiplex across providers here.
pub async fn subscribe(
    providers: &[Arc<dyn ProviderClient>],
    owner: PublicKey,
    data_key: Hash,
) -> RegistryResult<Subscription> {
    let provider = providers
        .first()
        .cloned()
        .ok_or(SkyError::NotEnoughWorkers { context: "registry::subscribe" })?;

    let mut stream = provider
        .subscribe(owner, data_key)
        .await
        .map_err(|_| SkyError::ProviderUnavailable { context: "registry::subscribe" })?;

    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = task_cancel.cancelled() => break,
                next = stream.next() => {
                    match next {
                        Some(bytes) => match RegistryEntry::decode(&bytes) {
                            Ok(entry) if entry.verify(&owner) => {
                                if tx.send(entry).await.is_err() {
                                    break;
                                }
                            }
                            _ => debug!("dropped an unverifiable registry notification"),
                        },
                        None => break,
                    }
                }
            }
        }
    });

    Ok(Subscription {
        receiver: rx,
        _cancel: cancel.drop_guard(),
    })
}

/// Closes the subscription; cancellation is cooperative, so the background
/// forwarding task stops at its next poll rather than mid-send.
pub fn unsubscribe(subscription: Subscription) {
    drop(subscription);
}
