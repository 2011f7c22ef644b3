use std::pin::Pin;

use async_trait::async_trait;
use sky_primitives::{Hash, PublicKey};
use tokio_stream::Stream;

use crate::error::ProviderResult;
use crate::price::PriceTable;

pub type RegistryStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// One authenticated, multiplexed session to a storage provider. All reads,
/// writes and registry ops for one provider serialize through whatever
/// implements this trait; the core never assumes more than one connection
/// per provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn provider_id(&self) -> PublicKey;

    async fn price_table(&self) -> ProviderResult<PriceTable>;

    async fn read_sector_by_root(
        &self,
        root: Hash,
        offset: u32,
        length: u32,
    ) -> ProviderResult<Vec<u8>>;

    async fn write_sector(&self, sector: &[u8]) -> ProviderResult<Hash>;

    /// Returns `None` when the provider authoritatively has no entry for
    /// `(owner, data_key)`; wire encoding of `Some` is defined at the
    /// registry layer, not here.
    async fn read_registry(&self, owner: PublicKey, data_key: Hash) -> ProviderResult<Option<Vec<u8>>>;

    /// `entry_bytes` is the wire-encoded registry entry; the provider applies
    /// the total order itself and rejects with `SameRevNum` / `LowerRevNum` /
    /// `InsufficientWork` / `InvalidSignature` as appropriate.
    async fn update_registry(&self, owner: PublicKey, entry_bytes: Vec<u8>) -> ProviderResult<()>;

    async fn subscribe(&self, owner: PublicKey, data_key: Hash) -> ProviderResult<RegistryStream>;
}

/// An in-process [`ProviderClient`] backed by plain maps, for tests and for
/// single-portal deployments that pin to local storage instead of a remote
/// provider.
pub mod memory {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use sky_erasure::sector_root;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;
    use crate::error::ProviderError;

    #[derive(Default)]
    struct State {
        sectors: HashMap<Hash, Vec<u8>>,
        registry: HashMap<(PublicKey, Hash), Vec<u8>>,
        subscribers: HashMap<(PublicKey, Hash), Vec<mpsc::Sender<Vec<u8>>>>,
    }

    pub struct MemoryProvider {
        id: PublicKey,
        price: PriceTable,
        state: Mutex<State>,
    }

    impl MemoryProvider {
        #[must_use]
        pub fn new(id: PublicKey, price: PriceTable) -> Self {
            Self {
                id,
                price,
                state: Mutex::new(State::default()),
            }
        }
    }

    #[async_trait]
    impl ProviderClient for MemoryProvider {
        fn provider_id(&self) -> PublicKey {
            self.id
        }

        async fn price_table(&self) -> ProviderResult<PriceTable> {
            Ok(self.price)
        }

        async fn read_sector_by_root(
            &self,
            root: Hash,
            offset: u32,
            length: u32,
        ) -> ProviderResult<Vec<u8>> {
            let state = self.state.lock();
            let sector = state.sectors.get(&root).ok_or(ProviderError::NotFound)?;
            let start = offset as usize;
            let end = start + length as usize;
            if end > sector.len() {
                return Err(ProviderError::NotFound);
            }
            Ok(sector[start..end].to_vec())
        }

        async fn write_sector(&self, sector: &[u8]) -> ProviderResult<Hash> {
            // Real providers address a sector by its segment Merkle root; the
            // backing store here falls back to a flat content hash for the
            // not-segment-aligned buffers exercised by pool-level tests.
            let root = if sector.len() % sky_primitives::SEGMENT_SIZE == 0 {
                sector_root(sector)
            } else {
                sky_primitives::sha256(sector)
            };
            self.state.lock().sectors.insert(root, sector.to_vec());
            Ok(root)
        }

        async fn read_registry(
            &self,
            owner: PublicKey,
            data_key: Hash,
        ) -> ProviderResult<Option<Vec<u8>>> {
            Ok(self.state.lock().registry.get(&(owner, data_key)).cloned())
        }

        async fn update_registry(&self, owner: PublicKey, entry_bytes: Vec<u8>) -> ProviderResult<()> {
            let mut state = self.state.lock();
            let data_key = data_key_unchecked(&entry_bytes);

            if let Some(existing) = state.registry.get(&(owner, data_key)) {
                accept_update(&owner, existing, &entry_bytes)?;
            }

            state.registry.insert((owner, data_key), entry_bytes.clone());
            if let Some(subs) = state.subscribers.get(&(owner, data_key)) {
                for tx in subs {
                    let _ = tx.try_send(entry_bytes.clone());
                }
            }
            Ok(())
        }

        async fn subscribe(&self, owner: PublicKey, data_key: Hash) -> ProviderResult<RegistryStream> {
            let (tx, rx) = mpsc::channel(16);
            self.state
                .lock()
                .subscribers
                .entry((owner, data_key))
                .or_default()
                .push(tx);
            Ok(Box::pin(ReceiverStream::new(rx)))
        }
    }

    /// Registry entry wire encoding starts with `data_key(32)`; the memory
    /// backend only needs the key to route, not the full decode.
    fn data_key_unchecked(entry_bytes: &[u8]) -> Hash {
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&entry_bytes[..32]);
        Hash::new(raw)
    }

    /// Revision, proof-of-work and primary bit pulled out of a wire-encoded
    /// registry entry, enough to apply the same total order a real provider
    /// enforces without depending on the registry crate's codec.
    struct EntryOrder {
        revision: u64,
        work: [u8; 32],
        primary: bool,
    }

    impl EntryOrder {
        fn parse(owner: &PublicKey, entry_bytes: &[u8]) -> Self {
            let mut revision_bytes = [0u8; 8];
            revision_bytes.copy_from_slice(&entry_bytes[32..40]);
            let revision = u64::from_le_bytes(revision_bytes);

            let data_len = entry_bytes[40] as usize;
            let type_offset = 41 + data_len;
            let signature = &entry_bytes[type_offset + 1..type_offset + 1 + 64];

            let mut preimage = Vec::with_capacity(32 + 32 + 64);
            preimage.extend_from_slice(owner.as_slice());
            preimage.extend_from_slice(&entry_bytes[..32]);
            preimage.extend_from_slice(signature);

            Self {
                revision,
                work: sky_primitives::sha256(&preimage).as_work(),
                primary: entry_bytes[type_offset] == 0,
            }
        }
    }

    /// Applies the registry's conflict-resolution total order to decide
    /// whether `candidate` may replace `stored`: higher revision wins, a tie
    /// goes to lower proof-of-work, a further tie goes to the primary entry.
    fn accept_update(owner: &PublicKey, stored: &[u8], candidate: &[u8]) -> ProviderResult<()> {
        let stored = EntryOrder::parse(owner, stored);
        let candidate = EntryOrder::parse(owner, candidate);

        if candidate.revision < stored.revision {
            return Err(ProviderError::LowerRevNum);
        }
        if candidate.revision == stored.revision {
            if candidate.work > stored.work {
                return Err(ProviderError::InsufficientWork);
            }
            if candidate.work == stored.work && !(candidate.primary && !stored.primary) {
                return Err(ProviderError::SameRevNum);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryProvider;
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
    async fn write_then_read_sector_round_trips() {
        let provider = MemoryProvider::new(PublicKey::new([1u8; 32]), price());
        let root = provider.write_sector(b"hello world").await.unwrap();
        let bytes = provider.read_sector_by_root(root, 0, 5).await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn missing_sector_is_not_found() {
        let provider = MemoryProvider::new(PublicKey::new([1u8; 32]), price());
        let missing = sky_primitives::Hash::ZERO;
        assert!(provider.read_sector_by_root(missing, 0, 1).await.is_err());
    }

    fn registry_entry(data_key: [u8; 32], revision: u64, data: &[u8], signature: [u8; 64]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&data_key);
        out.extend_from_slice(&revision.to_le_bytes());
        out.push(data.len() as u8);
        out.extend_from_slice(data);
        out.push(0); // primary
        out.extend_from_slice(&signature);
        out
    }

    #[tokio::test]
    async fn update_registry_accepts_a_strictly_higher_revision() {
        let provider = MemoryProvider::new(PublicKey::new([1u8; 32]), price());
        let owner = PublicKey::new([2u8; 32]);
        provider
            .update_registry(owner, registry_entry([3u8; 32], 1, b"old", [1u8; 64]))
            .await
            .unwrap();
        provider
            .update_registry(owner, registry_entry([3u8; 32], 2, b"new", [1u8; 64]))
            .await
            .unwrap();

        let stored = provider.read_registry(owner, sky_primitives::Hash::new([3u8; 32])).await.unwrap();
        assert_eq!(stored.unwrap(), registry_entry([3u8; 32], 2, b"new", [1u8; 64]));
    }

    #[tokio::test]
    async fn update_registry_rejects_a_stale_revision() {
        let provider = MemoryProvider::new(PublicKey::new([1u8; 32]), price());
        let owner = PublicKey::new([2u8; 32]);
        provider
            .update_registry(owner, registry_entry([4u8; 32], 5, b"current", [1u8; 64]))
            .await
            .unwrap();

        let err = provider
            .update_registry(owner, registry_entry([4u8; 32], 3, b"stale", [1u8; 64]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::LowerRevNum));
    }

    #[tokio::test]
    async fn update_registry_rejects_a_same_revision_duplicate() {
        let provider = MemoryProvider::new(PublicKey::new([1u8; 32]), price());
        let owner = PublicKey::new([2u8; 32]);
        provider
            .update_registry(owner, registry_entry([5u8; 32], 1, b"data", [1u8; 64]))
            .await
            .unwrap();

        let err = provider
            .update_registry(owner, registry_entry([5u8; 32], 1, b"data", [1u8; 64]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::SameRevNum));
    }
}
