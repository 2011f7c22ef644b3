use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;
use sky_primitives::{Hash, SkyError, PRUNE_IDLE_TIMEOUT};
use uuid::Uuid;

use crate::error::UploadResult;

/// One already-dispatched fanout chunk recorded against a session, in the
/// order it was appended.
#[derive(Clone, Debug)]
pub struct CommittedChunk {
    pub chunk_index: u64,
    pub offset: u64,
    pub len: u64,
    pub roots: Vec<Hash>,
}

struct SessionState {
    committed: Vec<CommittedChunk>,
    next_offset: u64,
    last_active: Instant,
}

/// A resumable large-file upload: a stable id, a fixed chunk size and total
/// size cap agreed at creation, and an append-only log of committed chunks.
///
/// Appends are accepted only at the session's current `next_offset`, so a
/// retried request replays harmlessly and an out-of-order one is rejected
/// rather than silently skipping or duplicating a chunk.
pub struct UploadSession {
    id: Uuid,
    chunk_size: u64,
    max_size: u64,
    state: Mutex<SessionState>,
}

impl UploadSession {
    #[must_use]
    pub fn new(chunk_size: u64, max_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            chunk_size,
            max_size,
            state: Mutex::new(SessionState {
                committed: Vec::new(),
                next_offset: 0,
                last_active: Instant::now(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    #[must_use]
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.state.lock().next_offset
    }

    /// Records a chunk already dispatched to a write quorum at `offset`.
    /// Rejects anything but the session's current `next_offset`, and
    /// anything that would push the session past `max_size`.
    pub fn commit_chunk(&self, offset: u64, chunk_index: u64, len: u64, roots: Vec<Hash>) -> UploadResult<()> {
        let mut state = self.state.lock();
        if offset != state.next_offset {
            return Err(SkyError::InvalidPath {
                context: "commit_chunk",
            });
        }
        if offset + len > self.max_size {
            return Err(SkyError::DataTooLarge {
                context: "commit_chunk",
            });
        }
        state.committed.push(CommittedChunk {
            chunk_index,
            offset,
            len,
            roots,
        });
        state.next_offset += len;
        state.last_active = Instant::now();
        Ok(())
    }

    #[must_use]
    pub fn committed_chunks(&self) -> Vec<CommittedChunk> {
        self.state.lock().committed.clone()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.lock().last_active.elapsed() >= PRUNE_IDLE_TIMEOUT
    }
}

/// In-memory registry of resumable upload sessions, keyed by `upload_id`.
///
/// Deleting a session here only drops its bookkeeping; the caller is
/// responsible for also deleting whatever staged sectors it dispatched, if
/// any were written for chunks past what the final sector ends up needing.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, Arc<UploadSession>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, chunk_size: u64, max_size: u64) -> Arc<UploadSession> {
        let session = Arc::new(UploadSession::new(chunk_size, max_size));
        self.sessions.insert(session.id(), Arc::clone(&session));
        session
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<UploadSession>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Removes every session idle past [`PRUNE_IDLE_TIMEOUT`], returning how
    /// many were reaped.
    pub fn reap_idle(&self) -> usize {
        let idle: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_idle())
            .map(|entry| *entry.key())
            .collect();
        for id in &idle {
            self.sessions.remove(id);
        }
        idle.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    #[test]
    fn sequential_appends_advance_next_offset() {
        let session = UploadSession::new(1024, 4096);
        session.commit_chunk(0, 0, 1024, vec![root(1)]).unwrap();
        assert_eq!(session.next_offset(), 1024);
        session.commit_chunk(1024, 1, 1024, vec![root(2)]).unwrap();
        assert_eq!(session.next_offset(), 2048);
        assert_eq!(session.committed_chunks().len(), 2);
    }

    #[test]
    fn out_of_order_offset_is_rejected() {
        let session = UploadSession::new(1024, 4096);
        assert!(session.commit_chunk(1024, 0, 1024, vec![root(1)]).is_err());
    }

    #[test]
    fn exceeding_max_size_is_rejected() {
        let session = UploadSession::new(1024, 2048);
        session.commit_chunk(0, 0, 1024, vec![root(1)]).unwrap();
        session.commit_chunk(1024, 1, 1024, vec![root(2)]).unwrap();
        assert!(matches!(
            session.commit_chunk(2048, 2, 1024, vec![root(3)]),
            Err(SkyError::DataTooLarge { .. })
        ));
    }

    #[test]
    fn registry_create_get_and_remove_round_trip() {
        let registry = SessionRegistry::new();
        let session = registry.create(1024, 4096);
        let id = session.id();

        assert!(registry.get(id).is_some());
        registry.remove(id);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn reap_idle_only_removes_sessions_past_the_timeout() {
        let registry = SessionRegistry::new();
        let fresh = registry.create(1024, 4096);

        assert_eq!(registry.reap_idle(), 0);
        assert!(registry.get(fresh.id()).is_some());
    }
}
