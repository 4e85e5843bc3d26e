use replay_ring::ReplayRing;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

pub type ViewerId = Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("viewer slots exhausted ({0} connected)")]
    SlotsFull(usize),
}

struct RegistryInner {
    ring: ReplayRing,
    viewers: HashMap<ViewerId, mpsc::UnboundedSender<Vec<u8>>>,
}

/// Connected viewers plus the replay ring they are fed from.
///
/// Ring and viewer map live under one mutex on purpose: a join takes its
/// replay snapshot and registers for live traffic in a single critical
/// section, so no chunk can slip between the two, and a broadcast pushes
/// into the ring and fans out as one step. Critical sections never block
/// (unbounded sends) and never yield.
pub struct ViewerRegistry {
    inner: Mutex<RegistryInner>,
    max_viewers: usize,
}

impl ViewerRegistry {
    pub fn new(replay_capacity: usize, max_viewers: usize) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                ring: ReplayRing::with_capacity(replay_capacity),
                viewers: HashMap::new(),
            }),
            max_viewers,
        }
    }

    /// Admits a viewer: its first queued frame is the replay snapshot,
    /// everything after is live traffic. Refused outright once all slots
    /// are taken.
    pub fn join(&self, tx: mpsc::UnboundedSender<Vec<u8>>) -> Result<ViewerId, RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.viewers.len() >= self.max_viewers {
            return Err(RegistryError::SlotsFull(inner.viewers.len()));
        }
        let _ = tx.send(inner.ring.snapshot());
        let id = Uuid::new_v4();
        inner.viewers.insert(id, tx);
        Ok(id)
    }

    /// Removes a viewer; returns whether it was still registered.
    pub fn leave(&self, id: ViewerId) -> bool {
        self.inner.lock().unwrap().viewers.remove(&id).is_some()
    }

    /// Records a chunk in the replay ring and delivers it to every viewer,
    /// best-effort: a viewer whose channel has closed is evicted without
    /// disturbing delivery to the rest. Returns the number of viewers that
    /// accepted the chunk.
    pub fn broadcast(&self, chunk: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        inner.ring.push(chunk);
        let mut dead = Vec::new();
        let mut delivered = 0;
        for (id, tx) in &inner.viewers {
            if tx.send(chunk.to_vec()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.viewers.remove(&id);
            debug!(viewer = %id, "evicted viewer with closed channel");
        }
        delivered
    }

    pub fn viewer_count(&self) -> usize {
        self.inner.lock().unwrap().viewers.len()
    }

    /// Bytes currently replayable to a new viewer.
    pub fn replay_len(&self) -> usize {
        self.inner.lock().unwrap().ring.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ViewerRegistry {
        ViewerRegistry::new(2000, 3)
    }

    #[tokio::test]
    async fn late_joiner_receives_replay_as_first_frame() {
        let reg = registry();
        reg.broadcast(b"AAAA");

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.join(tx).unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"AAAA");
    }

    #[tokio::test]
    async fn replay_precedes_live_traffic() {
        let reg = registry();
        reg.broadcast(b"old");

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.join(tx).unwrap();
        reg.broadcast(b"new");

        assert_eq!(rx.recv().await.unwrap(), b"old");
        assert_eq!(rx.recv().await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn fresh_joiner_still_gets_an_empty_snapshot_frame() {
        let reg = registry();
        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.join(tx).unwrap();
        assert_eq!(rx.recv().await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn replay_is_capped_at_ring_capacity() {
        let reg = ViewerRegistry::new(8, 3);
        reg.broadcast(b"abcdef");
        reg.broadcast(b"ghijkl");

        let (tx, mut rx) = mpsc::unbounded_channel();
        reg.join(tx).unwrap();

        assert_eq!(rx.recv().await.unwrap(), b"efghijkl");
    }

    #[test]
    fn join_past_capacity_is_refused() {
        let reg = registry();
        let mut channels = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = mpsc::unbounded_channel();
            channels.push(rx);
            reg.join(tx).unwrap();
        }

        let (tx, _rx) = mpsc::unbounded_channel();
        assert_eq!(reg.join(tx), Err(RegistryError::SlotsFull(3)));
        assert_eq!(reg.viewer_count(), 3);
    }

    #[test]
    fn slot_frees_up_after_leave() {
        let reg = ViewerRegistry::new(16, 1);
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = reg.join(tx).unwrap();
        assert!(reg.leave(id));

        let (tx, _rx2) = mpsc::unbounded_channel();
        assert!(reg.join(tx).is_ok());
    }

    #[tokio::test]
    async fn dead_viewer_does_not_starve_the_others() {
        let reg = registry();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        reg.join(tx_a).unwrap();
        let id_b = reg.join(tx_b).unwrap();
        reg.join(tx_c).unwrap();

        // Viewer B disconnects without a clean leave.
        drop(rx_b);

        let payload = b"0123456789";
        assert_eq!(reg.broadcast(payload), 2);

        // Skip the (empty) replay frames, then both survivors hold the
        // full ten bytes.
        assert_eq!(rx_a.recv().await.unwrap(), Vec::<u8>::new());
        assert_eq!(rx_a.recv().await.unwrap(), payload);
        assert_eq!(rx_c.recv().await.unwrap(), Vec::<u8>::new());
        assert_eq!(rx_c.recv().await.unwrap(), payload);

        // The dead viewer was evicted during the broadcast.
        assert_eq!(reg.viewer_count(), 2);
        assert!(!reg.leave(id_b));
    }

    #[test]
    fn broadcast_with_no_viewers_still_feeds_the_ring() {
        let reg = registry();
        assert_eq!(reg.broadcast(b"quiet"), 0);
        assert_eq!(reg.replay_len(), 5);
    }
}
