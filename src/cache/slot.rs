use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Single-document cache with epoch-guarded writes.
#[derive(Debug, Default)]
pub struct CacheSlot {
    state: RwLock<SlotState>,
}

#[derive(Debug, Default)]
struct SlotState {
    epoch: u64,
    document: Option<Arc<str>>,
}

/// Point-in-time view of the slot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotStatus {
    pub cached: bool,
    pub epoch: u64,
    pub bytes: usize,
}

impl CacheSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Arc<str>> {
        self.read("get").document.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.read("epoch").epoch
    }

    /// Drop the held document and start a new epoch. Returns the new epoch.
    pub fn invalidate(&self) -> u64 {
        let mut state = self.write("invalidate");
        state.document = None;
        state.epoch = state.epoch.wrapping_add(1);
        state.epoch
    }

    /// Store `document` if no invalidation happened since `epoch` was read.
    pub fn fill(&self, epoch: u64, document: Arc<str>) -> bool {
        let mut state = self.write("fill");
        if state.epoch != epoch {
            return false;
        }
        state.document = Some(document);
        true
    }

    pub fn status(&self) -> SlotStatus {
        let state = self.read("status");
        SlotStatus {
            cached: state.document.is_some(),
            epoch: state.epoch,
            bytes: state.document.as_ref().map_or(0, |doc| doc.len()),
        }
    }

    // Writers hold no panic point between field stores; a poisoned guard
    // still sees a consistent `SlotState`.
    fn read(&self, op: &'static str) -> RwLockReadGuard<'_, SlotState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| recovered(op, poisoned))
    }

    fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, SlotState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| recovered(op, poisoned))
    }
}

fn recovered<G>(op: &'static str, poisoned: PoisonError<G>) -> G {
    warn!(
        target = "playshelf::cache",
        op,
        result = "poisoned_recovered",
        "recovered from poisoned cache slot lock"
    );
    poisoned.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let slot = CacheSlot::new();
        assert!(slot.get().is_none());
        assert_eq!(
            slot.status(),
            SlotStatus {
                cached: false,
                epoch: 0,
                bytes: 0
            }
        );
    }

    #[test]
    fn fill_then_invalidate() {
        let slot = CacheSlot::new();
        let epoch = slot.epoch();
        assert!(slot.fill(epoch, Arc::from("<urlset/>")));
        assert_eq!(slot.get().as_deref(), Some("<urlset/>"));
        assert_eq!(slot.status().bytes, 9);

        let next = slot.invalidate();
        assert_eq!(next, epoch + 1);
        assert!(slot.get().is_none());
    }

    #[test]
    fn stale_fill_is_rejected() {
        let slot = CacheSlot::new();
        let started = slot.epoch();
        slot.invalidate();

        assert!(!slot.fill(started, Arc::from("stale")));
        assert!(slot.get().is_none());

        assert!(slot.fill(slot.epoch(), Arc::from("fresh")));
        assert_eq!(slot.get().as_deref(), Some("fresh"));
    }
}
