use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Mutex;

pub const SESSION_ID_INITIAL: u16 = 0x0400;
pub const SESSION_ID_MAX: u16 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u16);

impl SessionId {
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[derive(Debug)]
struct PoolInner {
    next_fresh: u32,
    released: VecDeque<u16>,
    live: HashSet<u16>,
}

/// Hands out session ids from `[initial, max]`; released ids are reused oldest first.
#[derive(Debug)]
pub struct SessionIdPool {
    initial: u16,
    max: u16,
    inner: Mutex<PoolInner>,
}

impl Default for SessionIdPool {
    fn default() -> Self {
        Self::new(SESSION_ID_INITIAL, SESSION_ID_MAX)
    }
}

impl SessionIdPool {
    pub fn new(initial: u16, max: u16) -> Self {
        Self {
            initial,
            max: max.max(initial),
            inner: Mutex::new(PoolInner {
                next_fresh: u32::from(initial),
                released: VecDeque::new(),
                live: HashSet::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.max - self.initial) + 1
    }

    /// Returns `None` when every id in the range is live.
    pub fn allocate(&self) -> Option<SessionId> {
        let mut inner = self.lock();
        let id = match inner.released.pop_front() {
            Some(id) => id,
            None => {
                if inner.next_fresh > u32::from(self.max) {
                    return None;
                }
                let id = inner.next_fresh as u16;
                inner.next_fresh += 1;
                id
            }
        };
        inner.live.insert(id);
        Some(SessionId(id))
    }

    /// Returns `false` if the id was not live; releasing twice is a no-op.
    pub fn release(&self, id: SessionId) -> bool {
        let mut inner = self.lock();
        if !inner.live.remove(&id.0) {
            return false;
        }
        inner.released.push_back(id.0);
        true
    }

    pub fn is_live(&self, id: SessionId) -> bool {
        self.lock().live.contains(&id.0)
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_initial_id() {
        let pool = SessionIdPool::default();
        assert_eq!(pool.allocate(), Some(SessionId(SESSION_ID_INITIAL)));
        assert_eq!(pool.allocate(), Some(SessionId(SESSION_ID_INITIAL + 1)));
        assert_eq!(pool.live_count(), 2);
    }

    #[test]
    fn exhausts_and_reuses_released_ids_in_order() {
        let pool = SessionIdPool::new(10, 12);
        let a = pool.allocate().expect("a");
        let b = pool.allocate().expect("b");
        let c = pool.allocate().expect("c");
        assert_eq!(pool.allocate(), None);

        assert!(pool.release(b));
        assert!(pool.release(a));
        assert!(!pool.release(a));
        assert_eq!(pool.allocate(), Some(b));
        assert_eq!(pool.allocate(), Some(a));
        assert_eq!(pool.allocate(), None);
        assert!(pool.is_live(c));
    }

    #[test]
    fn live_ids_are_never_duplicated() {
        let pool = SessionIdPool::new(0x0400, 0x0420);
        let mut seen = HashSet::new();
        for round in 0..5 {
            let mut held = Vec::new();
            while let Some(id) = pool.allocate() {
                assert!(seen.insert(id), "duplicate live id {id} in round {round}");
                held.push(id);
            }
            assert_eq!(held.len(), pool.capacity());
            for id in held {
                pool.release(id);
                seen.remove(&id);
            }
        }
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(SessionId(0x0400).to_string(), "0x0400");
    }
}
