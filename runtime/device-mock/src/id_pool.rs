//! In-memory controller-id pool

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fermlink_connector::{IdService, IdServiceError, UNINITIALIZED_ID};

#[derive(Debug)]
struct PoolState {
    free: BTreeSet<u8>,
    released: Vec<u8>,
}

/// [`IdService`] handing out the lowest free id
///
/// Keeps a history of released ids for assertions.
#[derive(Debug)]
pub struct IdPool {
    state: Mutex<PoolState>,
}

impl Default for IdPool {
    /// Every id except the uninitialized marker
    fn default() -> Self {
        Self::new(0..UNINITIALIZED_ID)
    }
}

impl IdPool {
    pub fn new(ids: impl IntoIterator<Item = u8>) -> Self {
        Self {
            state: Mutex::new(PoolState {
                free: ids.into_iter().filter(|id| *id != UNINITIALIZED_ID).collect(),
                released: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of ids that can still be acquired
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    pub fn contains(&self, id: u8) -> bool {
        self.lock().free.contains(&id)
    }

    /// Ids returned to the pool, oldest first
    pub fn released(&self) -> Vec<u8> {
        self.lock().released.clone()
    }
}

impl IdService for IdPool {
    fn acquire(&self) -> Result<u8, IdServiceError> {
        let id = self
            .lock()
            .free
            .pop_first()
            .ok_or(IdServiceError::Exhausted)?;
        log::debug!("id pool handed out {id}");
        Ok(id)
    }

    fn release(&self, id: u8) -> Result<(), IdServiceError> {
        if id == UNINITIALIZED_ID {
            return Err(IdServiceError::NotAssignable(id));
        }
        let mut state = self.lock();
        if !state.free.insert(id) {
            return Err(IdServiceError::AlreadyReleased(id));
        }
        state.released.push(id);
        log::debug!("id {id} returned to the pool");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_lowest_first() {
        let pool = IdPool::new([7, 3, 5]);
        assert_eq!(pool.acquire(), Ok(3));
        assert_eq!(pool.acquire(), Ok(5));
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_exhausted() {
        let pool = IdPool::new([]);
        assert_eq!(pool.acquire(), Err(IdServiceError::Exhausted));
    }

    #[test]
    fn test_release_history() {
        let pool = IdPool::new([1]);
        let id = pool.acquire().unwrap();
        assert_eq!(pool.release(id), Ok(()));
        assert_eq!(pool.release(id), Err(IdServiceError::AlreadyReleased(1)));
        assert_eq!(
            pool.release(UNINITIALIZED_ID),
            Err(IdServiceError::NotAssignable(UNINITIALIZED_ID))
        );
        assert_eq!(pool.released(), vec![1]);
        assert!(pool.contains(1));
    }

    #[test]
    fn test_default_excludes_marker() {
        let pool = IdPool::default();
        assert_eq!(pool.available(), 255);
        assert!(!pool.contains(UNINITIALIZED_ID));
    }
}
