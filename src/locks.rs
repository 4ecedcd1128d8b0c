use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::profile::Uid;

type Pair = (Uid, Uid);

/// Per-pair advisory locks serializing relationship transitions within
/// this process. The pair is unordered: locking (a, b) excludes (b, a).
#[derive(Clone, Default)]
pub struct PairLocks {
    inner: Arc<Mutex<HashMap<Pair, Slot>>>,
}

#[derive(Default)]
struct Slot {
    mutex: Arc<AsyncMutex<()>>,
    // guards plus pending waiters
    users: usize,
}

/// One user of a pair's slot, holding or awaiting the lock. The slot is
/// removed with its last claim, including claims of cancelled waiters.
struct Claim {
    pair: Pair,
    locks: PairLocks,
}

/// Holds the lock on a pair until dropped.
pub struct PairGuard {
    // released before the claim
    _guard: OwnedMutexGuard<()>,
    _claim: Claim,
}

fn ordered(a: &str, b: &str) -> Pair {
    if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

impl PairLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other guard for the pair is alive.
    pub async fn lock(&self, a: &str, b: &str) -> PairGuard {
        let pair = ordered(a, b);

        let mutex = {
            let mut map = self.map();
            let slot = map.entry(pair.clone()).or_default();
            slot.users += 1;
            slot.mutex.clone()
        };

        let claim = Claim {
            pair,
            locks: self.clone(),
        };

        PairGuard {
            _guard: mutex.lock_owned().await,
            _claim: claim,
        }
    }

    /// Number of pairs currently locked or awaited.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, HashMap<Pair, Slot>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        let mut map = self.locks.map();

        let last = match map.get_mut(&self.pair) {
            Some(slot) => {
                slot.users -= 1;
                slot.users == 0
            }
            None => false,
        };

        if last {
            map.remove(&self.pair);
        }
    }
}
