use std::sync::{Arc, Mutex, PoisonError};

use hashbrown::HashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,

    /// Flights holding or waiting on `lock`.
    users: usize,
}

/// Serialises work on the same key within this process.
///
/// Holding a [`Flight`] for a key makes every other `acquire` for that key
/// wait until the flight is dropped. Entries are removed once nobody holds or
/// waits on them, including waiters that gave up before acquiring.
#[derive(Default)]
pub struct SingleFlight {
    inflight: Mutex<HashMap<String, Slot>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> Flight<'_> {
        let lock = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = inflight.entry(key.to_string()).or_default();
            slot.users += 1;
            slot.lock.clone()
        };

        // Registered before waiting so a dropped waiter still unregisters.
        let mut flight = Flight {
            owner: self,
            key: key.to_string(),
            guard: None,
        };
        flight.guard = Some(lock.lock_owned().await);
        flight
    }

    /// The number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to a key, released on drop.
pub struct Flight<'a> {
    owner: &'a SingleFlight,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut inflight = self
            .owner
            .inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let idle = match inflight.get_mut(&self.key) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            },
            None => false,
        };
        if idle {
            inflight.remove(&self.key);
        }
    }
}
