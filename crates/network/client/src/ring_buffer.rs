use std::mem;
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;

/// Pending parameter updates keyed by the tick their sender stamped them with.
///
/// This is the only state shared between the receive task and the tick
/// driver. The lock is held for a single append or a single drain.
#[derive(Debug)]
pub struct MessageBuffer {
    slots: Mutex<Vec<Vec<Bytes>>>,
}

impl MessageBuffer {
    /// One bucket per clock step, see `SyncClock::timesteps`.
    pub fn new(timesteps: u16) -> Self {
        let buckets = usize::from(timesteps.max(1));
        Self {
            slots: Mutex::new(vec![Vec::new(); buckets]),
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.slots().len()
    }

    /// Appends `frame` to bucket `tick mod N`.
    pub fn push(&self, tick: u8, frame: Bytes) -> usize {
        let mut slots = self.slots();
        let bucket = usize::from(tick) % slots.len();
        slots[bucket].push(frame);
        bucket
    }

    /// Takes every frame of `bucket` in append order and leaves it empty.
    pub fn drain(&self, bucket: usize) -> Vec<Bytes> {
        let mut slots = self.slots();
        let len = slots.len();
        mem::take(&mut slots[bucket % len])
    }

    /// Frames waiting across all buckets.
    pub fn pending(&self) -> usize {
        self.slots().iter().map(Vec::len).sum()
    }

    pub fn clear(&self) {
        self.slots().iter_mut().for_each(Vec::clear);
    }

    fn slots(&self) -> MutexGuard<'_, Vec<Vec<Bytes>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
