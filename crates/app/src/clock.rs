use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

/// Wrapping session clock.
///
/// Counts `0..timesteps` where `timesteps` is the largest whole number of
/// seconds that fits in a byte of ticks (`256 / frame_rate * frame_rate`).
/// The same value sizes the update ring buffer, so a tick is always a valid
/// bucket index.
#[derive(Debug)]
pub struct SyncClock {
    tick: AtomicU8,
    frame_rate: u16,
    timesteps: u16,
}

impl SyncClock {
    pub fn new(frame_rate: u16) -> Self {
        let frame_rate = frame_rate.clamp(1, 256);
        Self {
            tick: AtomicU8::new(0),
            frame_rate,
            timesteps: (256 / frame_rate) * frame_rate,
        }
    }

    pub fn frame_rate(&self) -> u16 {
        self.frame_rate
    }

    /// Ring size `N`.
    pub fn timesteps(&self) -> u16 {
        self.timesteps
    }

    /// Ticks a buffered update waits before it is applied, about 1/10 s.
    pub fn lookback(&self) -> u16 {
        self.frame_rate / 10
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / u32::from(self.frame_rate)
    }

    pub fn now(&self) -> u8 {
        self.tick.load(Ordering::Acquire)
    }

    /// Adopts a tick announced by the clock master.
    pub fn set(&self, tick: u8) {
        let tick = u16::from(tick) % self.timesteps;
        self.tick.store(tick as u8, Ordering::Release);
    }

    /// Advances one tick and returns the new value.
    pub fn advance(&self) -> u8 {
        let timesteps = self.timesteps;
        let step = |tick: u8| Some(((u16::from(tick) + 1) % timesteps) as u8);
        match self
            .tick
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, step)
        {
            Ok(previous) | Err(previous) => step(previous).unwrap_or(0),
        }
    }

    /// Bucket the consumer drains at the current tick.
    pub fn due_bucket(&self) -> usize {
        let n = usize::from(self.timesteps);
        (usize::from(self.now()) + n - usize::from(self.lookback()) % n) % n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_size_is_whole_seconds_within_a_byte() {
        assert_eq!(SyncClock::new(24).timesteps(), 240);
        assert_eq!(SyncClock::new(60).timesteps(), 240);
        assert_eq!(SyncClock::new(25).timesteps(), 250);
        assert_eq!(SyncClock::new(0).timesteps(), 256);
        assert_eq!(SyncClock::new(1000).timesteps(), 256);
    }

    #[test]
    fn advance_wraps_at_ring_size() {
        let clock = SyncClock::new(60);
        clock.set(238);
        assert_eq!(clock.advance(), 239);
        assert_eq!(clock.advance(), 0);
    }

    #[test]
    fn announced_tick_is_folded_into_ring() {
        let clock = SyncClock::new(24);
        clock.set(255);
        assert_eq!(clock.now(), 15);
    }

    #[test]
    fn due_bucket_trails_by_lookback() {
        let clock = SyncClock::new(60);
        assert_eq!(clock.lookback(), 6);
        clock.set(2);
        assert_eq!(clock.due_bucket(), 236);
        clock.set(10);
        assert_eq!(clock.due_bucket(), 4);
        assert_eq!(clock.frame_interval(), Duration::from_secs(1) / 60);
    }
}
