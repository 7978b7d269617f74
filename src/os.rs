//! Cooperative main-loop bookkeeping: deferred events and idle tracking

use ufmt::derive::uDebug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, uDebug)]
#[repr(u8)]
pub enum Event {
    EraseApplication = 1 << 0,
    WritePage = 1 << 1,
    Execute = 1 << 2,
}

/// Bitmap of flash operations deferred to the main loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventSet(u8);

impl EventSet {
    pub const fn new() -> Self {
        Self(0)
    }

    #[inline]
    pub fn fire(&mut self, event: Event) {
        self.0 |= event as u8;
    }

    #[inline]
    pub fn contains(&self, event: Event) -> bool {
        self.0 & event as u8 != 0
    }

    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        self.0
    }
}

/// Main loop polls since the host last talked to us.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IdleCounter {
    polls: u32,
}

impl IdleCounter {
    pub const fn new() -> Self {
        Self { polls: 0 }
    }

    #[inline]
    pub fn tick(&mut self) {
        self.polls = self.polls.saturating_add(1);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.polls = 0;
    }

    #[inline]
    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn exceeds(&self, limit: u32) -> bool {
        self.polls > limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_accumulate_until_cleared() {
        let mut events = EventSet::new();
        assert!(events.is_empty());

        events.fire(Event::WritePage);
        events.fire(Event::EraseApplication);
        assert!(events.contains(Event::WritePage));
        assert!(events.contains(Event::EraseApplication));
        assert!(!events.contains(Event::Execute));
        assert_eq!(events.bits(), 0b011);

        events.clear();
        assert!(events.is_empty());
    }

    #[test]
    fn idle_counter_saturates_and_resets() {
        let mut idle = IdleCounter { polls: u32::MAX - 1 };
        idle.tick();
        idle.tick();
        assert_eq!(idle.polls(), u32::MAX);
        assert!(idle.exceeds(1000));

        idle.reset();
        assert_eq!(idle.polls(), 0);
        assert!(!idle.exceeds(0));
    }

    #[test]
    fn idle_counter_counts_past_sixteen_bits() {
        let mut idle = IdleCounter::new();
        for _ in 0..100_001 {
            idle.tick();
        }
        assert_eq!(idle.polls(), 100_001);
        assert!(idle.exceeds(100_000));
    }
}
