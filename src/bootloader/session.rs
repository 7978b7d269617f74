//! Upload session state

use super::vectors::RelocatedVectors;
use crate::os::{EventSet, IdleCounter};

/// Everything mutable between bootloader entry and exit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Session {
    /// Next flash byte address to stage, always word aligned.
    pub cursor: u16,
    pub vectors: RelocatedVectors,
    pub events: EventSet,
    pub idle: IdleCounter,
    /// Oscillator calibration in use, persisted into the tiny table.
    pub calibration: u8,
    /// Set once any page has been committed.
    pub wrote_page: bool,
}

impl Session {
    pub const fn new(calibration: u8) -> Self {
        Self {
            cursor: 0,
            vectors: RelocatedVectors { reset: 0, interrupt: 0 },
            events: EventSet::new(),
            idle: IdleCounter::new(),
            calibration,
            wrote_page: false,
        }
    }
}
