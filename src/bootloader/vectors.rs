//! Vector relocation
//!
//! The reset vector and the USB interrupt vector always point into the
//! bootloader. Whatever the host uploads for those two slots is decoded and
//! kept aside, then written as trampolines into the tiny vector table that
//! ends the last application page:
//!
//! ```text
//! tiny_table + 0  rjmp <application reset>
//! tiny_table + 2  rjmp <application USB interrupt>
//! tiny_table + 4  stored oscillator calibration
//! bootloader      bootloader entry
//! ```

use super::rjmp;
use crate::config::{
    Config, Oscillator, APP_INTERRUPT_OFFSET, APP_RESET_OFFSET, ERASED_WORD,
    STORED_CALIBRATION_OFFSET,
};
use crate::drivers::flash::Flash;
use crate::hal::flash::FlashDevice;

/// The application's own vector targets, captured during upload.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelocatedVectors {
    pub reset: u16,
    pub interrupt: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorEngine {
    reset_slot: u16,
    interrupt_slot: u16,
    reset_trampoline: u16,
    interrupt_trampoline: u16,
    tiny_table: u16,
    interrupt_skip: u16,
    persist_calibration: bool,
}

impl VectorEngine {
    pub const fn new(config: &Config) -> Self {
        let reset_slot = config.reset_slot();
        let interrupt_slot = config.interrupt_slot();
        Self {
            reset_slot,
            interrupt_slot,
            reset_trampoline: rjmp::encode(config.init_address, reset_slot),
            interrupt_trampoline: rjmp::encode(config.interrupt_handler, interrupt_slot),
            tiny_table: config.tiny_table_address(),
            interrupt_skip: config.app_interrupt.skip_bytes(),
            persist_calibration: matches!(config.oscillator, Oscillator::Persisted),
        }
    }

    pub const fn reset_trampoline(&self) -> u16 {
        self.reset_trampoline
    }

    pub const fn interrupt_trampoline(&self) -> u16 {
        self.interrupt_trampoline
    }

    pub const fn tiny_table(&self) -> u16 {
        self.tiny_table
    }

    /// Application reset slot in the tiny table; the exit jump lands here.
    pub const fn app_entry(&self) -> u16 {
        self.tiny_table + APP_RESET_OFFSET
    }

    pub const fn calibration_address(&self) -> u16 {
        self.tiny_table + STORED_CALIBRATION_OFFSET
    }

    /// Remember the application's target if `address` is one of the vector slots.
    pub fn capture(&self, vectors: &mut RelocatedVectors, address: u16, word: u16) {
        if address == self.reset_slot {
            vectors.reset = rjmp::decode(word, address);
        } else if address == self.interrupt_slot {
            vectors.interrupt = rjmp::decode(word, address);
        }
    }

    /// The word that actually gets programmed at `address`.
    pub fn substitute(
        &self,
        vectors: &RelocatedVectors,
        calibration: u8,
        address: u16,
        word: u16,
    ) -> u16 {
        if address == self.reset_slot {
            self.reset_trampoline
        } else if address == self.interrupt_slot {
            self.interrupt_trampoline
        } else if address == self.tiny_table + APP_RESET_OFFSET {
            rjmp::encode(vectors.reset, address)
        } else if address == self.tiny_table + APP_INTERRUPT_OFFSET {
            rjmp::encode(vectors.interrupt.wrapping_add(self.interrupt_skip), address)
        } else if address == self.tiny_table + STORED_CALIBRATION_OFFSET {
            if self.persist_calibration {
                u16::from(calibration)
            } else {
                ERASED_WORD
            }
        } else {
            word
        }
    }

    /// True when both vector slots hold the bootloader's trampolines.
    pub fn bootloader_vectors_present<D: FlashDevice>(&self, flash: &Flash<D>) -> bool {
        flash.read_word(self.reset_slot) == self.reset_trampoline
            && flash.read_word(self.interrupt_slot) == self.interrupt_trampoline
    }

    /// Calibration byte persisted by the last upload, if any.
    pub fn stored_calibration<D: FlashDevice>(&self, flash: &Flash<D>) -> Option<u8> {
        match flash.read_byte(self.calibration_address()) {
            0x00 | 0xFF => None,
            value => Some(value),
        }
    }
}
