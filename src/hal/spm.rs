//! SPM self-programming on the ATtiny85
//!
//! SPMCSR sits at I/O address 0x37. Each command is armed by writing SPMCSR
//! and must be followed by `spm` within four cycles, so every command is a
//! single asm block.

use core::arch::asm;
use core::convert::Infallible;

use super::flash::FlashDevice;

const SPMEN: u8 = 1 << 0;
const PGERS: u8 = 1 << 1;
const PGWRT: u8 = 1 << 2;
const CTPB: u8 = 1 << 4;

const PAGE_ERASE: u8 = PGERS | SPMEN;
const PAGE_WRITE: u8 = PGWRT | SPMEN;
const BUFFER_FILL: u8 = SPMEN;
const BUFFER_CLEAR: u8 = CTPB | SPMEN;

/// SREG global interrupt enable.
const SREG_I: u8 = 1 << 7;

pub struct Spm {
    /// Interrupts were enabled when last masked.
    restore_interrupts: bool,
}

impl Spm {
    #[inline]
    pub fn new() -> Self {
        Self { restore_interrupts: false }
    }

    #[inline(always)]
    fn command(command: u8, address: u16) {
        unsafe {
            asm!(
                "out 0x37, {cmd}",
                "spm",
                cmd = in(reg) command,
                in("Z") address,
            );
        }
    }

    #[inline]
    fn spmcsr() -> u8 {
        let value: u8;
        unsafe {
            asm!("in {value}, 0x37", value = out(reg) value);
        }
        value
    }
}

impl Default for Spm {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashDevice for Spm {
    fn erase_page(&mut self, address: u16) {
        Self::command(PAGE_ERASE, address);
    }

    fn fill_buffer(&mut self, address: u16, word: u16) {
        unsafe {
            asm!(
                "movw r0, {word}",
                "out 0x37, {cmd}",
                "spm",
                // r1 is the zero register
                "clr r1",
                word = in(reg_pair) word,
                cmd = in(reg) BUFFER_FILL,
                in("Z") address,
            );
        }
    }

    fn clear_buffer(&mut self) {
        Self::command(BUFFER_CLEAR, 0);
    }

    fn write_page(&mut self, address: u16) {
        Self::command(PAGE_WRITE, address);
    }

    fn poll_ready(&mut self) -> nb::Result<(), Infallible> {
        if Self::spmcsr() & SPMEN != 0 {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn read_word(&self, address: u16) -> u16 {
        let low: u8;
        let high: u8;
        unsafe {
            asm!(
                "lpm {low}, Z+",
                "lpm {high}, Z",
                low = out(reg) low,
                high = out(reg) high,
                inout("Z") address => _,
            );
        }
        u16::from_le_bytes([low, high])
    }

    fn read_byte(&self, address: u16) -> u8 {
        let value: u8;
        unsafe {
            asm!(
                "lpm {value}, Z",
                value = out(reg) value,
                in("Z") address,
            );
        }
        value
    }

    #[inline]
    fn mask_interrupts(&mut self) {
        let sreg: u8;
        unsafe {
            asm!("in {sreg}, 0x3F", "cli", sreg = out(reg) sreg);
        }
        self.restore_interrupts = sreg & SREG_I != 0;
    }

    #[inline]
    fn unmask_interrupts(&mut self) {
        if self.restore_interrupts {
            unsafe { avr_device::interrupt::enable() };
        }
    }
}
