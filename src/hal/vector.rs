//! Shared USB interrupt vector and the jump into the application
//!
//! Hardware vector 1 (INT0) always lands in `tinyloader_usb_vector`. It looks
//! at the session marker in the two bytes at the end of RAM and forwards to
//! the V-USB handler while a session is open, otherwise to the application's
//! relocated handler in the tiny table. The linker keeps the stack below the
//! marker.
//!
//! The bootloader path adds 11 cycles over entering the driver directly
//! (16 against the driver's 5 cycle prologue) before sync detection starts.

use core::arch::{asm, global_asm};
use core::ptr;

use super::marker::{SessionMarker, SESSION_MAGIC};
use crate::config::{APP_INTERRUPT_OFFSET, BOOTLOADER_ADDRESS, TINY_TABLE_LEN};

/// Last RAM byte of the ATtiny85.
pub const RAMEND: u16 = 0x025F;

/// Emits the wrapper with the given application exit. The bootloader path
/// leaves YL and SREG pushed and YL cleared, the state V-USB has right
/// after its own prologue.
macro_rules! usb_vector_wrapper {
    ($($app_exit:literal),*) => {
        global_asm!(
            ".section .text.tinyloader_usb_vector,\"ax\",@progbits",
            ".global tinyloader_usb_vector",
            "tinyloader_usb_vector:",
            "push r28",
            "in r28, 0x3F",
            "push r28",
            "lds r28, {ramend}",
            "cpi r28, {magic0}",
            "brne 1f",
            "lds r28, {ramend} - 1",
            "cpi r28, {magic1}",
            "brne 1f",
            // Straight into sync detection, past the driver's own prologue.
            "clr r28",
            "rjmp waitForJ",
            "1:",
            $($app_exit,)*
            "rjmp {app_vector}",
            ramend = const RAMEND,
            magic0 = const SESSION_MAGIC[0],
            magic1 = const SESSION_MAGIC[1],
            app_vector = const BOOTLOADER_ADDRESS - TINY_TABLE_LEN + APP_INTERRUPT_OFFSET,
        );
    };
}

// The tiny table entry skips the application's prologue of
// VUSB_PROLOGUE_WORDS, which this frame stands in for.
#[cfg(feature = "app-uses-vusb")]
usb_vector_wrapper!("clr r28");

#[cfg(not(feature = "app-uses-vusb"))]
usb_vector_wrapper!("pop r28", "out 0x3F, r28", "pop r28");

extern "C" {
    fn tinyloader_usb_vector();
}

/// Byte address of the shared vector wrapper, target of the interrupt trampoline.
pub fn handler_address() -> u16 {
    // Code pointers are word addresses.
    (tinyloader_usb_vector as usize as u16) << 1
}

/// Session marker in the last two bytes of RAM.
pub struct RamMarker {
    _private: (),
}

impl RamMarker {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn cells() -> (*mut u8, *mut u8) {
        (RAMEND as *mut u8, (RAMEND - 1) as *mut u8)
    }
}

impl Default for RamMarker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMarker for RamMarker {
    fn arm(&mut self) {
        let (first, second) = Self::cells();
        unsafe {
            ptr::write_volatile(first, SESSION_MAGIC[0]);
            ptr::write_volatile(second, SESSION_MAGIC[1]);
        }
    }

    fn clear(&mut self) {
        let (first, second) = Self::cells();
        unsafe {
            ptr::write_volatile(first, 0);
            ptr::write_volatile(second, 0);
        }
    }

    fn is_armed(&self) -> bool {
        let (first, second) = Self::cells();
        unsafe { [ptr::read_volatile(first), ptr::read_volatile(second)] == SESSION_MAGIC }
    }
}

/// Jump to the code at byte address `entry`.
pub fn jump(entry: u16) -> ! {
    unsafe {
        asm!("ijmp", in("Z") entry >> 1, options(noreturn));
    }
}
