//! Self-programming flash primitives
//!
//! Mirrors the SPM instruction set of small AVRs: a page is erased as a whole,
//! filled word by word into a temporary buffer and then written in one go.
//! Erase and write keep the CPU stalled for several milliseconds.

use core::convert::Infallible;

pub trait FlashDevice {
    /// Erase the page containing `address`.
    fn erase_page(&mut self, address: u16);

    /// Store `word` at the page buffer location selected by `address`.
    fn fill_buffer(&mut self, address: u16, word: u16);

    /// Reset the page buffer to the erased state.
    fn clear_buffer(&mut self);

    /// Program the page containing `address` from the page buffer.
    fn write_page(&mut self, address: u16);

    /// `WouldBlock` while an erase or write is still in progress.
    fn poll_ready(&mut self) -> nb::Result<(), Infallible>;

    fn read_word(&self, address: u16) -> u16;

    fn read_byte(&self, address: u16) -> u8;

    /// Mask all interrupts, remembering whether they were enabled. Flash
    /// operations must not race the transport.
    fn mask_interrupts(&mut self);

    /// Restore the interrupt state saved by the last `mask_interrupts`.
    fn unmask_interrupts(&mut self);
}
