//! Session event logging
//!
//! The reference board has no spare pin for a console, so the firmware logs
//! into `()`. Boards with a serial line, and the host tests, plug a
//! [`ufmt::uWrite`] sink into [`Logger`].

use crate::bootloader::ExitReason;
use crate::drivers::flash::FlashError;
use ufmt::derive::uDebug;
use ufmt::{uWrite, uwriteln};

#[derive(Debug, Clone, Copy, PartialEq, Eq, uDebug)]
pub enum Record {
    /// Vector page was missing the bootloader trampolines and has been rewritten.
    VectorsRestored,
    SessionStarted,
    DeviceInfo,
    WriteStarted { address: u16 },
    /// Host data at or above the bootloader boundary was dropped.
    WriteDiscarded { address: u16 },
    WriteRejected(FlashError),
    ApplicationErased,
    PageCommitted { address: u16 },
    Exit { reason: ExitReason, wrote_page: bool },
}

pub trait Log {
    fn record(&mut self, record: Record);
}

impl Log for () {
    #[inline]
    fn record(&mut self, _record: Record) {}
}

pub struct Logger<W> {
    writer: W,
}

impl<W: uWrite> Logger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    pub fn release(self) -> W {
        self.writer
    }
}

impl<W: uWrite> Log for Logger<W> {
    fn record(&mut self, record: Record) {
        // A failing log sink must never disturb an upload.
        let _ = uwriteln!(self.writer, "[boot] {:?}", record);
    }
}
