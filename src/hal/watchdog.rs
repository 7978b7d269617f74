use avr_device::attiny85::{CPU, WDT};

const WDRF: u8 = 1 << 3;
const WDCE_WDE: u8 = 0x18;

pub struct Watchdog {
    _private: (),
}

impl Watchdog {
    #[inline]
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Stop a watchdog the application left running.
    ///
    /// WDRF forces the watchdog on while set, so it is cleared first.
    #[inline]
    pub fn disable(&mut self) {
        avr_device::interrupt::free(|_| unsafe {
            (*CPU::ptr()).mcusr.modify(|r, w| w.bits(r.bits() & !WDRF));

            let p = WDT::ptr();
            // Timed sequence to disable watchdog
            (*p).wdtcr.write(|w| w.bits(WDCE_WDE));
            (*p).wdtcr.write(|w| w.bits(0x00));
        });
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}
