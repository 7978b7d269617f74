use avr_device::attiny85::CPU;

use super::clock::Clock;

/// CLKPR change enable; the new value must follow within four cycles.
const CLKPCE: u8 = 0x80;

/// OSCCAL and CLKPR of the ATtiny85.
pub struct ClockControl {
    _private: (),
}

impl ClockControl {
    #[inline]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ClockControl {
    #[inline]
    fn calibration(&self) -> u8 {
        unsafe { (*CPU::ptr()).osccal.read().bits() }
    }

    #[inline]
    fn set_calibration(&mut self, value: u8) {
        unsafe {
            (*CPU::ptr()).osccal.write(|w| w.bits(value));
        }
    }

    #[inline]
    fn prescaler(&self) -> u8 {
        unsafe { (*CPU::ptr()).clkpr.read().bits() }
    }

    fn set_prescaler(&mut self, value: u8) {
        avr_device::interrupt::free(|_| unsafe {
            let p = CPU::ptr();
            // Timed sequence
            (*p).clkpr.write(|w| w.bits(CLKPCE));
            (*p).clkpr.write(|w| w.bits(value & !CLKPCE));
        });
    }
}
