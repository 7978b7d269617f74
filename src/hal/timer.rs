//! Timer0 delays
//!
//! Timer0 only runs for the length of a delay and is left stopped and zeroed,
//! so the application starts with it in its reset state. Counting timer ticks
//! keeps delays honest while the USB interrupt steals cycles.

use avr_device::attiny85::TC0;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::config::cycles_for_us;

/// TCCR0B clock select for F_CPU / 8.
const CLOCK_DIV8: u8 = 0b010;
const CYCLES_PER_TICK: u32 = 8;

/// Ticks waited per counter pass, leaving headroom before TCNT0 wraps.
const TICKS_PER_PASS: u32 = 128;

#[derive(Debug, Default, Clone, Copy)]
pub struct Delay;

impl Delay {
    pub const fn new() -> Self {
        Self
    }

    fn wait_ticks(&mut self, mut ticks: u32) {
        unsafe {
            let p = TC0::ptr();
            (*p).tccr0a.write(|w| w.bits(0));
            (*p).tcnt0.write(|w| w.bits(0));
            (*p).tccr0b.write(|w| w.bits(CLOCK_DIV8));

            while ticks > 0 {
                let pass = ticks.min(TICKS_PER_PASS);
                (*p).tcnt0.write(|w| w.bits(0));
                while u32::from((*p).tcnt0.read().bits()) < pass {}
                ticks -= pass;
            }

            (*p).tccr0b.write(|w| w.bits(0));
            (*p).tcnt0.write(|w| w.bits(0));
        }
    }
}

impl DelayUs<u16> for Delay {
    fn delay_us(&mut self, us: u16) {
        self.wait_ticks(cycles_for_us(us) / CYCLES_PER_TICK);
    }
}

impl DelayMs<u16> for Delay {
    fn delay_ms(&mut self, ms: u16) {
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}
