//! Clock calibration and prescaler access

pub trait Clock {
    /// Current oscillator calibration (OSCCAL).
    fn calibration(&self) -> u8;

    fn set_calibration(&mut self, value: u8);

    /// Current clock prescaler setting (CLKPR).
    fn prescaler(&self) -> u8;

    fn set_prescaler(&mut self, value: u8);
}

/// Move the calibration towards `target` one unit at a time.
///
/// A single large jump can glitch the core clock, so every intermediate value
/// is written in turn.
pub fn step_calibration<C: Clock>(clock: &mut C, target: u8) {
    while clock.calibration() > target {
        let value = clock.calibration() - 1;
        clock.set_calibration(value);
    }
    while clock.calibration() < target {
        let value = clock.calibration() + 1;
        clock.set_calibration(value);
    }
}
