//! Hand-over to the application

use super::policy::EntryPolicy;
use super::{Bootloader, ExitReason, Phase};
use crate::config::{Oscillator, Prescaler, EXIT_SETTLE_MS};
use crate::drivers::flash::Result;
use crate::hal::clock::{step_calibration, Clock};
use crate::hal::flash::FlashDevice;
use crate::hal::marker::SessionMarker;
use crate::logger::{Log, Record};
use crate::protocol::transport::Transport;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};

/// Where to jump once the bootloader is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff {
    /// Byte address of the application reset trampoline.
    pub entry: u16,
    pub reason: ExitReason,
}

impl<D, T, C, M, L> Bootloader<D, T, C, M, L>
where
    D: FlashDevice,
    T: Transport,
    C: Clock,
    M: SessionMarker,
    L: Log,
{
    /// Undo everything the bootloader changed and return the jump target.
    ///
    /// The caller performs the jump; it never returns.
    pub fn leave<P, Dl>(&mut self, reason: ExitReason, policy: &mut P, delay: &mut Dl) -> Handoff
    where
        P: EntryPolicy,
        Dl: DelayMs<u16>,
    {
        self.phase = Phase::Exiting;
        self.log.record(Record::Exit {
            reason,
            wrote_page: self.session.wrote_page,
        });

        // Let the last USB reply go out before the bus goes quiet.
        delay.delay_ms(EXIT_SETTLE_MS);
        policy.exit();

        self.transport.shutdown();
        self.marker.clear();

        match self.config.oscillator {
            Oscillator::Crystal => {}
            Oscillator::RestoreDefault => {
                step_calibration(&mut self.clock, self.boot_clock.calibration);
            }
            Oscillator::Persisted => {
                // Not using the stored value while bootloading keeps a device
                // with a bad stored calibration recoverable.
                if let Some(stored) = self.engine.stored_calibration(&self.flash) {
                    step_calibration(&mut self.clock, stored);
                }
            }
        }

        match self.config.prescaler {
            Prescaler::Untouched => {}
            Prescaler::RestoreDefault => self.clock.set_prescaler(self.boot_clock.prescaler),
            Prescaler::Fixed(value) => self.clock.set_prescaler(value),
        }

        Handoff {
            entry: self.engine.app_entry(),
            reason,
        }
    }

    /// Serve a whole session and prepare the hand-over.
    pub fn run<P, Dl>(&mut self, policy: &mut P, delay: &mut Dl) -> Result<Handoff>
    where
        P: EntryPolicy,
        Dl: DelayMs<u16> + DelayUs<u16>,
    {
        let reason = self.serve(policy, delay)?;
        Ok(self.leave(reason, policy, delay))
    }
}
