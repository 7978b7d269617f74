//! Board specific entry and exit conditions

use embedded_hal::digital::v2::InputPin;

pub trait EntryPolicy {
    /// Runs once at boot, before the start condition is checked.
    fn init(&mut self) {}

    /// Checked once at boot. False hands straight over to the application.
    fn start_condition(&mut self) -> bool;

    /// Checked after every main loop iteration.
    fn keep_running(&mut self) -> bool;

    /// Runs at the start of the exit sequence.
    fn exit(&mut self) {}
}

/// Enter on every reset and stay until the host or a timeout ends the session.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysEnter;

impl EntryPolicy for AlwaysEnter {
    fn start_condition(&mut self) -> bool {
        true
    }

    fn keep_running(&mut self) -> bool {
        true
    }
}

/// Enter and stay while a jumper pulls the pin low.
///
/// A pin that cannot be read counts as released.
pub struct JumperPin<P> {
    pin: P,
}

impl<P: InputPin> JumperPin<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }

    fn engaged(&mut self) -> bool {
        self.pin.is_low().unwrap_or(false)
    }
}

impl<P: InputPin> EntryPolicy for JumperPin<P> {
    fn start_condition(&mut self) -> bool {
        self.engaged()
    }

    fn keep_running(&mut self) -> bool {
        self.engaged()
    }
}
