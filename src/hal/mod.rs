pub mod clock;
pub mod flash;
pub mod marker;

// ATtiny85 implementations of the seams above
#[cfg(target_arch = "avr")]
pub mod power;
#[cfg(target_arch = "avr")]
pub mod spm;
#[cfg(target_arch = "avr")]
pub mod timer;
#[cfg(target_arch = "avr")]
pub mod vector;
#[cfg(target_arch = "avr")]
pub mod vusb;
#[cfg(target_arch = "avr")]
pub mod watchdog;

pub use clock::{step_calibration, Clock};
pub use flash::FlashDevice;
pub use marker::SessionMarker;

#[cfg(target_arch = "avr")]
pub use power::ClockControl;
#[cfg(target_arch = "avr")]
pub use spm::Spm;
#[cfg(target_arch = "avr")]
pub use timer::Delay;
#[cfg(target_arch = "avr")]
pub use vector::{jump, RamMarker};
#[cfg(target_arch = "avr")]
pub use vusb::VUsb;
#[cfg(target_arch = "avr")]
pub use watchdog::Watchdog;
