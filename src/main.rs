#![cfg_attr(target_arch = "avr", no_std, no_main)]

#[cfg(target_arch = "avr")]
use panic_halt as _;

#[cfg(target_arch = "avr")]
use tinyloader::{
    config::Config,
    hal::{jump, vector, ClockControl, Delay, RamMarker, Spm, VUsb, Watchdog},
    AlwaysEnter, Bootloader,
};

#[cfg(target_arch = "avr")]
const CONFIG: Config = Config::from_features();

// A misaligned bootloader would program its own first page as the tiny table.
#[cfg(target_arch = "avr")]
const _: () = assert!(CONFIG.is_aligned(), "bootloader address must be page aligned");

#[cfg(target_arch = "avr")]
#[avr_device::entry]
fn main() -> ! {
    // The application may have left the watchdog running.
    Watchdog::new().disable();

    let config = CONFIG.with_interrupt_handler(vector::handler_address());
    let mut bootloader = Bootloader::new(
        config,
        Spm::new(),
        VUsb::new(),
        ClockControl::new(),
        RamMarker::new(),
    );

    match bootloader.run(&mut AlwaysEnter, &mut Delay::new()) {
        Ok(handoff) => jump(handoff.entry),
        // Flash errors only come from a layout that failed validation.
        Err(_) => panic!(),
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {}
