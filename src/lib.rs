//! USB self-programming bootloader for small AVR microcontrollers.
//!
//! The bootloader lives at the top of flash and shares the reset vector and
//! the USB interrupt vector with the application it installs. Uploaded vector
//! words are relocated into a tiny table right below the bootloader, so the
//! device always boots into the bootloader first and can never be bricked by
//! a bad upload.
#![no_std]
#![cfg_attr(target_arch = "avr", feature(asm_experimental_arch))]

#[cfg(test)]
extern crate std;

pub mod bootloader;
pub mod config;
pub mod drivers;
pub mod hal;
pub mod logger;
pub mod os;
pub mod protocol;

#[cfg(test)]
mod mock;

pub use bootloader::exit::Handoff;
pub use bootloader::policy::{AlwaysEnter, EntryPolicy, JumperPin};
pub use bootloader::{Bootloader, ExitReason};
pub use config::Config;
