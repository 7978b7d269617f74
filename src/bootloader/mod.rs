//! Bootloader session and main loop
//!
//! ```text
//! IdleWait --start condition--> Servicing --execute/release/timeout--> Exiting
//!     \-------------------- start condition false ---------------------/
//! ```
//!
//! The transport is polled from the loop body; its callbacks only record
//! events. Erases and page writes run afterwards, when the transport is
//! between requests and the host is honouring the advertised write sleep.

pub mod exit;
pub mod pages;
pub mod policy;
pub mod rjmp;
pub mod session;
pub mod vectors;

use crate::config::{Config, Prescaler, PAGE_WRITE_SETTLE_US, POLL_INTERVAL_US, REENUMERATE_MS};
use crate::drivers::flash::{Flash, Result};
use crate::hal::clock::Clock;
use crate::hal::flash::FlashDevice;
use crate::hal::marker::SessionMarker;
use crate::logger::{Log, Record};
use crate::os::Event;
use crate::protocol::transport::Transport;
use crate::protocol::Uploader;
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use policy::EntryPolicy;
use session::Session;
use ufmt::derive::uDebug;
use vectors::VectorEngine;

/// Clock prescaler that puts the core at full speed.
const PRESCALER_DIV1: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    IdleWait,
    Servicing,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uDebug)]
pub enum ExitReason {
    /// The start condition did not hold at boot.
    NotEntered,
    /// The host asked to run the application.
    Execute,
    /// The continuation condition went false.
    Released,
    /// No host activity for the configured auto-exit timeout.
    IdleTimeout,
}

/// Clock settings found at boot, before the bootloader touched anything.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BootClock {
    pub calibration: u8,
    pub prescaler: u8,
}

pub struct Bootloader<D, T, C, M, L = ()> {
    config: Config,
    engine: VectorEngine,
    flash: Flash<D>,
    transport: T,
    clock: C,
    marker: M,
    log: L,
    session: Session,
    phase: Phase,
    boot_clock: BootClock,
}

impl<D, T, C, M> Bootloader<D, T, C, M>
where
    D: FlashDevice,
    T: Transport,
    C: Clock,
    M: SessionMarker,
{
    pub fn new(config: Config, device: D, transport: T, clock: C, marker: M) -> Self {
        let flash = Flash::new(
            device,
            config.page_size,
            config.flash_size,
            config.bootloader_address,
        );
        let calibration = clock.calibration();
        Self {
            engine: VectorEngine::new(&config),
            config,
            flash,
            transport,
            clock,
            marker,
            log: (),
            session: Session::new(calibration),
            phase: Phase::IdleWait,
            boot_clock: BootClock::default(),
        }
    }
}

impl<D, T, C, M, L> Bootloader<D, T, C, M, L>
where
    D: FlashDevice,
    T: Transport,
    C: Clock,
    M: SessionMarker,
    L: Log,
{
    pub fn with_log<L2: Log>(self, log: L2) -> Bootloader<D, T, C, M, L2> {
        Bootloader {
            config: self.config,
            engine: self.engine,
            flash: self.flash,
            transport: self.transport,
            clock: self.clock,
            marker: self.marker,
            log,
            session: self.session,
            phase: self.phase,
            boot_clock: self.boot_clock,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &VectorEngine {
        &self.engine
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn flash(&self) -> &Flash<D> {
        &self.flash
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The transport's own calibration search may retune the oscillator.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn marker(&self) -> &M {
        &self.marker
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Boot-time preparation: remember the clock, claim the interrupt vector
    /// and make sure the vector page can always bring us back here.
    pub fn init(&mut self) -> Result<()> {
        self.boot_clock = BootClock {
            calibration: self.clock.calibration(),
            prescaler: self.clock.prescaler(),
        };
        self.marker.arm();

        if !self.engine.bootloader_vectors_present(&self.flash) {
            // Half-written vectors cannot be fixed by programming alone.
            self.flash.erase_page(0)?;
            self.session.calibration = self.clock.calibration();
            pages::fabricate_vectors(&self.engine, &mut self.session, &mut self.flash)?;
            self.log.record(Record::VectorsRestored);
        }
        self.session.cursor = 0;
        Ok(())
    }

    /// Run the session from boot until it is time to leave.
    pub fn serve<P, Dl>(&mut self, policy: &mut P, delay: &mut Dl) -> Result<ExitReason>
    where
        P: EntryPolicy,
        Dl: DelayMs<u16> + DelayUs<u16>,
    {
        self.init()?;
        policy.init();

        if !policy.start_condition() {
            self.phase = Phase::Exiting;
            return Ok(ExitReason::NotEntered);
        }

        self.start_servicing(delay);
        let reason = loop {
            if let Some(reason) = self.poll(policy, delay)? {
                break reason;
            }
        };
        self.phase = Phase::Exiting;
        Ok(reason)
    }

    /// Enter the servicing phase: full clock speed and a fresh enumeration.
    pub fn start_servicing<Dl: DelayMs<u16>>(&mut self, delay: &mut Dl) {
        if self.config.prescaler != Prescaler::Untouched {
            self.clock.set_prescaler(PRESCALER_DIV1);
        }

        self.transport.disconnect();
        delay.delay_ms(REENUMERATE_MS);
        self.transport.connect();

        self.phase = Phase::Servicing;
        self.log.record(Record::SessionStarted);
    }

    /// One main loop iteration. Returns why the session should end, if it should.
    pub fn poll<P, Dl>(&mut self, policy: &mut P, delay: &mut Dl) -> Result<Option<ExitReason>>
    where
        P: EntryPolicy,
        Dl: DelayUs<u16>,
    {
        self.session.calibration = self.clock.calibration();
        self.transport.poll(&mut Uploader {
            config: &self.config,
            engine: &self.engine,
            session: &mut self.session,
            flash: &mut self.flash,
            log: &mut self.log,
        });
        delay.delay_us(POLL_INTERVAL_US);
        self.session.idle.tick();

        // Both of these stall the chip for milliseconds; the host waits out
        // the advertised write sleep after each request.
        if self.session.events.contains(Event::EraseApplication) {
            self.erase_application()?;
        }
        if self.session.events.contains(Event::WritePage) {
            delay.delay_us(PAGE_WRITE_SETTLE_US);
            self.write_page()?;
        }

        let execute = self.config.can_exit && self.session.events.contains(Event::Execute);
        self.session.events.clear();

        if execute {
            return Ok(Some(ExitReason::Execute));
        }
        if let Some(limit) = self.config.auto_exit_polls() {
            if self.session.idle.exceeds(limit) {
                return Ok(Some(ExitReason::IdleTimeout));
            }
        }
        if !policy.keep_running() {
            return Ok(Some(ExitReason::Released));
        }
        Ok(None)
    }

    /// Erase every application page, highest first, then restore the vectors.
    ///
    /// Page 0 goes last and is rewritten straight away, so the trampolines
    /// are missing only for the one erase-plus-write window. During that
    /// window the whole application area is erased and execution from reset
    /// runs through blank flash into the bootloader.
    fn erase_application(&mut self) -> Result<()> {
        let page_size = self.flash.page_size();
        let mut address = self.config.bootloader_address;
        while address != 0 {
            address -= page_size;
            self.flash.erase_page(address)?;
        }

        pages::fabricate_vectors(&self.engine, &mut self.session, &mut self.flash)?;
        self.log.record(Record::ApplicationErased);
        Ok(())
    }

    fn write_page(&mut self) -> Result<()> {
        if self.flash.is_page_aligned(self.session.cursor) {
            pages::commit(&mut self.session, &mut self.flash)?;
        } else {
            // Short final page: pad with erased words.
            pages::fill_and_commit(&self.engine, &mut self.session, &mut self.flash)?;
        }
        self.log.record(Record::PageCommitted {
            address: self.flash.page_start(self.session.cursor.wrapping_sub(2)),
        });
        Ok(())
    }
}
