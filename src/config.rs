//! Build-time configuration for the bootloader

include!(concat!(env!("OUT_DIR"), "/layout.rs"));

/// Protocol version reported to host tools.
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 6;

/// Milliseconds the host must wait after an erase or write request.
/// The chip freezes for about 4.5 ms per flash operation.
pub const WRITE_SLEEP_MS: u8 = 8;

/// Length in bytes of the tiny vector table below the bootloader.
pub const TINY_TABLE_LEN: u16 = 6;

pub const APP_RESET_OFFSET: u16 = 0;
pub const APP_INTERRUPT_OFFSET: u16 = 2;
pub const STORED_CALIBRATION_OFFSET: u16 = 4;

/// Contents of a flash word in the erased state.
pub const ERASED_WORD: u16 = 0xFFFF;

/// Main loop sleep between transport polls.
pub const POLL_INTERVAL_US: u16 = 100;

/// Polls per millisecond, used to turn the auto-exit timeout into a poll count.
pub const POLLS_PER_MS: u32 = 1000 / POLL_INTERVAL_US as u32;

/// Core clock while the bootloader runs, tuned for low-speed USB.
pub const F_CPU_HZ: u32 = 16_500_000;

/// Words of the V-USB interrupt prologue at 16.5 MHz: `push YL`,
/// `in YL, SREG`, `push YL`. Slower or faster clocks also push YH.
pub const VUSB_PROLOGUE_WORDS: u8 = 3;

/// Whether the application's USB vector continues the V-USB dispatch the
/// bootloader wrapper started, with its prologue already on the stack.
pub const APP_SHARES_DISPATCH: bool = cfg!(feature = "app-uses-vusb");

pub const REENUMERATE_MS: u16 = 500;
pub const PAGE_WRITE_SETTLE_US: u16 = 2000;
pub const EXIT_SETTLE_MS: u16 = 10;

pub const ATTINY85_FLASH_SIZE: u16 = 0x2000;
pub const ATTINY85_PAGE_SIZE: u16 = 64;
/// INT0 on the ATtiny85.
pub const ATTINY85_USB_VECTOR: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Oscillator {
    /// External crystal; no calibration is persisted or restored.
    Crystal,
    /// Calibrated RC oscillator. The value in use while uploading is persisted
    /// in the tiny table and stepped to before the application starts.
    Persisted,
    /// Calibrated RC oscillator stepped back to the value found at boot.
    RestoreDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prescaler {
    /// Leave CLKPR alone.
    Untouched,
    /// Run at full speed while servicing, restore the fuse default on exit.
    RestoreDefault,
    /// Run at full speed while servicing, set this CLKPR value on exit.
    Fixed(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppInterrupt {
    /// The application's USB vector is a regular interrupt handler.
    Independent,
    /// The application also uses V-USB. The wrapper leaves YL and SREG
    /// pushed and YL cleared, so the handler is entered past its own
    /// prologue of `skip_words` words.
    SharesDispatch { skip_words: u8 },
}

impl AppInterrupt {
    /// Interrupt entry matching the prologue the wrapper keeps on the stack.
    pub const fn vusb() -> Self {
        AppInterrupt::SharesDispatch { skip_words: VUSB_PROLOGUE_WORDS }
    }

    pub const fn skip_bytes(&self) -> u16 {
        match self {
            AppInterrupt::Independent => 0,
            AppInterrupt::SharesDispatch { skip_words } => *skip_words as u16 * 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    PageSize,
    UnalignedBootloader,
    BootloaderBeyondFlash,
    VectorOutsideFirstPage,
    TinyTableDoesNotFit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub flash_size: u16,
    pub page_size: u16,
    /// First byte of the protected bootloader region, page aligned.
    pub bootloader_address: u16,
    /// Interrupt vector number shared with the USB transport.
    pub usb_vector: u8,
    /// Bootloader entry, target of the reset trampoline.
    pub init_address: u16,
    /// Interrupt wrapper, target of the USB vector trampoline.
    pub interrupt_handler: u16,
    pub can_exit: bool,
    pub oscillator: Oscillator,
    pub prescaler: Prescaler,
    pub auto_exit_ms: Option<u16>,
    pub app_interrupt: AppInterrupt,
}

impl Config {
    pub const fn new(flash_size: u16, page_size: u16, bootloader_address: u16) -> Self {
        Self {
            flash_size,
            page_size,
            bootloader_address,
            usb_vector: ATTINY85_USB_VECTOR,
            init_address: bootloader_address,
            interrupt_handler: bootloader_address + 2,
            can_exit: false,
            oscillator: Oscillator::Persisted,
            prescaler: Prescaler::Untouched,
            auto_exit_ms: None,
            app_interrupt: AppInterrupt::Independent,
        }
    }

    pub const fn attiny85() -> Self {
        Self::new(ATTINY85_FLASH_SIZE, ATTINY85_PAGE_SIZE, BOOTLOADER_ADDRESS)
    }

    /// Firmware configuration selected through Cargo features.
    pub const fn from_features() -> Self {
        let mut config = Self::attiny85();
        config.can_exit = cfg!(feature = "can-exit");
        config.oscillator = if cfg!(feature = "crystal") {
            Oscillator::Crystal
        } else if cfg!(feature = "restore-osccal") {
            Oscillator::RestoreDefault
        } else {
            Oscillator::Persisted
        };
        if cfg!(feature = "low-power") {
            config.prescaler = Prescaler::RestoreDefault;
        }
        if cfg!(feature = "auto-exit") {
            config.auto_exit_ms = Some(AUTO_EXIT_MS);
        }
        if APP_SHARES_DISPATCH {
            config.app_interrupt = AppInterrupt::vusb();
        }
        config
    }

    pub const fn with_usb_vector(mut self, vector: u8) -> Self {
        self.usb_vector = vector;
        self
    }

    pub const fn with_init_address(mut self, address: u16) -> Self {
        self.init_address = address;
        self
    }

    pub const fn with_interrupt_handler(mut self, address: u16) -> Self {
        self.interrupt_handler = address;
        self
    }

    pub const fn with_exit(mut self, can_exit: bool) -> Self {
        self.can_exit = can_exit;
        self
    }

    pub const fn with_oscillator(mut self, oscillator: Oscillator) -> Self {
        self.oscillator = oscillator;
        self
    }

    pub const fn with_prescaler(mut self, prescaler: Prescaler) -> Self {
        self.prescaler = prescaler;
        self
    }

    pub const fn with_auto_exit_ms(mut self, timeout: u16) -> Self {
        self.auto_exit_ms = Some(timeout);
        self
    }

    pub const fn with_app_interrupt(mut self, app_interrupt: AppInterrupt) -> Self {
        self.app_interrupt = app_interrupt;
        self
    }

    /// Byte address of the reset vector slot.
    pub const fn reset_slot(&self) -> u16 {
        0
    }

    /// Byte address of the shared USB interrupt vector slot.
    pub const fn interrupt_slot(&self) -> u16 {
        self.usb_vector as u16 * 2
    }

    pub const fn tiny_table_address(&self) -> u16 {
        self.bootloader_address - TINY_TABLE_LEN
    }

    pub const fn auto_exit_polls(&self) -> Option<u32> {
        match self.auto_exit_ms {
            Some(ms) => Some(ms as u32 * POLLS_PER_MS),
            None => None,
        }
    }

    pub const fn is_aligned(&self) -> bool {
        self.page_size != 0 && self.bootloader_address % self.page_size == 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // The device info reply carries the page size in one byte.
        if self.page_size == 0 || self.page_size % 2 != 0 || self.page_size > 0xFF {
            return Err(ConfigError::PageSize);
        }
        if !self.is_aligned() {
            return Err(ConfigError::UnalignedBootloader);
        }
        if self.bootloader_address > self.flash_size {
            return Err(ConfigError::BootloaderBeyondFlash);
        }
        if self.interrupt_slot() == self.reset_slot() || self.interrupt_slot() >= self.page_size {
            return Err(ConfigError::VectorOutsideFirstPage);
        }
        if self.bootloader_address < self.page_size || TINY_TABLE_LEN > self.page_size {
            return Err(ConfigError::TinyTableDoesNotFit);
        }
        Ok(())
    }
}

/// Busy-wait cycles covering `us` microseconds at [`F_CPU_HZ`].
pub const fn cycles_for_us(us: u16) -> u32 {
    us as u32 * (F_CPU_HZ / 1000) / 1000
}
