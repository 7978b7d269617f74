//! Flash page programmer
//!
//! Wraps a [`FlashDevice`] with the rules the bootloader relies on: pages are
//! staged front to back, committed only once staged to the end, every erase
//! and write runs with interrupts masked, and nothing at or above the
//! protected boundary is ever erased or programmed.

use crate::hal::flash::FlashDevice;
use ufmt::derive::uDebug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, uDebug)]
pub enum FlashError {
    /// Address past the end of flash.
    OutOfRange { address: u16 },
    /// Erase or write inside the bootloader region.
    Protected { address: u16 },
    /// Page buffer offsets must increase within a page.
    OutOfOrder { address: u16 },
    /// Commit requested before the page buffer was filled to the end.
    IncompletePage { address: u16 },
}

pub type Result<T> = core::result::Result<T, FlashError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Staging {
    page: u16,
    /// Page offset of the next word the buffer accepts.
    next: u16,
}

pub struct Flash<D> {
    device: D,
    page_size: u16,
    flash_size: u16,
    protected_from: u16,
    staging: Option<Staging>,
}

impl<D: FlashDevice> Flash<D> {
    pub fn new(device: D, page_size: u16, flash_size: u16, protected_from: u16) -> Self {
        Self {
            device,
            page_size,
            flash_size,
            protected_from,
            staging: None,
        }
    }

    #[inline]
    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    #[inline]
    pub fn page_start(&self, address: u16) -> u16 {
        address - self.page_offset(address)
    }

    #[inline]
    pub fn page_offset(&self, address: u16) -> u16 {
        address % self.page_size
    }

    #[inline]
    pub fn is_page_aligned(&self, address: u16) -> bool {
        self.page_offset(address) == 0
    }

    fn check_writable(&self, address: u16) -> Result<()> {
        if address >= self.flash_size {
            return Err(FlashError::OutOfRange { address });
        }
        if address >= self.protected_from {
            return Err(FlashError::Protected { address });
        }
        Ok(())
    }

    fn wait(&mut self) {
        let _ = nb::block!(self.device.poll_ready());
    }

    /// Erase the page containing `address`.
    pub fn erase_page(&mut self, address: u16) -> Result<()> {
        self.check_writable(address)?;

        self.device.mask_interrupts();
        self.device.erase_page(address);
        self.wait();
        self.device.unmask_interrupts();
        Ok(())
    }

    /// Stage one word into the page buffer at the page offset of `address`.
    ///
    /// Moving to another page, or starting again at offset zero, clears the
    /// buffer first so stale words never reach the next commit.
    pub fn fill_page_buffer_word(&mut self, address: u16, word: u16) -> Result<()> {
        self.check_writable(address)?;

        let page = self.page_start(address);
        let offset = self.page_offset(address);
        let fresh = match self.staging {
            Some(staging) if staging.page == page && offset != 0 => {
                if offset < staging.next {
                    return Err(FlashError::OutOfOrder { address });
                }
                false
            }
            _ => true,
        };

        self.device.mask_interrupts();
        if fresh {
            self.device.clear_buffer();
        }
        self.device.fill_buffer(address, word);
        self.device.unmask_interrupts();

        self.staging = Some(Staging {
            page,
            next: offset + 2,
        });
        Ok(())
    }

    /// Program the staged buffer into the page containing `address`.
    pub fn commit_page(&mut self, address: u16) -> Result<()> {
        self.check_writable(address)?;

        match self.staging {
            Some(staging)
                if staging.page == self.page_start(address) && staging.next == self.page_size => {}
            _ => return Err(FlashError::IncompletePage { address }),
        }

        self.device.mask_interrupts();
        self.device.write_page(address);
        self.wait();
        self.device.unmask_interrupts();

        // The hardware drops the buffer after a page write.
        self.staging = None;
        Ok(())
    }

    pub fn read_word(&self, address: u16) -> u16 {
        self.device.read_word(address)
    }

    pub fn read_byte(&self, address: u16) -> u8 {
        self.device.read_byte(address)
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn release(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{FlashOp, MockFlash};

    fn flash() -> Flash<MockFlash> {
        Flash::new(MockFlash::new(0x2000, 64), 64, 0x2000, 0x1800)
    }

    fn stage_page(flash: &mut Flash<MockFlash>, page: u16, word: u16) {
        for offset in (0..64).step_by(2) {
            flash.fill_page_buffer_word(page + offset, word).unwrap();
        }
    }

    #[test]
    fn commits_a_fully_staged_page() {
        let mut flash = flash();
        flash.erase_page(0x0040).unwrap();
        stage_page(&mut flash, 0x0040, 0x1234);
        flash.commit_page(0x0040).unwrap();

        assert_eq!(flash.read_word(0x0040), 0x1234);
        assert_eq!(flash.read_word(0x007E), 0x1234);
        assert_eq!(flash.read_word(0x0080), 0xFFFF);
    }

    #[test]
    fn erase_and_write_run_with_interrupts_masked() {
        let mut flash = flash();
        flash.erase_page(0x0000).unwrap();
        stage_page(&mut flash, 0x0000, 0x0000);
        flash.commit_page(0x0000).unwrap();

        let device = flash.device();
        assert!(device.ops.iter().all(|op| op.masked));
        assert!(!device.masked);
        assert!(device.busy_polls > 0);
    }

    #[test]
    fn keeps_interrupts_masked_when_called_masked() {
        let mut flash = flash();
        flash.device_mut().masked = true;

        flash.erase_page(0x0040).unwrap();
        assert!(flash.device().masked);
        stage_page(&mut flash, 0x0040, 0x5555);
        flash.commit_page(0x0040).unwrap();

        assert!(flash.device().masked);
        assert!(flash.device().ops.iter().all(|op| op.masked));
    }

    #[test]
    fn refuses_partial_commit() {
        let mut flash = flash();
        flash.fill_page_buffer_word(0x0000, 0xAAAA).unwrap();
        assert_eq!(
            flash.commit_page(0x0000),
            Err(FlashError::IncompletePage { address: 0x0000 })
        );
        assert_eq!(
            flash.commit_page(0x0040),
            Err(FlashError::IncompletePage { address: 0x0040 })
        );
    }

    #[test]
    fn offsets_must_increase_within_a_page() {
        let mut flash = flash();
        flash.fill_page_buffer_word(0x0010, 1).unwrap();
        assert_eq!(
            flash.fill_page_buffer_word(0x000E, 2),
            Err(FlashError::OutOfOrder { address: 0x000E })
        );
        assert_eq!(
            flash.fill_page_buffer_word(0x0010, 2),
            Err(FlashError::OutOfOrder { address: 0x0010 })
        );
        // Restarting the page is always allowed.
        flash.fill_page_buffer_word(0x0000, 3).unwrap();
    }

    #[test]
    fn starting_mid_page_pads_with_erased_words() {
        let mut flash = flash();
        for offset in (0x20..0x40).step_by(2) {
            flash.fill_page_buffer_word(offset, 0x0101).unwrap();
        }
        flash.commit_page(0x003E).unwrap();

        assert_eq!(flash.read_word(0x0000), 0xFFFF);
        assert_eq!(flash.read_word(0x001E), 0xFFFF);
        assert_eq!(flash.read_word(0x0020), 0x0101);
    }

    #[test]
    fn switching_pages_clears_stale_words() {
        let mut flash = flash();
        flash.fill_page_buffer_word(0x0000, 0x0000).unwrap();
        flash.fill_page_buffer_word(0x0042, 0x2222).unwrap();

        assert!(flash.device().ops.iter().filter(|op| op.kind == FlashOp::ClearBuffer).count() == 2);
        assert_eq!(flash.device().buffer[0], 0xFFFF);
    }

    #[test]
    fn guards_bootloader_and_flash_end() {
        let mut flash = flash();
        assert_eq!(flash.erase_page(0x1800), Err(FlashError::Protected { address: 0x1800 }));
        assert_eq!(
            flash.fill_page_buffer_word(0x1FFE, 0),
            Err(FlashError::Protected { address: 0x1FFE })
        );
        assert_eq!(flash.erase_page(0x2000), Err(FlashError::OutOfRange { address: 0x2000 }));
        assert!(flash.device().ops.is_empty());
    }
}
