//! Upload protocol
//!
//! Four vendor control requests drive an upload. Nothing that needs the
//! flash to stall happens here: erases and page writes are recorded in the
//! session's [`EventSet`](crate::os::EventSet) and carried out by the main
//! loop, after the transport has finished the request.

pub mod transport;

use crate::bootloader::pages;
use crate::bootloader::session::Session;
use crate::bootloader::vectors::VectorEngine;
use crate::config::{Config, WRITE_SLEEP_MS};
use crate::drivers::flash::Flash;
use crate::hal::flash::FlashDevice;
use crate::logger::{Log, Record};
use crate::os::Event;
use transport::{ControlHandler, ControlRequest, SetupReply};

pub const REQUEST_DEVICE_INFO: u8 = 0;
pub const REQUEST_WRITE_PAGE: u8 = 1;
pub const REQUEST_ERASE_APPLICATION: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    DeviceInfo,
    WritePage { address: u16 },
    EraseApplication,
    RunProgram,
}

impl Request {
    pub fn parse(request: &ControlRequest) -> Self {
        match request.request {
            REQUEST_DEVICE_INFO => Request::DeviceInfo,
            // Words only; an odd start would misalign every following word.
            REQUEST_WRITE_PAGE => Request::WritePage {
                address: request.index & !1,
            },
            REQUEST_ERASE_APPLICATION => Request::EraseApplication,
            _ => Request::RunProgram,
        }
    }
}

/// Reply to [`Request::DeviceInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// End of the application the host may upload. The tiny table below the
    /// bootloader is filled in from the uploaded vectors.
    pub application_end: u16,
    pub page_size: u8,
    pub write_sleep_ms: u8,
}

impl DeviceInfo {
    pub fn new(config: &Config) -> Self {
        Self {
            application_end: config.tiny_table_address(),
            // Validated to fit in a byte.
            page_size: config.page_size as u8,
            write_sleep_ms: WRITE_SLEEP_MS,
        }
    }

    pub fn to_bytes(&self) -> [u8; 4] {
        let [low, high] = self.application_end.to_le_bytes();
        [low, high, self.page_size, self.write_sleep_ms]
    }
}

/// Control request handler for one transport poll.
pub struct Uploader<'a, D, L> {
    pub config: &'a Config,
    pub engine: &'a VectorEngine,
    pub session: &'a mut Session,
    pub flash: &'a mut Flash<D>,
    pub log: &'a mut L,
}

impl<'a, D: FlashDevice, L: Log> Uploader<'a, D, L> {
    fn stream(&mut self, data: &[u8]) -> bool {
        let boundary = self.config.bootloader_address;
        let mut accepted = false;

        for chunk in data.chunks_exact(2) {
            let address = self.session.cursor;
            if address >= boundary {
                self.log.record(Record::WriteDiscarded { address });
                // Nothing more will ever be accepted for this transfer.
                return true;
            }

            let word = u16::from_le_bytes([chunk[0], chunk[1]]);
            self.engine.capture(&mut self.session.vectors, address, word);
            if let Err(err) = pages::stage_word(self.engine, self.session, self.flash, word) {
                self.log.record(Record::WriteRejected(err));
                return true;
            }
            accepted = true;

            if self.flash.is_page_aligned(self.session.cursor) {
                break;
            }
        }

        let complete = accepted && self.flash.is_page_aligned(self.session.cursor);
        if complete {
            self.session.events.fire(Event::WritePage);
        }
        complete
    }
}

impl<'a, D: FlashDevice, L: Log> ControlHandler for Uploader<'a, D, L> {
    fn setup(&mut self, request: &ControlRequest) -> SetupReply {
        self.session.idle.reset();

        match Request::parse(request) {
            Request::DeviceInfo => {
                self.log.record(Record::DeviceInfo);
                SetupReply::Data(DeviceInfo::new(self.config).to_bytes())
            }
            Request::WritePage { address } => {
                self.log.record(Record::WriteStarted { address });
                self.session.cursor = address;
                SetupReply::Stream
            }
            Request::EraseApplication => {
                self.session.events.fire(Event::EraseApplication);
                SetupReply::Empty
            }
            Request::RunProgram => {
                if self.config.can_exit {
                    self.session.events.fire(Event::Execute);
                }
                SetupReply::Empty
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> bool {
        self.session.idle.reset();
        self.stream(data)
    }
}
