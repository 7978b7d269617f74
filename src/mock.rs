use core::convert::Infallible;
use std::collections::VecDeque;
use std::string::String;
use std::vec;
use std::vec::Vec;

use crate::hal::clock::Clock;
use crate::hal::flash::FlashDevice;
use crate::hal::marker::{SessionMarker, SESSION_MAGIC};
use crate::protocol::transport::{ControlHandler, ControlRequest, SetupReply, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashOp {
    Erase,
    Fill,
    ClearBuffer,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Op {
    pub kind: FlashOp,
    pub address: u16,
    pub masked: bool,
}

/// NOR flash with an AVR style page buffer.
///
/// Programming only clears bits, so writing over unerased data shows up as
/// corruption just like on the real part.
pub struct MockFlash {
    pub memory: Vec<u8>,
    pub buffer: Vec<u16>,
    pub page_size: u16,
    pub masked: bool,
    /// Mask state to restore on unmask.
    saved_mask: bool,
    pub ops: Vec<Op>,
    pub busy: u8,
    pub busy_polls: usize,
    /// Erases and writes that still get power. `None` is unlimited.
    pub power_budget: Option<usize>,
}

impl MockFlash {
    pub fn new(size: u16, page_size: u16) -> Self {
        Self {
            memory: vec![0xFF; size as usize],
            buffer: vec![0xFFFF; (page_size / 2) as usize],
            page_size,
            masked: false,
            saved_mask: false,
            ops: Vec::new(),
            busy: 0,
            busy_polls: 0,
            power_budget: None,
        }
    }

    pub fn load(mut self, address: u16, bytes: &[u8]) -> Self {
        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
        self
    }

    pub fn bytes(&self, start: u16, end: u16) -> &[u8] {
        &self.memory[start as usize..end as usize]
    }

    fn record(&mut self, kind: FlashOp, address: u16) {
        self.ops.push(Op {
            kind,
            address,
            masked: self.masked,
        });
    }

    fn page_range(&self, address: u16) -> core::ops::Range<usize> {
        let start = (address - address % self.page_size) as usize;
        start..start + self.page_size as usize
    }

    fn powered(&mut self) -> bool {
        match self.power_budget.as_mut() {
            None => true,
            Some(0) => false,
            Some(left) => {
                *left -= 1;
                true
            }
        }
    }

    pub fn ops_of(&self, kind: FlashOp) -> Vec<u16> {
        self.ops
            .iter()
            .filter(|op| op.kind == kind)
            .map(|op| op.address)
            .collect()
    }
}

impl FlashDevice for MockFlash {
    fn erase_page(&mut self, address: u16) {
        self.record(FlashOp::Erase, address);
        if self.powered() {
            let range = self.page_range(address);
            self.memory[range].fill(0xFF);
            self.busy = 3;
        }
    }

    fn fill_buffer(&mut self, address: u16, word: u16) {
        self.record(FlashOp::Fill, address);
        let index = (address % self.page_size / 2) as usize;
        self.buffer[index] = word;
    }

    fn clear_buffer(&mut self) {
        self.record(FlashOp::ClearBuffer, 0);
        self.buffer.fill(0xFFFF);
    }

    fn write_page(&mut self, address: u16) {
        self.record(FlashOp::Write, address);
        if self.powered() {
            let range = self.page_range(address);
            for (index, cell) in self.memory[range].iter_mut().enumerate() {
                let word = self.buffer[index / 2].to_le_bytes();
                *cell &= word[index % 2];
            }
            self.busy = 3;
        }
        self.buffer.fill(0xFFFF);
    }

    fn poll_ready(&mut self) -> nb::Result<(), Infallible> {
        if self.busy > 0 {
            self.busy -= 1;
            self.busy_polls += 1;
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    fn read_word(&self, address: u16) -> u16 {
        let index = address as usize;
        u16::from_le_bytes([self.memory[index], self.memory[index + 1]])
    }

    fn read_byte(&self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn mask_interrupts(&mut self) {
        self.saved_mask = self.masked;
        self.masked = true;
    }

    fn unmask_interrupts(&mut self) {
        self.masked = self.saved_mask;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Setup(ControlRequest),
    Data(Vec<u8>),
    Idle,
    /// Several actions inside one poll, as from a host ignoring the write sleep.
    Burst(Vec<HostAction>),
}

/// A USB host replaying a script, one action per poll.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    pub script: VecDeque<HostAction>,
    pub replies: Vec<SetupReply>,
    pub completions: Vec<bool>,
    pub connected: bool,
    pub disconnects: usize,
    pub shut_down: bool,
    pub polls: usize,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn setup(mut self, request: u8, value: u16, index: u16) -> Self {
        self.script
            .push_back(HostAction::Setup(ControlRequest::new(request, value, index)));
        self
    }

    /// Queue a data stage the way the USB driver delivers it, in 8 byte packets.
    pub fn data(mut self, bytes: &[u8]) -> Self {
        for packet in bytes.chunks(8) {
            self.script.push_back(HostAction::Data(packet.to_vec()));
        }
        self
    }

    pub fn idle(mut self, polls: usize) -> Self {
        for _ in 0..polls {
            self.script.push_back(HostAction::Idle);
        }
        self
    }
}

impl ScriptedHost {
    fn perform(&mut self, action: HostAction, handler: &mut dyn ControlHandler) {
        match action {
            HostAction::Setup(request) => self.replies.push(handler.setup(&request)),
            HostAction::Data(bytes) => self.completions.push(handler.write(&bytes)),
            HostAction::Idle => {}
            HostAction::Burst(actions) => {
                for action in actions {
                    self.perform(action, handler);
                }
            }
        }
    }
}

impl Transport for ScriptedHost {
    fn poll(&mut self, handler: &mut dyn ControlHandler) {
        self.polls += 1;
        if let Some(action) = self.script.pop_front() {
            self.perform(action, handler);
        }
    }

    fn connect(&mut self) {
        self.connected = true;
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disconnects += 1;
    }

    fn shutdown(&mut self) {
        self.shut_down = true;
    }
}

#[derive(Debug, Default)]
pub struct MockClock {
    pub calibration: u8,
    pub prescaler: u8,
    pub calibration_writes: Vec<u8>,
    pub prescaler_writes: Vec<u8>,
}

impl MockClock {
    pub fn new(calibration: u8, prescaler: u8) -> Self {
        Self {
            calibration,
            prescaler,
            ..Self::default()
        }
    }
}

impl Clock for MockClock {
    fn calibration(&self) -> u8 {
        self.calibration
    }

    fn set_calibration(&mut self, value: u8) {
        self.calibration = value;
        self.calibration_writes.push(value);
    }

    fn prescaler(&self) -> u8 {
        self.prescaler
    }

    fn set_prescaler(&mut self, value: u8) {
        self.prescaler = value;
        self.prescaler_writes.push(value);
    }
}

#[derive(Debug, Default)]
pub struct MockMarker {
    pub ram: [u8; 2],
}

impl SessionMarker for MockMarker {
    fn arm(&mut self) {
        self.ram = SESSION_MAGIC;
    }

    fn clear(&mut self) {
        self.ram = [0; 2];
    }

    fn is_armed(&self) -> bool {
        self.ram == SESSION_MAGIC
    }
}

#[derive(Debug, Default)]
pub struct LogBuffer(pub String);

impl ufmt::uWrite for LogBuffer {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Self::Error> {
        self.0.push_str(s);
        Ok(())
    }
}
