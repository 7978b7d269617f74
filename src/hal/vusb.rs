//! V-USB binding
//!
//! The driver is linked in from C and assembly. It calls
//! `usbFunctionSetup` and `usbFunctionWrite` from inside `usbPoll`, which is
//! the only place the handler slot below is populated.

use core::ptr::{self, NonNull};

use avr_device::attiny85::{CPU, EXINT, PORTB};

use crate::protocol::transport::{ControlHandler, ControlRequest, SetupReply, Transport};

/// D- on PB3.
const USB_MINUS: u8 = 1 << 3;

/// Tells the driver the data stage goes through `usbFunctionWrite`.
const USB_NO_MSG: u8 = 0xFF;

extern "C" {
    fn usbInit();
    fn usbPoll();
    static mut usbMsgPtr: *const u8;
}

static mut HANDLER: Option<NonNull<dyn ControlHandler>> = None;
static mut REPLY: [u8; 4] = [0; 4];

unsafe fn with_handler<R>(f: impl FnOnce(&mut dyn ControlHandler) -> R) -> Option<R> {
    let mut handler = HANDLER?;
    Some(f(handler.as_mut()))
}

#[no_mangle]
unsafe extern "C" fn usbFunctionSetup(data: *const u8) -> u8 {
    let packet = &*(data as *const [u8; 8]);
    let request = ControlRequest::from_setup(packet);

    match with_handler(|handler| handler.setup(&request)) {
        Some(SetupReply::Data(bytes)) => {
            REPLY = bytes;
            usbMsgPtr = ptr::addr_of!(REPLY) as *const u8;
            bytes.len() as u8
        }
        Some(SetupReply::Stream) => USB_NO_MSG,
        Some(SetupReply::Empty) | None => 0,
    }
}

#[no_mangle]
unsafe extern "C" fn usbFunctionWrite(data: *const u8, length: u8) -> u8 {
    let chunk = core::slice::from_raw_parts(data, usize::from(length));
    match with_handler(|handler| handler.write(chunk)) {
        Some(false) => 0,
        _ => 1,
    }
}

/// The V-USB driver as a [`Transport`].
pub struct VUsb {
    _private: (),
}

impl VUsb {
    pub fn new() -> Self {
        unsafe { usbInit() };
        Self { _private: () }
    }
}

impl Transport for VUsb {
    fn poll(&mut self, handler: &mut dyn ControlHandler) {
        unsafe {
            // The slot only lives for the duration of usbPoll.
            let handler: *mut (dyn ControlHandler + '_) = handler;
            HANDLER = NonNull::new(core::mem::transmute::<
                *mut (dyn ControlHandler + '_),
                *mut (dyn ControlHandler + 'static),
            >(handler));
            usbPoll();
            HANDLER = None;
        }
    }

    fn connect(&mut self) {
        unsafe {
            (*PORTB::ptr()).ddrb.modify(|r, w| w.bits(r.bits() & !USB_MINUS));
            avr_device::interrupt::enable();
        }
    }

    fn disconnect(&mut self) {
        unsafe {
            (*PORTB::ptr()).ddrb.modify(|r, w| w.bits(r.bits() | USB_MINUS));
        }
    }

    fn shutdown(&mut self) {
        avr_device::interrupt::disable();
        unsafe {
            (*EXINT::ptr()).gimsk.write(|w| w.bits(0));
            (*CPU::ptr()).mcucr.write(|w| w.bits(0));
        }
    }
}
