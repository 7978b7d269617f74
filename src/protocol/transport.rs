//! Transport layer seam
//!
//! The USB driver (bit-banged signalling, enumeration, endpoint framing) lives
//! outside this crate. It is driven by polling and calls back into a
//! [`ControlHandler`] synchronously from [`Transport::poll`].

/// Fields of a USB control request setup packet the bootloader uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

impl ControlRequest {
    pub const fn new(request: u8, value: u16, index: u16) -> Self {
        Self {
            request,
            value,
            index,
        }
    }

    /// Decode a raw 8 byte setup packet.
    pub fn from_setup(packet: &[u8; 8]) -> Self {
        Self {
            request: packet[1],
            value: u16::from_le_bytes([packet[2], packet[3]]),
            index: u16::from_le_bytes([packet[4], packet[5]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupReply {
    /// Nothing to send back.
    Empty,
    /// Send these bytes in the data stage.
    Data([u8; 4]),
    /// No reply yet; the data stage is delivered through [`ControlHandler::write`].
    Stream,
}

pub trait ControlHandler {
    fn setup(&mut self, request: &ControlRequest) -> SetupReply;

    /// Consume a chunk of an OUT data stage. Returns true once the transfer
    /// is complete and no further chunks are expected.
    fn write(&mut self, data: &[u8]) -> bool;
}

pub trait Transport {
    /// Service pending bus activity, invoking `handler` for ready requests.
    fn poll(&mut self, handler: &mut dyn ControlHandler);

    fn connect(&mut self);

    fn disconnect(&mut self);

    /// Disable the transport's interrupt and reset its configuration bits.
    fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_setup_packet() {
        let packet = [0x40, 0x01, 0x34, 0x12, 0xC0, 0x17, 0x40, 0x00];
        assert_eq!(
            ControlRequest::from_setup(&packet),
            ControlRequest::new(1, 0x1234, 0x17C0)
        );
    }
}
