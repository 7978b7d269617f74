//! Session marker read by the shared interrupt wrapper

/// Sentinel stored while the bootloader owns the USB interrupt.
pub const SESSION_MAGIC: [u8; 2] = [0xB0, 0x07];

/// A fixed memory location telling the interrupt wrapper whom to dispatch to.
///
/// While armed, the shared vector runs the bootloader's transport handler;
/// once cleared, it forwards to the application's relocated handler.
pub trait SessionMarker {
    fn arm(&mut self);

    fn clear(&mut self);

    fn is_armed(&self) -> bool;
}
