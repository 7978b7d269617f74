//! Relative jump (`rjmp`) encoding
//!
//! `rjmp k` is `1100 kkkk kkkk kkkk`: a 12 bit signed word displacement
//! relative to the instruction after the jump. On parts with up to 8 KiB of
//! flash the program counter wraps, so every word address is reachable from
//! every slot and the displacement is taken modulo 4096 words.
//!
//! All addresses here are byte addresses; the word conversion is internal.

pub const RJMP_OPCODE: u16 = 0xC000;
pub const RJMP_OPCODE_MASK: u16 = 0xF000;
pub const OFFSET_MASK: u16 = 0x0FFF;

/// Bytes addressable through a wrapping `rjmp`.
pub const REACH: u32 = (OFFSET_MASK as u32 + 1) * 2;

/// Encode a jump placed at `slot` that lands on `target`.
pub const fn encode(target: u16, slot: u16) -> u16 {
    let displacement = (target >> 1).wrapping_sub(slot >> 1).wrapping_sub(1);
    RJMP_OPCODE | (displacement & OFFSET_MASK)
}

/// Recover the target of the jump instruction found at `slot`.
///
/// Opcode bits are ignored, so whatever a host writes into a vector slot
/// decodes to some in-range address.
pub const fn decode(instruction: u16, slot: u16) -> u16 {
    let word = (instruction & OFFSET_MASK)
        .wrapping_add(slot >> 1)
        .wrapping_add(1)
        & OFFSET_MASK;
    word << 1
}

pub const fn is_rjmp(instruction: u16) -> bool {
    instruction & RJMP_OPCODE_MASK == RJMP_OPCODE
}
