//! WebSocket frame opcodes as defined in RFC 6455.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
///
/// Every 4-bit value is representable. Reserved values decode successfully
/// and are surfaced to the connection, which logs them without dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Used for fragmented messages after the initial frame.
    Continuation = 0x0,

    /// Text frame (0x1).
    ///
    /// Payload is UTF-8 character data.
    #[default]
    Text = 0x1,

    /// Binary frame (0x2).
    ///
    /// Payload is arbitrary binary data.
    Binary = 0x2,

    /// Reserved non-control frame (0x3).
    Reserved3 = 0x3,
    /// Reserved non-control frame (0x4).
    Reserved4 = 0x4,
    /// Reserved non-control frame (0x5).
    Reserved5 = 0x5,
    /// Reserved non-control frame (0x6).
    Reserved6 = 0x6,
    /// Reserved non-control frame (0x7).
    Reserved7 = 0x7,

    /// Close frame (0x8).
    ///
    /// Initiates connection close. May contain status code and reason.
    Close = 0x8,

    /// Ping frame (0x9).
    Ping = 0x9,

    /// Pong frame (0xA).
    Pong = 0xA,

    /// Reserved control frame (0xB).
    ReservedB = 0xB,
    /// Reserved control frame (0xC).
    ReservedC = 0xC,
    /// Reserved control frame (0xD).
    ReservedD = 0xD,
    /// Reserved control frame (0xE).
    ReservedE = 0xE,
    /// Reserved control frame (0xF).
    ReservedF = 0xF,
}

/// Opcodes indexed by their wire value.
const OPCODES: [OpCode; 16] = [
    OpCode::Continuation,
    OpCode::Text,
    OpCode::Binary,
    OpCode::Reserved3,
    OpCode::Reserved4,
    OpCode::Reserved5,
    OpCode::Reserved6,
    OpCode::Reserved7,
    OpCode::Close,
    OpCode::Ping,
    OpCode::Pong,
    OpCode::ReservedB,
    OpCode::ReservedC,
    OpCode::ReservedD,
    OpCode::ReservedE,
    OpCode::ReservedF,
];

/// Human-readable labels indexed by wire value.
const LABELS: [&str; 16] = [
    "continuation",
    "text frame",
    "binary frame",
    "reserved (0x03)",
    "reserved (0x04)",
    "reserved (0x05)",
    "reserved (0x06)",
    "reserved (0x07)",
    "close",
    "ping",
    "pong",
    "reserved (0x0b)",
    "reserved (0x0c)",
    "reserved (0x0d)",
    "reserved (0x0e)",
    "reserved (0x0f)",
];

impl OpCode {
    /// Create OpCode from raw byte value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOpcode` if the value does not fit in 4 bits.
    pub fn from_u8(byte: u8) -> Result<Self> {
        OPCODES
            .get(usize::from(byte))
            .copied()
            .ok_or(Error::InvalidOpcode(byte))
    }

    /// Convert OpCode to raw byte value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if this is a control frame opcode (0x8 and above).
    #[inline]
    #[must_use]
    pub const fn is_control(self) -> bool {
        self.as_u8() & 0x8 != 0
    }

    /// Check if this is a data frame opcode: Text or Binary.
    #[inline]
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, OpCode::Text | OpCode::Binary)
    }

    /// Check if this opcode is reserved for future use.
    #[inline]
    #[must_use]
    pub const fn is_reserved(self) -> bool {
        matches!(self.as_u8(), 0x3..=0x7 | 0xB..=0xF)
    }

    /// Get the human-readable label for this opcode.
    #[must_use]
    pub const fn label(self) -> &'static str {
        LABELS[self as usize]
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
