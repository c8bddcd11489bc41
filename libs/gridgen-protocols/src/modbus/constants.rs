//! Modbus framing constants
//!
//! Sizes follow the Modbus TCP request envelope for register operations.

// ============================================================================
// Frame Size Constants
// ============================================================================

/// MBAP header length
/// Format: Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1) = 7 bytes
pub const MBAP_HEADER_LEN: usize = 7;

/// Register request PDU: Function Code(1) + Address(2) + Quantity(2)
pub const REQUEST_PDU_LEN: usize = 5;

/// Complete request frame on the wire
pub const REQUEST_FRAME_LEN: usize = MBAP_HEADER_LEN + REQUEST_PDU_LEN;

/// MBAP length field of a register request: Unit ID(1) + PDU(5)
pub const REQUEST_LENGTH_FIELD: u16 = 6;

/// Protocol identifier, always 0 for Modbus
pub const MODBUS_PROTOCOL_ID: u16 = 0;

// ============================================================================
// Function Codes
// ============================================================================

pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

// ============================================================================
// Defaults
// ============================================================================

/// Well-known Modbus TCP port
pub const DEFAULT_MODBUS_PORT: u16 = 502;

pub const DEFAULT_UNIT_ID: u8 = 1;

// ============================================================================
// Malformed Payload Bounds
// ============================================================================

/// Shortest malformed payload in bytes (inclusive)
pub const MALFORMED_MIN_LEN: usize = 5;

/// Longest malformed payload in bytes (inclusive)
pub const MALFORMED_MAX_LEN: usize = 50;
