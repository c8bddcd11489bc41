//! Modbus TCP request framing
//!
//! gridgen only ever sends requests, so this module covers the request direction:
//! - MBAP header + 5 byte register PDU (FC03 / FC16 envelope)
//! - Random malformed payloads that never parse as a request
//!
//! Frames are immutable once built and cheap to clone (`bytes::Bytes`).

pub mod constants;
mod frame;

pub use constants::{
    DEFAULT_MODBUS_PORT, DEFAULT_UNIT_ID, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
    MALFORMED_MAX_LEN, MALFORMED_MIN_LEN, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID,
    REQUEST_FRAME_LEN, REQUEST_LENGTH_FIELD,
};
pub use frame::{build_frame, function_code_name, Frame, FrameKind, MbapHeader, RequestFrame};
