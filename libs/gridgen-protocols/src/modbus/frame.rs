//! Request frame construction and parsing
//!
//! Wire layout of a register request (big-endian, 12 bytes):
//!
//! ```text
//! 0-1   transaction id
//! 2-3   protocol id (0)
//! 4-5   length (6)
//! 6     unit id
//! 7     function code
//! 8-9   start address
//! 10-11 quantity
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use errors::{GridgenError, GridgenResult};
use rand::Rng;
use tracing::trace;

use super::constants::{
    MALFORMED_MAX_LEN, MALFORMED_MIN_LEN, MBAP_HEADER_LEN, MODBUS_PROTOCOL_ID, REQUEST_FRAME_LEN,
    REQUEST_LENGTH_FIELD,
};

/// Modbus TCP MBAP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    /// Transaction identifier
    pub transaction_id: u16,
    /// Protocol identifier (fixed to 0)
    pub protocol_id: u16,
    /// Length field
    pub length: u16,
    /// Unit identifier (slave ID)
    pub unit_id: u8,
}

impl MbapHeader {
    /// Header for a 5 byte register request PDU
    pub fn for_request(transaction_id: u16, unit_id: u8) -> Self {
        Self {
            transaction_id,
            protocol_id: MODBUS_PROTOCOL_ID,
            length: REQUEST_LENGTH_FIELD,
            unit_id,
        }
    }

    fn put(&self, buf: &mut BytesMut) {
        buf.put_u16(self.transaction_id);
        buf.put_u16(self.protocol_id);
        buf.put_u16(self.length);
        buf.put_u8(self.unit_id);
    }

    /// Parse the first 7 bytes of `data`
    pub fn parse(mut data: &[u8]) -> GridgenResult<Self> {
        if data.len() < MBAP_HEADER_LEN {
            return Err(GridgenError::protocol(format!(
                "MBAP header too short: {} bytes (need {})",
                data.len(),
                MBAP_HEADER_LEN
            )));
        }

        Ok(Self {
            transaction_id: data.get_u16(),
            protocol_id: data.get_u16(),
            length: data.get_u16(),
            unit_id: data.get_u8(),
        })
    }
}

/// Fields of a well-formed register request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFrame {
    pub transaction_id: u16,
    pub unit_id: u8,
    pub function_code: u8,
    pub address: u16,
    pub count: u16,
}

impl RequestFrame {
    pub fn new(
        transaction_id: u16,
        unit_id: u8,
        function_code: u8,
        address: u16,
        count: u16,
    ) -> Self {
        Self {
            transaction_id,
            unit_id,
            function_code,
            address,
            count,
        }
    }

    /// Encode into the 12 byte wire layout
    pub fn encode(&self) -> Frame {
        let mut buf = BytesMut::with_capacity(REQUEST_FRAME_LEN);

        MbapHeader::for_request(self.transaction_id, self.unit_id).put(&mut buf);
        buf.put_u8(self.function_code);
        buf.put_u16(self.address);
        buf.put_u16(self.count);

        trace!(
            "Request built: trans_id={:04X}, unit_id={}, FC={:02X} ({}), addr={}, qty={}",
            self.transaction_id,
            self.unit_id,
            self.function_code,
            function_code_name(self.function_code),
            self.address,
            self.count
        );

        Frame {
            bytes: buf.freeze(),
            kind: FrameKind::Request,
        }
    }

    /// Parse a 12 byte request back into its fields
    ///
    /// Rejects anything that does not match the request envelope exactly, which
    /// includes every malformed payload gridgen generates.
    pub fn decode(data: &[u8]) -> GridgenResult<Self> {
        if data.len() != REQUEST_FRAME_LEN {
            return Err(GridgenError::protocol(format!(
                "Request frame must be {} bytes, got {}",
                REQUEST_FRAME_LEN,
                data.len()
            )));
        }

        let header = MbapHeader::parse(data)?;
        if header.protocol_id != MODBUS_PROTOCOL_ID {
            return Err(GridgenError::protocol(format!(
                "Unexpected protocol id {:04X}",
                header.protocol_id
            )));
        }
        if header.length != REQUEST_LENGTH_FIELD {
            return Err(GridgenError::protocol(format!(
                "Unexpected MBAP length {} (expected {})",
                header.length, REQUEST_LENGTH_FIELD
            )));
        }

        let mut pdu = &data[MBAP_HEADER_LEN..];
        Ok(Self {
            transaction_id: header.transaction_id,
            unit_id: header.unit_id,
            function_code: pdu.get_u8(),
            address: pdu.get_u16(),
            count: pdu.get_u16(),
        })
    }
}

/// Shorthand for `RequestFrame::new(..).encode()`
pub fn build_frame(
    transaction_id: u16,
    unit_id: u8,
    function_code: u8,
    address: u16,
    count: u16,
) -> Frame {
    RequestFrame::new(transaction_id, unit_id, function_code, address, count).encode()
}

/// What a frame claims to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Request,
    Malformed,
}

/// One immutable protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Bytes,
    kind: FrameKind,
}

impl Frame {
    /// Random payload with a random length in `MALFORMED_MIN_LEN..=MALFORMED_MAX_LEN`
    pub fn malformed<R: Rng>(rng: &mut R) -> Self {
        let len = rng.gen_range(MALFORMED_MIN_LEN..=MALFORMED_MAX_LEN);
        let mut payload = vec![0u8; len];
        rng.fill(&mut payload[..]);

        // A zero protocol id could line up with the request envelope
        if payload[2] == 0 && payload[3] == 0 {
            payload[3] = rng.gen_range(1..=u8::MAX);
        }

        Self {
            bytes: Bytes::from(payload),
            kind: FrameKind::Malformed,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.kind
    }
}

/// Human-readable function code name
pub fn function_code_name(fc: u8) -> &'static str {
    match fc & 0x7F {
        // Remove exception bit for lookup
        0x01 => "Read Coils",
        0x02 => "Read Discrete Inputs",
        0x03 => "Read Holding Registers",
        0x04 => "Read Input Registers",
        0x05 => "Write Single Coil",
        0x06 => "Write Single Register",
        0x0F => "Write Multiple Coils",
        0x10 => "Write Multiple Registers",
        0x17 => "Read/Write Multiple Registers",
        _ => "Unknown Function",
    }
}
