//! Frame sources for each profile
//!
//! Generators are plain iterators so the shape of every profile's traffic can be
//! checked without a network. The engine decides pacing and when to stop pulling.

use std::ops::{Range, RangeInclusive};

use gridgen_protocols::modbus::{
    DEFAULT_UNIT_ID, FC_READ_HOLDING_REGISTERS, FC_WRITE_MULTIPLE_REGISTERS,
};
use gridgen_protocols::{Frame, RequestFrame};
use rand::Rng;

// ============================================================================
// Profile parameter envelopes
// ============================================================================

/// Register addresses polled by baseline traffic
pub const NORMAL_ADDRESS_RANGE: RangeInclusive<u16> = 100..=200;
/// Registers per baseline read
pub const NORMAL_COUNT_RANGE: RangeInclusive<u16> = 1..=10;
pub const NORMAL_FIRST_TRANSACTION_ID: u16 = 1;

pub const FLOOD_FIRST_TRANSACTION_ID: u16 = 10_000;
pub const FLOOD_ADDRESS: u16 = 100;
pub const FLOOD_COUNT: u16 = 10;

/// Protected register block targeted by unauthorized writes
pub const WRITE_ADDRESS_RANGE: RangeInclusive<u16> = 0..=99;
pub const WRITE_COUNT: u16 = 1;
pub const WRITE_FIRST_TRANSACTION_ID: u16 = 100;

/// Baseline reads: FC03, random address and quantity, transaction ids 1, 2, 3, ...
#[derive(Debug)]
pub struct NormalFrames<R> {
    rng: R,
    next_transaction_id: u16,
}

impl<R: Rng> NormalFrames<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            next_transaction_id: NORMAL_FIRST_TRANSACTION_ID,
        }
    }
}

impl<R: Rng> Iterator for NormalFrames<R> {
    type Item = RequestFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);

        Some(RequestFrame::new(
            transaction_id,
            DEFAULT_UNIT_ID,
            FC_READ_HOLDING_REGISTERS,
            self.rng.gen_range(NORMAL_ADDRESS_RANGE),
            self.rng.gen_range(NORMAL_COUNT_RANGE),
        ))
    }
}

/// Flood reads: identical FC03 requests, only the transaction id moves
#[derive(Debug)]
pub struct FloodFrames {
    next_transaction_id: u16,
}

impl FloodFrames {
    pub fn new() -> Self {
        Self {
            next_transaction_id: FLOOD_FIRST_TRANSACTION_ID,
        }
    }
}

impl Default for FloodFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for FloodFrames {
    type Item = RequestFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);

        Some(RequestFrame::new(
            transaction_id,
            DEFAULT_UNIT_ID,
            FC_READ_HOLDING_REGISTERS,
            FLOOD_ADDRESS,
            FLOOD_COUNT,
        ))
    }
}

/// Port scan: one default request per port, transaction id = port
#[derive(Debug)]
pub struct ScanTargets {
    ports: Range<u16>,
}

impl ScanTargets {
    /// Ports `start_port..end_port` (end exclusive)
    pub fn new(start_port: u16, end_port: u16) -> Self {
        Self {
            ports: start_port..end_port,
        }
    }
}

impl Iterator for ScanTargets {
    type Item = (u16, RequestFrame);

    fn next(&mut self) -> Option<Self::Item> {
        let port = self.ports.next()?;
        Some((
            port,
            RequestFrame::new(
                port,
                DEFAULT_UNIT_ID,
                FC_READ_HOLDING_REGISTERS,
                FLOOD_ADDRESS,
                FLOOD_COUNT,
            ),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ports.size_hint()
    }
}

/// Unauthorized writes: FC16, one register in the protected block
#[derive(Debug)]
pub struct WriteFrames<R> {
    rng: R,
    next_transaction_id: u16,
}

impl<R: Rng> WriteFrames<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            next_transaction_id: WRITE_FIRST_TRANSACTION_ID,
        }
    }
}

impl<R: Rng> Iterator for WriteFrames<R> {
    type Item = RequestFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = self.next_transaction_id.wrapping_add(1);

        Some(RequestFrame::new(
            transaction_id,
            DEFAULT_UNIT_ID,
            FC_WRITE_MULTIPLE_REGISTERS,
            self.rng.gen_range(WRITE_ADDRESS_RANGE),
            WRITE_COUNT,
        ))
    }
}

/// Random garbage payloads
#[derive(Debug)]
pub struct MalformedFrames<R> {
    rng: R,
}

impl<R: Rng> MalformedFrames<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> Iterator for MalformedFrames<R> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        Some(Frame::malformed(&mut self.rng))
    }
}
