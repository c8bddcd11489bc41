//! gridgen protocol layer
//!
//! Builds the frames gridgen sends and delivers them over transient TCP connections.
//!
//! # Architecture
//!
//! ```text
//! gridgen-protocols
//!     ├── modbus (MBAP request layout, malformed payloads, Frame)
//!     └── transport (Target, FrameSink, TcpFrameSink, Delivery)
//! ```
//!
//! All profile loops talk to a `FrameSink`. The TCP implementation opens one connection
//! per frame and collapses every failure into `Delivery::Failed`.

pub mod modbus;
pub mod transport;

pub use modbus::{build_frame, function_code_name, Frame, FrameKind, MbapHeader, RequestFrame};
pub use transport::{
    detect_local_ip, transmit, Delivery, FrameSink, Target, TcpFrameSink, DEFAULT_TRANSMIT_TIMEOUT,
};
