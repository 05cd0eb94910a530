//! Byte-oriented serial transport trait.
//!
//! The parser drives a half-duplex, byte-at-a-time transport: blocking reads
//! with a per-byte timeout, bounded writes, and a non-blocking readability
//! probe. Anything that can move single bytes qualifies — a USB CDC-ACM
//! device node, a UART exposed over TCP, or an in-memory mock.

use crate::error::PortResult;
use std::time::Duration;

/// Abstract serial port interface.
///
/// Implementations may buffer internally, but `get` must return at most one
/// byte per call and must not block longer than `timeout`.
pub trait SerialPort {
    /// One-time transport setup, called when a parser takes ownership.
    ///
    /// `timeout` is the parser's initial per-byte timeout; implementations
    /// that pre-configure OS-level read timeouts can seed them here.
    fn init(&mut self, timeout: Duration) -> PortResult<()>;

    /// Read the next byte, waiting at most `timeout`.
    ///
    /// Returns [`crate::PortError::Timeout`] if no byte arrived in time.
    fn get(&mut self, timeout: Duration) -> PortResult<u8>;

    /// Write a single byte.
    fn put(&mut self, byte: u8) -> PortResult<()>;

    /// Check whether at least one byte is pending, without blocking.
    fn readable(&mut self) -> bool;
}
