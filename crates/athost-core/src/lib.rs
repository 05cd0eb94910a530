//! Shared types for the AT host workspace.
//!
//! This crate defines the [`SerialPort`] trait that the parser consumes and
//! the transport-level error type. Concrete implementations (TCP-attached
//! UARTs, test mocks) live in `athost-transport`; the parser itself lives in
//! `athost-parser`.

mod error;
mod port;

pub use error::*;
pub use port::*;
