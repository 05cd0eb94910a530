//! Concrete serial ports for the AT host parser.
//!
//! - [`TcpPort`] talks to a modem UART exposed over TCP (device servers,
//!   ser2net, simulators that publish one TCP port per node UART).
//! - [`MockPort`] is a deterministic scripted port for tests.

mod mock;
mod tcp;

pub use mock::*;
pub use tcp::*;
