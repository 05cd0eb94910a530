//! Host-side AT command parser.
//!
//! This crate drives modem-style peripherals (cellular, Wi-Fi, Bluetooth
//! modules) over a byte-oriented serial transport. Commands go out as text
//! terminated by an output delimiter; the peripheral answers with text lines
//! terminated by an input delimiter, interleaved with unsolicited
//! out-of-band (OOB) notifications that can arrive at any byte boundary.
//!
//! # Response templates
//!
//! Expected responses are described with a scanf-style template. `%d`, `%u`,
//! `%x`, `%s`, `%c` and `%[...]` conversions extract typed fields, `%*`
//! suppresses a field (matched but discarded), `%%` is a literal percent,
//! and an optional maximum field width is honored (`%3d`). Whitespace in the
//! template matches any run of input whitespace, so the conventional
//! trailing `\r\n` works for both bare-CR and CRLF peripherals. A literal
//! `\n` in the template makes the matcher hold off until a full wire line
//! has arrived.
//!
//! # Example
//!
//! ```rust,ignore
//! use athost_parser::{AtParser, ParserConfig};
//! use athost_transport::TcpPort;
//!
//! let port = TcpPort::connect("127.0.0.1:5000")?;
//! let mut at = AtParser::new(port, ParserConfig::default())?;
//!
//! at.add_oob("+RING\r\n", |_ctx| println!("incoming call"));
//!
//! at.send("AT+CSQ")?;
//! let caps = at.recv("+CSQ: %d,%d\r\n")?;
//! let rssi = caps.int(0).unwrap();
//! ```
//!
//! # Concurrency model
//!
//! The parser is single-owner, single-threaded and blocking: every operation
//! runs on the caller's thread and suspends only inside the transport's
//! per-byte `get`. OOB handlers run synchronously in the caller's stack
//! frame and receive an [`OobContext`], never the parser itself, so they
//! cannot issue commands mid-receive.

mod args;
mod captures;
mod error;
mod format;
mod oob;
mod parser;

pub use args::*;
pub use captures::*;
pub use error::*;
pub use oob::*;
pub use parser::*;
