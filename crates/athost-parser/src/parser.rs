//! The AT parser: line scanner, OOB pump, and send path.

use bytes::{BufMut, BytesMut};
use log::debug;
use std::time::Duration;

use athost_core::{PortError, SerialPort};

use crate::args;
use crate::captures::Captures;
use crate::error::{AtError, AtResult};
use crate::format;
use crate::oob::{OobContext, OobEntry, OobHandler};

/// Capacity of the scratch buffer shared by every parser operation.
pub const AT_BUFFER_SIZE: usize = 2048;

/// Default per-byte receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Parser construction parameters.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Byte string appended after each sent command, typically `"\r\n"`.
    pub output_delimiter: String,
    /// Byte string terminating received lines, typically `"\r\n"`.
    pub input_delimiter: String,
    /// Per-byte receive timeout.
    pub timeout: Duration,
    /// Emit wire traces (`AT>`, `AT?`, `AT=`, `AT<`, `AT!`).
    pub debug: bool,
    /// Scratch buffer capacity; a line longer than this is discarded and
    /// matching resynchronizes, exactly as on a delimiter.
    pub buffer_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            output_delimiter: "\r\n".to_string(),
            input_delimiter: "\r\n".to_string(),
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            buffer_size: AT_BUFFER_SIZE,
        }
    }
}

/// Host-side AT command parser over a [`SerialPort`].
///
/// Owns the transport and a single scratch buffer reused by every
/// operation. The parser is single-owner and single-threaded; see the crate
/// docs for the concurrency model.
pub struct AtParser<P: SerialPort> {
    port: P,
    oobs: Vec<OobEntry>,
    unprocessed: Option<Box<dyn FnMut(&[u8])>>,
    timeout: Duration,
    output_delimiter: Vec<u8>,
    input_delimiter: Vec<u8>,
    debug: bool,
    buffer: BytesMut,
    capacity: usize,
}

impl<P: SerialPort> AtParser<P> {
    /// Create a parser over `port`, initializing the transport.
    pub fn new(mut port: P, config: ParserConfig) -> AtResult<Self> {
        port.init(config.timeout)?;
        Ok(AtParser {
            port,
            oobs: Vec::new(),
            unprocessed: None,
            timeout: config.timeout,
            output_delimiter: config.output_delimiter.into_bytes(),
            input_delimiter: config.input_delimiter.into_bytes(),
            debug: config.debug,
            buffer: BytesMut::with_capacity(config.buffer_size),
            capacity: config.buffer_size,
        })
    }

    /// Change the per-byte receive timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current per-byte receive timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Toggle wire tracing.
    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    /// Check whether wire tracing is on.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// Register an out-of-band handler for `prefix`.
    ///
    /// The handler fires when a line accumulation equals the prefix bytes
    /// exactly, both during `recv` and under the pump. Registrations are
    /// never removed; the newest registration wins when prefixes collide.
    pub fn add_oob(
        &mut self,
        prefix: impl Into<Vec<u8>>,
        handler: impl FnMut(&mut OobContext) + 'static,
    ) {
        self.oobs.push(OobEntry {
            prefix: prefix.into(),
            handler: Box::new(handler) as OobHandler,
        });
    }

    /// Install the sink that receives lines the OOB pump flushes without
    /// matching any prefix.
    pub fn set_unprocessed_handler(&mut self, sink: impl FnMut(&[u8]) + 'static) {
        self.unprocessed = Some(Box::new(sink));
    }

    /// Give the transport back, consuming the parser.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Receive and match a response template, extracting its fields.
    ///
    /// The template is processed line by line; see the crate docs for the
    /// template language. Bytes that fail to match are silently discarded
    /// at the next delimiter (or on scratch overflow) and matching retries,
    /// so the only failures are a transport timeout, an abort from an OOB
    /// handler, or a malformed template. Fields are extracted only when the
    /// whole template has matched end-to-end.
    pub fn recv(&mut self, template: &str) -> AtResult<Captures> {
        let lines = format::parse_template(template)?;
        let mut captures = Captures::default();
        // Raw wire bytes preceding the current one, tracked across lines
        // and resyncs for the colon-newline workaround.
        let mut prev = 0u8;
        let mut prev2 = 0u8;

        for line in &lines {
            'line: loop {
                self.buffer.clear();
                // Offsets of synthetic filler bytes in the accumulation.
                let mut fillers: Vec<usize> = Vec::new();
                if self.debug {
                    debug!("AT? {}", line.probe_repr);
                }

                loop {
                    let c = match self.port.get(self.timeout) {
                        Ok(c) => c,
                        Err(PortError::Timeout) => {
                            if self.debug {
                                debug!("AT(Timeout)");
                            }
                            return Err(AtError::Timeout);
                        }
                        Err(e) => return Err(AtError::Port(e)),
                    };

                    // An empty field directly before the line terminator
                    // (`cmd:` then CRLF or LF) would leave the probe's
                    // trailing conversions unreachable. Insert a synthetic
                    // filler byte so validation can complete; fillers are
                    // spliced back out before extraction.
                    if c == b'\n' && prev == b':' {
                        fillers.push(self.buffer.len());
                        self.buffer.put_u8(b'x');
                    } else if c == b'\n' && prev == b'\r' && prev2 == b':' && !self.buffer.is_empty()
                    {
                        let at = self.buffer.len() - 1;
                        fillers.push(at);
                        insert_at(&mut self.buffer, at, b'x');
                    }
                    prev2 = prev;
                    prev = c;
                    self.buffer.put_u8(c);

                    if let Some(idx) = self.match_oob() {
                        if self.debug {
                            debug!("AT! {}", String::from_utf8_lossy(&self.oobs[idx].prefix));
                        }
                        let mut ctx = OobContext::new();
                        (self.oobs[idx].handler)(&mut ctx);
                        if ctx.is_aborted() {
                            if self.debug {
                                debug!("AT(Aborted)");
                            }
                            return Err(AtError::Aborted);
                        }
                        // The handler may have consumed transport state;
                        // restart the current template line from scratch.
                        continue 'line;
                    }

                    // With a trailing template newline, hold validation
                    // until the wire newline arrives.
                    if !(line.whole_line_wanted && c != b'\n') {
                        if let Some(count) = format::probe_line(line, &self.buffer) {
                            if count == self.buffer.len() {
                                for (k, &pos) in fillers.iter().enumerate() {
                                    remove_at(&mut self.buffer, pos - k);
                                }
                                if self.debug {
                                    debug!("AT= {}", String::from_utf8_lossy(&self.buffer));
                                }
                                captures.extend(format::extract_line(line, &self.buffer));
                                break 'line;
                            }
                        }
                    }

                    // Discard on delimiter or overflow and keep scanning;
                    // running out of space usually means binary data.
                    if c == b'\n' || self.buffer.len() >= self.capacity {
                        if self.debug {
                            debug!("AT< {}", String::from_utf8_lossy(&self.buffer));
                        }
                        self.buffer.clear();
                        fillers.clear();
                    }
                }
            }
        }

        Ok(captures)
    }

    /// Send a command followed by the output delimiter.
    ///
    /// Queued out-of-band notifications are drained first. The command text
    /// is emitted byte for byte; formatting belongs to the caller
    /// (`format!`).
    pub fn send(&mut self, command: &str) -> AtResult<()> {
        while self.process_oob() {}

        for &b in command.as_bytes() {
            self.port.put(b)?;
        }
        for i in 0..self.output_delimiter.len() {
            let b = self.output_delimiter[i];
            self.port.put(b)?;
        }

        if self.debug {
            debug!("AT> {}", command);
        }
        Ok(())
    }

    /// Drain pending out-of-band notifications.
    ///
    /// Returns `true` after dispatching one notification, `false` when the
    /// transport is idle. Accumulated lines that match no prefix are handed
    /// to the unprocessed-data sink when the input delimiter arrives or the
    /// scratch fills up.
    pub fn process_oob(&mut self) -> bool {
        if !self.port.readable() {
            return false;
        }

        self.buffer.clear();
        loop {
            let c = match self.port.get(self.timeout) {
                Ok(c) => c,
                Err(_) => return false,
            };
            self.buffer.put_u8(c);

            if let Some(idx) = self.match_oob() {
                if self.debug {
                    debug!("AT! {}", String::from_utf8_lossy(&self.oobs[idx].prefix));
                }
                let mut ctx = OobContext::new();
                (self.oobs[idx].handler)(&mut ctx);
                return true;
            }

            let flush = self.buffer.len() >= self.capacity
                || (!self.input_delimiter.is_empty()
                    && self.buffer.ends_with(&self.input_delimiter));
            if flush {
                if self.debug {
                    debug!("AT< {}", String::from_utf8_lossy(&self.buffer));
                }
                if let Some(sink) = self.unprocessed.as_mut() {
                    sink(&self.buffer);
                }
                self.buffer.clear();
            }
        }
    }

    /// Read exactly `buf.len()` raw bytes.
    ///
    /// Transparent passthrough for binary payloads after a command has put
    /// the peripheral into a data mode; the scratch buffer and delimiters
    /// are not involved.
    pub fn read(&mut self, buf: &mut [u8]) -> AtResult<usize> {
        for slot in buf.iter_mut() {
            *slot = self.port.get(self.timeout)?;
        }
        Ok(buf.len())
    }

    /// Write `data` as raw bytes, without a delimiter.
    pub fn write(&mut self, data: &[u8]) -> AtResult<usize> {
        for &b in data {
            self.port.put(b)?;
        }
        Ok(data.len())
    }

    /// Split a comma-separated parameter buffer in place.
    ///
    /// See [`split_args`](crate::split_args) for the splitting rules.
    pub fn analyse_args<'a>(&self, buf: &'a mut [u8], max_args: usize) -> Vec<&'a [u8]> {
        args::split_args(buf, max_args)
    }

    /// Find the registered entry whose prefix equals the accumulation,
    /// newest registration first.
    fn match_oob(&self) -> Option<usize> {
        (0..self.oobs.len())
            .rev()
            .find(|&i| self.oobs[i].prefix[..] == self.buffer[..])
    }
}

impl<P: SerialPort> std::fmt::Debug for AtParser<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtParser")
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .field("oobs", &self.oobs)
            .field("buffered", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Remove the byte at `idx`, shifting the tail left.
fn remove_at(buf: &mut BytesMut, idx: usize) {
    let len = buf.len();
    buf.copy_within(idx + 1..len, idx);
    buf.truncate(len - 1);
}

/// Insert `byte` at `idx`, shifting the tail right.
fn insert_at(buf: &mut BytesMut, idx: usize, byte: u8) {
    let len = buf.len();
    buf.put_u8(0);
    buf.copy_within(idx..len, idx + 1);
    buf[idx] = byte;
}

#[cfg(test)]
mod tests {
    use super::*;
    use athost_transport::MockPort;

    fn parser(port: MockPort) -> AtParser<MockPort> {
        AtParser::new(port, ParserConfig::default()).unwrap()
    }

    #[test]
    fn test_send_appends_output_delimiter() {
        let mut at = parser(MockPort::new());
        at.send("AT+GMR").unwrap();
        assert_eq!(at.into_port().sent(), &b"AT+GMR\r\n"[..]);
    }

    #[test]
    fn test_send_surfaces_write_errors() {
        let port = MockPort::new();
        port.fail_writes(true);
        let mut at = parser(port);
        assert!(matches!(at.send("AT"), Err(AtError::Port(_))));
    }

    #[test]
    fn test_raw_read_is_exact_or_timeout() {
        let port = MockPort::new();
        port.queue(b"\x01\x02\x03");
        let mut at = parser(port);

        let mut buf = [0u8; 3];
        assert_eq!(at.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);

        let mut buf = [0u8; 1];
        assert!(matches!(at.read(&mut buf), Err(AtError::Timeout)));
    }

    #[test]
    fn test_raw_write_reports_byte_count() {
        let mut at = parser(MockPort::new());
        assert_eq!(at.write(b"\xde\xad\xbe\xef").unwrap(), 4);
        assert_eq!(at.into_port().sent(), &b"\xde\xad\xbe\xef"[..]);
    }

    #[test]
    fn test_process_oob_idle_without_data() {
        let mut at = parser(MockPort::new());
        assert!(!at.process_oob());
    }

    #[test]
    fn test_filler_splicing_helpers() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"cmd:\r");
        insert_at(&mut buf, 4, b'x');
        assert_eq!(&buf[..], b"cmd:x\r");
        remove_at(&mut buf, 4);
        assert_eq!(&buf[..], b"cmd:\r");
    }
}
