//! TCP-attached serial port.
//!
//! Many deployments expose a peripheral's UART on a TCP port rather than a
//! local device node: RFC 2217 device servers, ser2net, or simulators that
//! publish one port per simulated node. [`TcpPort`] implements the blocking
//! byte-at-a-time transport contract over such an endpoint.

use athost_core::{PortError, PortResult, SerialPort};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A [`SerialPort`] over a TCP stream.
#[derive(Debug)]
pub struct TcpPort {
    stream: TcpStream,
    /// Last timeout applied to the socket, to avoid a syscall per byte.
    read_timeout: Option<Duration>,
}

impl TcpPort {
    /// Connect to a TCP-exposed UART endpoint, e.g. `"127.0.0.1:5000"`.
    pub fn connect(addr: impl ToSocketAddrs) -> PortResult<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(TcpPort {
            stream,
            read_timeout: None,
        })
    }

    /// Local peer address, for diagnostics.
    pub fn peer_addr(&self) -> PortResult<std::net::SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    fn apply_timeout(&mut self, timeout: Duration) -> PortResult<()> {
        if self.read_timeout != Some(timeout) {
            // A zero timeout is invalid at the socket layer; clamp to the
            // shortest representable wait.
            let effective = timeout.max(Duration::from_millis(1));
            self.stream.set_read_timeout(Some(effective))?;
            self.read_timeout = Some(timeout);
        }
        Ok(())
    }
}

impl SerialPort for TcpPort {
    fn init(&mut self, timeout: Duration) -> PortResult<()> {
        self.apply_timeout(timeout)
    }

    fn get(&mut self, timeout: Duration) -> PortResult<u8> {
        self.apply_timeout(timeout)?;
        let mut buf = [0u8; 1];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return Err(PortError::Closed),
                Ok(_) => return Ok(buf[0]),
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                    return Err(PortError::Timeout);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(PortError::Io(e)),
            }
        }
    }

    fn put(&mut self, byte: u8) -> PortResult<()> {
        self.stream.write_all(&[byte])?;
        Ok(())
    }

    fn readable(&mut self) -> bool {
        let mut buf = [0u8; 1];
        if self.stream.set_nonblocking(true).is_err() {
            return false;
        }
        let pending = matches!(self.stream.peek(&mut buf), Ok(n) if n > 0);
        let _ = self.stream.set_nonblocking(false);
        pending
    }
}
