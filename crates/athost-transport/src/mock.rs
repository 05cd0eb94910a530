//! Scripted serial port for deterministic tests.

use athost_core::{PortError, PortResult, SerialPort};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    /// Bytes pending for `get`.
    rx: VecDeque<u8>,
    /// Log of all bytes written through `put`.
    tx: Vec<u8>,
    /// When set, every `put` fails.
    write_error: bool,
    /// Timeout passed to `init`, recorded for assertions.
    init_timeout: Option<Duration>,
}

/// A [`SerialPort`] backed by in-memory queues.
///
/// Bytes queued with [`queue`](MockPort::queue) are returned by `get` in
/// order; once the queue is empty, `get` reports [`PortError::Timeout`]
/// immediately, so timeout paths are testable without wall-clock delays.
/// Everything written through `put` is recorded and available via
/// [`sent`](MockPort::sent).
///
/// [`handle`](MockPort::handle) returns a second grip on the same queues,
/// so a test can keep feeding bytes after the port has been moved into a
/// parser — the way a real peripheral produces its response only after the
/// command went out.
#[derive(Debug, Default)]
pub struct MockPort {
    inner: Rc<RefCell<Inner>>,
}

/// A cloneable handle onto a [`MockPort`]'s queues.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    inner: Rc<RefCell<Inner>>,
}

impl MockPort {
    /// Create an empty mock port.
    pub fn new() -> Self {
        MockPort::default()
    }

    /// Get a handle that shares this port's queues.
    pub fn handle(&self) -> MockHandle {
        MockHandle {
            inner: self.inner.clone(),
        }
    }

    /// Queue bytes to be returned by `get`.
    pub fn queue(&self, data: &[u8]) {
        self.inner.borrow_mut().rx.extend(data);
    }

    /// Queue a text chunk to be returned by `get`.
    pub fn queue_str(&self, data: &str) {
        self.queue(data.as_bytes());
    }

    /// All bytes written so far.
    pub fn sent(&self) -> Vec<u8> {
        self.inner.borrow().tx.clone()
    }

    /// Number of queued bytes not yet consumed.
    pub fn rx_remaining(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    /// Make every subsequent `put` fail.
    pub fn fail_writes(&self, on: bool) {
        self.inner.borrow_mut().write_error = on;
    }

    /// The timeout the owning parser initialized the port with.
    pub fn init_timeout(&self) -> Option<Duration> {
        self.inner.borrow().init_timeout
    }
}

impl MockHandle {
    /// Queue bytes to be returned by the port's `get`.
    pub fn queue(&self, data: &[u8]) {
        self.inner.borrow_mut().rx.extend(data);
    }

    /// Queue a text chunk to be returned by the port's `get`.
    pub fn queue_str(&self, data: &str) {
        self.queue(data.as_bytes());
    }

    /// All bytes written through the port so far.
    pub fn sent(&self) -> Vec<u8> {
        self.inner.borrow().tx.clone()
    }

    /// Number of queued bytes not yet consumed.
    pub fn rx_remaining(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    /// Make every subsequent `put` on the port fail.
    pub fn fail_writes(&self, on: bool) {
        self.inner.borrow_mut().write_error = on;
    }
}

impl SerialPort for MockPort {
    fn init(&mut self, timeout: Duration) -> PortResult<()> {
        self.inner.borrow_mut().init_timeout = Some(timeout);
        Ok(())
    }

    fn get(&mut self, _timeout: Duration) -> PortResult<u8> {
        self.inner.borrow_mut().rx.pop_front().ok_or(PortError::Timeout)
    }

    fn put(&mut self, byte: u8) -> PortResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.write_error {
            return Err(PortError::Closed);
        }
        inner.tx.push(byte);
        Ok(())
    }

    fn readable(&mut self) -> bool {
        !self.inner.borrow().rx.is_empty()
    }
}
