//! Out-of-band notification registry.
//!
//! Peripherals push unsolicited notifications (`+RING`, `+IPD,...`) at any
//! byte boundary. A handler is registered against an opaque byte prefix and
//! fires as soon as a line accumulation equals that prefix exactly.
//! Registrations are append-only for the parser's lifetime; when prefixes
//! collide, the newest registration wins.

/// Context handed to an out-of-band handler while it runs.
///
/// Handlers never see the parser itself: a handler that wants to react by
/// issuing commands must record the event and let the driver act after the
/// enclosing `recv` or `process_oob` returns. The context's only control
/// knob is [`abort`](OobContext::abort).
#[derive(Debug, Default)]
pub struct OobContext {
    aborted: bool,
}

impl OobContext {
    pub(crate) fn new() -> Self {
        OobContext::default()
    }

    /// Abort the in-flight `recv`.
    ///
    /// The receive fails with `AtError::Aborted` as soon as this handler
    /// returns, with no fields extracted. Has no effect under
    /// `process_oob`, which has nothing to abort.
    pub fn abort(&mut self) {
        self.aborted = true;
    }

    /// Check whether an abort was requested.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

/// Boxed out-of-band handler.
pub type OobHandler = Box<dyn FnMut(&mut OobContext)>;

/// A registered prefix/handler pair.
pub(crate) struct OobEntry {
    pub prefix: Vec<u8>,
    pub handler: OobHandler,
}

impl std::fmt::Debug for OobEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OobEntry")
            .field("prefix", &String::from_utf8_lossy(&self.prefix))
            .finish_non_exhaustive()
    }
}
