use tracing::warn;

use crate::error::TransportError;
use crate::session::SessionExport;

/// Delivers a session export somewhere outside the process.
pub trait ResultTransport {
    fn send(&mut self, export: &SessionExport) -> Result<(), TransportError>;
}

impl<X: ResultTransport + ?Sized> ResultTransport for &mut X {
    fn send(&mut self, export: &SessionExport) -> Result<(), TransportError> {
        (**self).send(export)
    }
}

/// Tries `send` up to `attempts` times (at least once), returning the last
/// error if every attempt fails.
pub fn send_with_retry<X: ResultTransport + ?Sized>(
    transport: &mut X,
    export: &SessionExport,
    attempts: usize,
) -> Result<(), TransportError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match transport.send(export) {
            Ok(()) => return Ok(()),
            Err(e) if attempt < attempts => {
                warn!(attempt, error = %e, "sending results failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Keeps every export in memory. `failing(n)` rejects the first `n` sends.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    pub sent: Vec<SessionExport>,
    failures_left: usize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(times: usize) -> Self {
        Self {
            sent: Vec::new(),
            failures_left: times,
        }
    }
}

impl ResultTransport for MemoryTransport {
    fn send(&mut self, export: &SessionExport) -> Result<(), TransportError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(TransportError::Rejected("server unavailable".into()));
        }
        self.sent.push(export.clone());
        Ok(())
    }
}
