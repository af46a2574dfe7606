//! Read deadline for the inbound half of a connection.

use std::time::Duration;

use tokio::time::Instant;

/// The instant after which a blocked read fails with a timeout.
///
/// Owned by the liveness reader; nothing else can reach it, so outbound
/// activity can never move it.
#[derive(Debug)]
pub struct ReadDeadline {
    at: Instant,
}

impl ReadDeadline {
    /// Arm a fresh deadline `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            at: Instant::now() + window,
        }
    }

    /// Push the deadline to `now + window`. Never moves it backwards.
    pub fn arm(&mut self, window: Duration) {
        self.at = self.at.max(Instant::now() + window);
    }

    /// Current deadline.
    pub fn instant(&self) -> Instant {
        self.at
    }

    #[cfg(test)]
    fn expired(&self) -> bool {
        Instant::now() >= self.at
    }
}
