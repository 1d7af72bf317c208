use crate::error::{StoreError, StoreResult};
use std::time::{Duration, Instant};

/// used instead of a timeout too large to be represented as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// One deadline shared by every step of a run.
///
/// It starts ticking when the run begins and is never renewed, so a long
/// migration can run out of time halfway through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Instant,
}

impl Deadline {
    /// create a deadline which expires `timeout` from now.
    pub fn after(timeout: Duration) -> Deadline {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(timeout.min(FAR_FUTURE)))
            .unwrap_or(now);
        Deadline::at(expires_at)
    }

    pub fn at(expires_at: Instant) -> Deadline {
        Deadline { expires_at }
    }

    /// time left before expiring, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Checkpoint before a store call.
    pub fn check(&self) -> StoreResult<()> {
        if self.is_expired() {
            Err(StoreError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    /// Run `op` only if there is still time left.
    pub fn guard<T>(&self, op: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
        self.check()?;
        op()
    }
}
