use crate::error::WorktreeError;
use anyhow::Result;
use std::io::ErrorKind;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) multiplier: f64,
}

impl RetryPolicy {
    pub(crate) fn for_creation() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    pub(crate) fn for_queries() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub(crate) fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        self.base_delay.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or runs
/// out of attempts. The last error is returned unchanged.
pub(crate) fn retry<T>(
    policy: RetryPolicy,
    op_name: &str,
    is_retryable: impl Fn(&anyhow::Error) -> bool,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt + 1 >= attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "attempt {}/{} of {op_name} failed: {err:#}; retrying in {:.1}s",
                    attempt + 1,
                    attempts,
                    delay.as_secs_f64()
                );
                thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Failures worth retrying: the process could not be spawned for a reason
/// other than git being absent, or git hit a held lock file.
pub(crate) fn is_transient(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(worktree_err) = cause.downcast_ref::<WorktreeError>() {
            return match worktree_err {
                WorktreeError::GitCommand { stderr, .. } => is_lock_contention(stderr),
                _ => false,
            };
        }
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return io.kind() != ErrorKind::NotFound;
        }
    }
    false
}

pub(crate) fn is_lock_contention(stderr: &str) -> bool {
    stderr.contains(".lock") && (stderr.contains("File exists") || stderr.contains("Unable to create"))
}
