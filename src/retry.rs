use anyhow::Result;
use log::warn;
use std::thread;
use std::time::Duration;

/// Bounded exponential backoff around a fallible call.
///
/// Delay before attempt n+1 is `base_delay * 2^n` (n starting at 1), so with
/// a 1s base the gaps grow 2s, 4s, 8s, 16s. No sleep after the last attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Errors this returns false for are propagated immediately.
    pub retryable: fn(&anyhow::Error) -> bool,
}

fn always(_: &anyhow::Error) -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            retryable: always,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            base_delay,
            retryable: always,
        }
    }

    /// Run `op`, retrying per policy. Returns the last error on exhaustion.
    pub fn call<T>(&self, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match op() {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.max_attempts || !(self.retryable)(&e) {
                        return Err(e);
                    }
                    warn!(
                        "{what}: {e}. Retry {attempt}/{max}",
                        max = self.max_attempts
                    );
                    thread::sleep(self.base_delay * 2u32.pow(attempt));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::cell::Cell;

    fn fast() -> RetryPolicy {
        RetryPolicy::new(5, Duration::from_millis(0))
    }

    #[test]
    fn returns_first_success() {
        let calls = Cell::new(0);
        let out: i32 = fast()
            .call("op", || {
                calls.set(calls.get() + 1);
                Ok(7)
            })
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn stops_after_max_attempts() {
        let calls = Cell::new(0);
        let res: Result<()> = fast().call("op", || {
            calls.set(calls.get() + 1);
            Err(anyhow!("boom"))
        });
        assert!(res.is_err());
        assert_eq!(calls.get(), 5);
    }

    #[test]
    fn recovers_mid_sequence() {
        let calls = Cell::new(0);
        let out: i32 = fast()
            .call("op", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(anyhow!("transient"))
                } else {
                    Ok(42)
                }
            })
            .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn non_retryable_error_fails_fast() {
        let mut policy = fast();
        policy.retryable = |e| !e.to_string().contains("fatal");
        let calls = Cell::new(0);
        let res: Result<()> = policy.call("op", || {
            calls.set(calls.get() + 1);
            Err(anyhow!("fatal: bad credentials"))
        });
        assert!(res.is_err());
        assert_eq!(calls.get(), 1);
    }
}
