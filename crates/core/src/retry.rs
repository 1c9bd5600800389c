// crates/core/src/retry.rs
//! Bounded retry with exponential backoff for remote calls.

use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{NotifyError, RemoteError};

/// Attempts, first delay, growth factor and delay cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            factor: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Waits between consecutive attempts; one fewer than `max_attempts`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let mut next = self.base_delay.min(self.max_delay);
        (1..self.max_attempts).map(move |_| {
            let current = next;
            next = next.saturating_mul(self.factor).min(self.max_delay);
            current
        })
    }

    /// Call `op` until it succeeds or the attempts run out, sleeping via `sleeper`
    /// in between. The last failure is returned inside `NotifyError::RetriesExhausted`.
    pub fn run<T, S, F>(&self, operation: &str, sleeper: &S, mut op: F) -> Result<T, NotifyError>
    where
        S: Sleeper + ?Sized,
        F: FnMut() -> Result<T, RemoteError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut delays = self.delays();
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "remote call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt >= attempts => {
                    warn!(operation, attempt, error = %err, "remote call failed, giving up");
                    return Err(NotifyError::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts,
                        last: err,
                    });
                }
                Err(err) => {
                    let delay = delays.next().unwrap_or(self.max_delay);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote call failed, retrying"
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

/// Blocking pause between attempts. Injectable so tests never sleep.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<F: Fn(Duration)> Sleeper for F {
    fn sleep(&self, duration: Duration) {
        self(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn secs(list: &[u64]) -> Vec<Duration> {
        list.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delays().collect::<Vec<_>>(), secs(&[1, 2, 4, 8]));
    }

    #[test]
    fn test_delays_are_capped() {
        let policy = RetryPolicy {
            max_attempts: 8,
            ..RetryPolicy::default()
        };
        assert_eq!(
            policy.delays().collect::<Vec<_>>(),
            secs(&[1, 2, 4, 8, 16, 30, 30])
        );
    }

    #[test]
    fn test_always_failing_call_attempted_five_times() {
        let calls = Cell::new(0);
        let slept = RefCell::new(Vec::new());
        let sleeper = |d: Duration| slept.borrow_mut().push(d);

        let result: Result<(), _> = RetryPolicy::default().run("edit comment", &sleeper, || {
            calls.set(calls.get() + 1);
            Err(RemoteError::new("edit comment", format!("failure {}", calls.get())))
        });

        assert_eq!(calls.get(), 5);
        assert_eq!(*slept.borrow(), secs(&[1, 2, 4, 8]));
        match result {
            Err(NotifyError::RetriesExhausted { attempts, last, .. }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last.message, "failure 5");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_success_on_second_attempt() {
        let calls = Cell::new(0);
        let slept = RefCell::new(Vec::new());
        let sleeper = |d: Duration| slept.borrow_mut().push(d);

        let result = RetryPolicy::default().run("get comment", &sleeper, || {
            calls.set(calls.get() + 1);
            if calls.get() == 1 {
                Err(RemoteError::new("get comment", "timeout"))
            } else {
                Ok("body")
            }
        });

        assert_eq!(result.unwrap(), "body");
        assert_eq!(calls.get(), 2);
        assert_eq!(*slept.borrow(), secs(&[1]));
    }

    #[test]
    fn test_first_success_never_sleeps() {
        let sleeper = |_: Duration| panic!("must not sleep");
        let value = RetryPolicy::default()
            .run("noop", &sleeper, || Ok::<_, RemoteError>(7))
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_zero_attempts_still_calls_once() {
        let calls = Cell::new(0);
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let _ = policy.run("noop", &|_: Duration| {}, || {
            calls.set(calls.get() + 1);
            Err::<(), _>(RemoteError::new("noop", "x"))
        });
        assert_eq!(calls.get(), 1);
    }
}
