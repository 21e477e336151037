//! Bounded, immediate re-invocation of fallible steps.
//!
//! Every externally-facing step of the bot (opening the browser, clicking the
//! search trigger, sorting, loading the next page, crawling) is wrapped with
//! [`retry`] independently, so one step's failures never consume another
//! step's attempts.
//!
//! # Retry Strategy
//!
//! - At most `max_attempts` invocations in total
//! - No delay between attempts; UI waits inside the step already bound time
//! - Each failure is logged with the attempt number and error detail
//! - The error from the last attempt is returned unchanged

use std::fmt::Display;
use std::time::Instant;
use tracing::error;

/// Invoke `op` until it succeeds or `max_attempts` invocations have failed.
///
/// A ceiling of `0` is treated as `1`: the operation always runs at least once,
/// otherwise there would be no result to hand back.
///
/// # Arguments
///
/// * `step` - Name of the wrapped step, used in log lines
/// * `max_attempts` - Total number of invocations allowed
/// * `op` - The fallible operation
///
/// # Returns
///
/// The first successful result, or the error raised by the final attempt.
pub fn retry<T, E, F>(step: &str, max_attempts: usize, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Result<T, E>,
{
    let max = max_attempts.max(1);
    let total_t0 = Instant::now();
    let mut attempt = 0usize;

    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max => {
                error!(
                    step,
                    attempt,
                    max,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "step exhausted retries"
                );
                return Err(e);
            }
            Err(e) => {
                error!(step, attempt, max, error = %e, "step failed; retrying");
            }
        }
    }
}
