//! Bounded waiting for on-chain state to become visible.

use std::time::Duration;

use tracing::debug;

use crate::config::PollConfig;
use crate::ResolveError;

/// Shortest pause between checks, so a zero interval still uses up the budget.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Something that can pause the current thread. Tests swap in fakes.
pub trait Sleep {
    fn sleep(&self, duration: Duration);
}

/// Sleeps for real.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleep + ?Sized> Sleep for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Call `check` until it yields a value, backing off exponentially between
/// calls. Errors from `check` abort immediately; `Ok(None)` means "not yet".
///
/// Fails with [`ResolveError::Timeout`] once `config.timeout` has been spent
/// sleeping and the last check still came back empty.
pub fn poll_until<T, S, F>(
    sleeper: &S,
    config: &PollConfig,
    what: &str,
    mut check: F,
) -> Result<T, ResolveError>
where
    S: Sleep + ?Sized,
    F: FnMut() -> Result<Option<T>, ResolveError>,
{
    let mut waited = Duration::ZERO;
    let mut interval = config.initial_interval.max(MIN_POLL_INTERVAL);

    loop {
        if let Some(value) = check()? {
            return Ok(value);
        }
        if waited >= config.timeout {
            return Err(ResolveError::Timeout {
                what: what.to_string(),
                waited,
            });
        }

        let nap = interval.min(config.timeout - waited);
        debug!("Waiting {:?} for {}", nap, what);
        sleeper.sleep(nap);
        waited += nap;
        interval = interval
            .saturating_mul(2)
            .min(config.max_interval)
            .max(MIN_POLL_INTERVAL);
    }
}
