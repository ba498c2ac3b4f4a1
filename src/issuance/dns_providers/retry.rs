use log::{debug, warn};
use std::time::{Duration, Instant};

use crate::issuance::dns::ChallengeError;

/// Re-runs `check` until it reports success or `timeout` elapses.
///
/// The closure should return:
/// - `Ok(true)` once the condition holds
/// - `Ok(false)` if the check should be retried
/// - `Err(_)` to fail immediately without retrying
pub fn wait_until<F>(
    record_name: &str,
    operation: &str,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), ChallengeError>
where
    F: FnMut() -> Result<bool, ChallengeError>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!("[dns-retry] {operation} check attempt {attempt} for {record_name}");

        match check() {
            Ok(true) => {
                debug!(
                    "[dns-retry] {operation} confirmed after {}ms (attempt {attempt})",
                    started.elapsed().as_millis()
                );
                return Ok(());
            }
            Ok(false) => {
                if started.elapsed() >= timeout {
                    warn!(
                        "[dns-retry] {operation} timeout after {}ms (attempt {attempt})",
                        started.elapsed().as_millis()
                    );
                    return Err(ChallengeError::Propagation(format!(
                        "{operation} for {record_name}: timeout after {}ms",
                        started.elapsed().as_millis()
                    )));
                }
                std::thread::sleep(interval.min(timeout.saturating_sub(started.elapsed())));
            }
            Err(err) => {
                warn!("[dns-retry] {operation} failed immediately: {err}");
                return Err(err);
            }
        }
    }
}
