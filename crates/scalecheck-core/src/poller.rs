//! Bounded-retry convergence polling
//!
//! Repeatedly samples a resource's observed size until it equals a target
//! or the retry budget runs out. Probe failures abort the poll right away
//! as their own failure kind; silently retrying on broken connectivity
//! would hide an outage behind a slow-convergence report.

use crate::clients::ResourceProbe;
use crate::error::ConvergenceError;
use crate::types::{ResourceId, RetryPolicy};

/// Successful convergence outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Convergence {
    /// Probe calls made, counting the one that observed the target
    pub attempts: u32,
}

/// Poll `probe` until `id` reports exactly `target`
///
/// Makes at most `policy.max_attempts` probe calls with `policy.interval`
/// between consecutive calls; returns on the first attempt that observes
/// the target. The calling task suspends for up to
/// `policy.max_wait()` in the worst case.
///
/// # Errors
/// - `ConvergenceError::Probe` as soon as any probe call fails
/// - `ConvergenceError::Exhausted` once the attempt budget is spent,
///   carrying the last observed size for diagnostics
pub async fn await_convergence(
    probe: &dyn ResourceProbe,
    id: &ResourceId,
    target: u32,
    policy: RetryPolicy,
) -> Result<Convergence, ConvergenceError> {
    let max = policy.max_attempts.get();
    tracing::info!(
        "waiting up to {}s for {id} to reach {target} shards",
        policy.max_wait().as_secs()
    );

    let mut last_observed = 0;
    for attempt in 1..=max {
        let observed =
            probe
                .observed_size(id)
                .await
                .map_err(|source| ConvergenceError::Probe {
                    id: id.to_string(),
                    source,
                })?;

        if observed == target {
            tracing::info!("{id} reached target size {target} on attempt {attempt}");
            return Ok(Convergence { attempts: attempt });
        }

        tracing::debug!("attempt {attempt}/{max}: currently {observed} shards");
        last_observed = observed;
        if attempt < max {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(ConvergenceError::Exhausted {
        id: id.to_string(),
        target,
        last_observed,
        attempts: max,
    })
}
