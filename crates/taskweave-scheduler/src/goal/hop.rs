//! World relocation with bounded, backed-off retries.
//!
//! Hops are flaky: a request can be accepted and still land on the wrong
//! world. Each call retries up to a per-call attempt cap, verifying the
//! resulting world after every attempt. The backoff delay grows with the
//! cumulative attempt count across the whole operation, not just this call,
//! so repeated calls against a stubborn world keep slowing down.

use std::time::Duration;

use rand::{Rng, RngCore};
use taskweave_core::{Result, TaskweaveError, WorldHopper};
use tokio::time::sleep;

/// Backoff before the next attempt: `base × 2^(cumulative-1)` clamped to
/// `max`, with ±10% jitter.
pub fn hop_delay(
    base_ms: u64,
    max_ms: u64,
    cumulative_attempts: u32,
    rng: &mut (dyn RngCore + Send),
) -> Duration {
    let exponent = cumulative_attempts.saturating_sub(1).min(20);
    let raw = base_ms.saturating_mul(1u64 << exponent).min(max_ms).max(1);
    let jitter = rng.gen_range(0.9..=1.1);
    Duration::from_millis((raw as f64 * jitter) as u64)
}

/// Attempt to relocate to `world`, retrying up to `max_attempts` times within
/// this call. `cumulative_attempts` carries backoff state across calls.
pub async fn hop_with_retry(
    hopper: &dyn WorldHopper,
    world: i32,
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    cumulative_attempts: &mut u32,
    rng: &mut (dyn RngCore + Send),
) -> Result<()> {
    if hopper.current_world() == world {
        return Ok(());
    }
    if !hopper.can_access_world(world) {
        return Err(TaskweaveError::HopRetriesExhausted { world, attempts: 0 });
    }

    for attempt in 1..=max_attempts {
        *cumulative_attempts += 1;
        let accepted = hopper.attempt_relocate(world).await;
        // Verify the landing world even when the request claimed success.
        if accepted && hopper.current_world() == world {
            tracing::debug!(world, attempt, "hop verified");
            return Ok(());
        }
        tracing::debug!(world, attempt, accepted, "hop attempt failed verification");

        if attempt < max_attempts {
            let delay = hop_delay(base_delay_ms, max_delay_ms, *cumulative_attempts, rng);
            sleep(delay).await;
        }
    }
    Err(TaskweaveError::HopRetriesExhausted {
        world,
        attempts: max_attempts,
    })
}
