//! Movement-stall watchdog.
//!
//! Runs beside a travel operation on a short fixed tick. It remembers the
//! last position where real movement was observed; if the player stays inside
//! a small radius of that anchor for the whole timeout, the pathing routine
//! is assumed stuck, the in-flight travel is cancelled, and the attempt is
//! reported as a stall. The owner stops the watchdog through a [`CancelFlag`]
//! rather than by aborting it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use taskweave_core::{Result, StateOracle, TaskweaveError, TravelProvider, WorldPoint};
use tokio::time::{sleep, Instant};

/// Cooperative cancellation handle. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Watchdog tuning, taken from `SchedulerConfig` by the orchestrator.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogParams {
    pub tick: Duration,
    pub timeout: Duration,
    /// Movement within this radius of the anchor does not count as progress.
    pub area_radius: i32,
}

/// Supervise an in-flight travel toward `target` until `cancel` is raised or
/// a stall is detected.
///
/// On stall the travel is cancelled through the provider (which also clears
/// the active destination) and `TravelStalled` is returned. A raised cancel
/// flag means the owner considers the travel finished; the watchdog then
/// exits cleanly.
pub async fn watch_travel(
    oracle: &dyn StateOracle,
    travel: &dyn TravelProvider,
    target: WorldPoint,
    params: WatchdogParams,
    cancel: &CancelFlag,
) -> Result<()> {
    let mut anchor = oracle.position();
    let mut last_progress = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let pos = oracle.position();
        match (anchor, pos) {
            (Some(a), Some(p)) if !p.is_within(&a, params.area_radius) => {
                anchor = Some(p);
                last_progress = Instant::now();
            }
            // First fix after an unknown position also counts as progress.
            (None, Some(p)) => {
                anchor = Some(p);
                last_progress = Instant::now();
            }
            _ => {}
        }

        let stalled_for = last_progress.elapsed();
        if stalled_for >= params.timeout {
            tracing::warn!(
                %target,
                stalled_ms = stalled_for.as_millis() as u64,
                "travel stalled, cancelling"
            );
            travel.cancel_travel();
            return Err(TaskweaveError::TravelStalled {
                target: target.to_string(),
                stalled_for_ms: stalled_for.as_millis() as u64,
            });
        }
        sleep(params.tick).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use taskweave_core::Skill;

    fn params() -> WatchdogParams {
        WatchdogParams {
            tick: Duration::from_millis(5),
            timeout: Duration::from_millis(40),
            area_radius: 2,
        }
    }

    struct WalkingOracle {
        pos: Mutex<WorldPoint>,
        step: i32,
    }

    impl StateOracle for WalkingOracle {
        fn position(&self) -> Option<WorldPoint> {
            let mut pos = self.pos.lock().ok()?;
            let out = *pos;
            pos.x += self.step;
            Some(out)
        }
        fn session_ready(&self) -> bool {
            true
        }
        fn is_member(&self) -> Option<bool> {
            None
        }
        fn skill_level(&self, _skill: Skill) -> Option<u32> {
            None
        }
        fn quest_completed(&self, _quest_id: u32) -> Option<bool> {
            None
        }
        fn item_count(&self, _item_id: u32) -> Option<u32> {
            None
        }
        fn flag(&self, _flag_id: u32) -> Option<bool> {
            None
        }
    }

    #[derive(Default)]
    struct RecordingTravel {
        cancelled: AtomicBool,
    }

    #[async_trait]
    impl TravelProvider for RecordingTravel {
        async fn travel_to(&self, _target: WorldPoint, _tolerance: i32) -> bool {
            true
        }
        fn cancel_travel(&self) {
            self.cancelled.store(true, Ordering::Release);
        }
        fn can_reach(&self, _target: WorldPoint) -> bool {
            true
        }
        fn is_moving(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn stalled_travel_is_cancelled_and_reported() {
        let oracle = WalkingOracle {
            pos: Mutex::new(WorldPoint::new(3200, 3200, 0)),
            step: 0,
        };
        let travel = RecordingTravel::default();
        let cancel = CancelFlag::new();

        let result = watch_travel(
            &oracle,
            &travel,
            WorldPoint::new(3300, 3300, 0),
            params(),
            &cancel,
        )
        .await;

        assert!(matches!(
            result,
            Err(TaskweaveError::TravelStalled { .. })
        ));
        assert!(travel.cancelled.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn moving_player_never_stalls() {
        // Moves 3 tiles per poll, outside the radius-2 anchor every time.
        let oracle = WalkingOracle {
            pos: Mutex::new(WorldPoint::new(3200, 3200, 0)),
            step: 3,
        };
        let travel = RecordingTravel::default();
        let cancel = CancelFlag::new();

        let watchdog = watch_travel(
            &oracle,
            &travel,
            WorldPoint::new(3300, 3200, 0),
            params(),
            &cancel,
        );
        let canceller = async {
            sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(watchdog, canceller);

        assert!(result.is_ok());
        assert!(!travel.cancelled.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn cancelled_watchdog_exits_cleanly() {
        let oracle = WalkingOracle {
            pos: Mutex::new(WorldPoint::new(3200, 3200, 0)),
            step: 0,
        };
        let travel = RecordingTravel::default();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = watch_travel(
            &oracle,
            &travel,
            WorldPoint::new(3300, 3300, 0),
            params(),
            &cancel,
        )
        .await;
        assert!(result.is_ok());
        assert!(!travel.cancelled.load(Ordering::Acquire));
    }
}
