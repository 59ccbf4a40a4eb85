//! The fulfillment state machine.
//!
//! One attempt walks `NotAtTarget -> Traveling -> (Fulfilled | Failed)`.
//! Collaborator failures are caught here, classified, and converted into the
//! requirement's failure semantics: mandatory requirements abort, everything
//! else degrades to skipped-success and is only logged. Nothing thrown by a
//! collaborator may escape to the polling driver.

use std::sync::Arc;

use rand::RngCore;
use taskweave_core::{
    Result, SchedulerConfig, StateOracle, TaskweaveError, TravelProvider, WorldHopper,
};

use super::hop::hop_with_retry;
use super::watchdog::{watch_travel, CancelFlag, WatchdogParams};
use super::{LocationRequirement, RequirementPriority};

/// How a fulfillment attempt ended, short of a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    /// Position verified within tolerance of an eligible target.
    Fulfilled,
    /// A non-mandatory requirement could not be met and was skipped.
    SkippedSuccess,
}

/// Resolves location requirements through the collaborator traits.
pub struct GoalOrchestrator {
    oracle: Arc<dyn StateOracle>,
    travel: Arc<dyn TravelProvider>,
    hopper: Arc<dyn WorldHopper>,
    config: SchedulerConfig,
    /// Hop attempts accumulated across calls while a world keeps refusing
    /// us; drives the backoff exponent. Cleared on a verified hop.
    hop_attempts: u32,
}

impl GoalOrchestrator {
    pub fn new(
        oracle: Arc<dyn StateOracle>,
        travel: Arc<dyn TravelProvider>,
        hopper: Arc<dyn WorldHopper>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            oracle,
            travel,
            hopper,
            config,
            hop_attempts: 0,
        }
    }

    fn watchdog_params(&self) -> WatchdogParams {
        WatchdogParams {
            tick: std::time::Duration::from_millis(self.config.watchdog_tick_ms),
            timeout: std::time::Duration::from_millis(self.config.watchdog_timeout_ms()),
            area_radius: self.config.stall_area_radius,
        }
    }

    /// Attempt to fulfill one requirement.
    ///
    /// Returns `Fulfilled` or `SkippedSuccess` on the paths that let the
    /// dependent task proceed; a mandatory requirement that cannot be met is
    /// an error and aborts the task.
    pub async fn fulfill(
        &mut self,
        requirement: &LocationRequirement,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<FulfillmentOutcome> {
        if let Some(world) = requirement.required_world {
            if self.hopper.current_world() != world {
                match self.hop(world, rng).await {
                    Ok(()) => {}
                    Err(err) => return self.degrade(requirement, err),
                }
            }
        }

        if requirement.is_fulfilled(self.oracle.as_ref()) {
            return Ok(FulfillmentOutcome::Fulfilled);
        }

        let Some(target) = requirement.best_target(self.oracle.as_ref(), None) else {
            return self.degrade(
                requirement,
                TaskweaveError::MandatoryUnmet(format!(
                    "{}: no eligible target",
                    requirement.name
                )),
            );
        };

        if !self.travel.can_reach(target.point) {
            return self.degrade(
                requirement,
                TaskweaveError::MandatoryUnmet(format!(
                    "{}: target {} unreachable",
                    requirement.name, target.name
                )),
            );
        }

        tracing::debug!(
            requirement = %requirement.name,
            target = %target.name,
            point = %target.point,
            "traveling to fulfill requirement"
        );

        let cancel = CancelFlag::new();
        let watchdog = watch_travel(
            self.oracle.as_ref(),
            self.travel.as_ref(),
            target.point,
            self.watchdog_params(),
            &cancel,
        );
        let arrived = tokio::select! {
            arrived = self.travel.travel_to(target.point, requirement.tolerance) => {
                cancel.cancel();
                arrived
            }
            stalled = watchdog => {
                // Only the stall branch completes; a cancelled watchdog
                // cannot win the race against the finished travel.
                match stalled {
                    Err(err) => return self.degrade(requirement, err),
                    Ok(()) => false,
                }
            }
        };

        if arrived && requirement.is_fulfilled(self.oracle.as_ref()) {
            tracing::debug!(requirement = %requirement.name, "requirement fulfilled");
            return Ok(FulfillmentOutcome::Fulfilled);
        }
        self.degrade(
            requirement,
            TaskweaveError::MandatoryUnmet(format!(
                "{}: travel finished outside tolerance",
                requirement.name
            )),
        )
    }

    async fn hop(&mut self, world: i32, rng: &mut (dyn RngCore + Send)) -> Result<()> {
        let mut cumulative = self.hop_attempts;
        let result = hop_with_retry(
            self.hopper.as_ref(),
            world,
            self.config.max_hop_attempts_per_world,
            self.config.hop_base_delay_ms,
            self.config.hop_max_delay_ms,
            &mut cumulative,
            rng,
        )
        .await;
        self.hop_attempts = if result.is_ok() { 0 } else { cumulative };
        result
    }

    /// Apply the requirement's failure semantics to an error.
    fn degrade(
        &self,
        requirement: &LocationRequirement,
        err: TaskweaveError,
    ) -> Result<FulfillmentOutcome> {
        match requirement.priority {
            RequirementPriority::Mandatory => {
                tracing::error!(requirement = %requirement.name, %err, "mandatory requirement failed");
                Err(err)
            }
            RequirementPriority::Recommended => {
                tracing::warn!(requirement = %requirement.name, %err, "requirement skipped");
                Ok(FulfillmentOutcome::SkippedSuccess)
            }
            RequirementPriority::Optional => {
                tracing::debug!(requirement = %requirement.name, %err, "requirement skipped");
                Ok(FulfillmentOutcome::SkippedSuccess)
            }
        }
    }
}
