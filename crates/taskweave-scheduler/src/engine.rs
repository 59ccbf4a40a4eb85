//! Scheduler engine — the polling driver that evaluates, orders, and runs
//! task entries.
//!
//! One `tick()` per polling interval: evaluate every entry's start tree,
//! order the candidates, select exactly one, resolve its location
//! requirements through the orchestrator, then monitor the running entry
//! against its stop tree on subsequent ticks. Collaborator failures are
//! classified by the orchestrator and never escape the loop.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::Mutex;
use uuid::Uuid;

use taskweave_core::{SchedulerConfig, StateOracle, TravelProvider, WorldHopper};

use crate::condition::{Condition, EvalContext};
use crate::entry::{StopReason, TaskEntry};
use crate::goal::GoalOrchestrator;
use crate::ordering;
use crate::store::EntryStore;

/// Per-instance scheduler state that the original kept in globals: the
/// pause-all switch and a human-readable status line.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    pub paused: bool,
    pub status: String,
}

impl Default for SchedulerContext {
    fn default() -> Self {
        Self {
            paused: false,
            status: "idle".into(),
        }
    }
}

/// What one polling tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Pause-all is set; nothing was evaluated.
    Paused,
    /// No entry was due.
    Idle,
    /// An entry was selected and started.
    Started(Uuid),
    /// The running entry keeps running.
    Running(Uuid),
    /// The running entry was stopped.
    Stopped { id: Uuid, reason: StopReason },
    /// A selected entry was aborted before starting because a mandatory
    /// requirement could not be fulfilled.
    Aborted(Uuid),
}

/// The scheduler engine. Owns the entries and is their only mutator; the
/// ordering pass reads them as a snapshot.
pub struct SchedulerEngine {
    entries: Vec<TaskEntry>,
    config: SchedulerConfig,
    pub context: SchedulerContext,
    oracle: Arc<dyn StateOracle>,
    orchestrator: GoalOrchestrator,
    store: Option<EntryStore>,
    rng: StdRng,
    running: Option<Uuid>,
}

impl SchedulerEngine {
    pub fn new(
        config: SchedulerConfig,
        oracle: Arc<dyn StateOracle>,
        travel: Arc<dyn TravelProvider>,
        hopper: Arc<dyn WorldHopper>,
    ) -> Self {
        let orchestrator =
            GoalOrchestrator::new(oracle.clone(), travel, hopper, config.clone());
        Self {
            entries: Vec::new(),
            config,
            context: SchedulerContext::default(),
            oracle,
            orchestrator,
            store: None,
            rng: StdRng::from_entropy(),
            running: None,
        }
    }

    /// Attach a store and load its entries, re-arming every condition tree.
    pub fn with_store(mut self, store: EntryStore) -> Self {
        let now = self.oracle.now();
        let mut entries = store.load();
        for entry in &mut entries {
            entry.reset_conditions(now, &mut self.rng);
        }
        tracing::info!("📅 Loaded {} task entries", entries.len());
        self.entries = entries;
        self.store = Some(store);
        self
    }

    /// Deterministic RNG for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Add an entry, arming its condition trees.
    pub fn add_entry(&mut self, mut entry: TaskEntry) {
        let now = self.oracle.now();
        entry.reset_conditions(now, &mut self.rng);
        tracing::info!("📅 Entry added: '{}' ({})", entry.name, entry.id);
        self.entries.push(entry);
        self.save();
    }

    pub fn remove_entry(&mut self, id: Uuid) -> bool {
        if self.running == Some(id) {
            self.running = None;
        }
        let len = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() < len {
            self.save();
            true
        } else {
            false
        }
    }

    pub fn entries(&self) -> &[TaskEntry] {
        &self.entries
    }

    pub fn entry(&self, id: Uuid) -> Option<&TaskEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn running_entry(&self) -> Option<&TaskEntry> {
        let id = self.running?;
        self.entry(id)
    }

    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.enabled = enabled;
            self.save();
        }
    }

    /// Pause or resume all scheduling. Pausing also pauses every time
    /// condition so time spent paused does not count toward any trigger.
    pub fn set_paused(&mut self, paused: bool) {
        if self.context.paused == paused {
            return;
        }
        let now = self.oracle.now();
        for entry in &mut self.entries {
            if paused {
                entry.pause(now);
            } else {
                entry.resume(now);
            }
        }
        self.context.paused = paused;
        self.context.status = if paused { "paused".into() } else { "idle".into() };
        tracing::info!("⏸️ Scheduler {}", if paused { "paused" } else { "resumed" });
    }

    /// The host reports that the running entry's routine ended on its own.
    pub fn finish_running(&mut self, reason: StopReason) -> Option<TickOutcome> {
        let id = self.running.take()?;
        let now = self.oracle.now();
        let entry = self.entries.iter_mut().find(|e| e.id == id)?;
        entry.record_stop(now, reason.clone());
        tracing::info!("🛑 Entry '{}' stopped: {}", entry.name, reason);
        self.save();
        Some(TickOutcome::Stopped { id, reason })
    }

    /// Stop the running entry on operator request. A lock condition does not
    /// veto a manual stop; it only guards stop-tree evaluation.
    pub fn stop_manual(&mut self) -> Option<TickOutcome> {
        self.finish_running(StopReason::Manual)
    }

    /// One polling pass.
    pub async fn tick(&mut self) -> TickOutcome {
        if self.context.paused {
            return TickOutcome::Paused;
        }

        if let Some(id) = self.running {
            return self.monitor_running(id);
        }

        let Some(id) = self.select_candidate() else {
            self.context.status = "idle".into();
            return TickOutcome::Idle;
        };
        self.start_entry(id).await
    }

    /// Check the running entry's stop tree.
    fn monitor_running(&mut self, id: Uuid) -> TickOutcome {
        let ctx = EvalContext::new(self.oracle.as_ref());
        let now = ctx.now;
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            // Removed out from under us.
            self.running = None;
            return TickOutcome::Idle;
        };
        if entry.should_stop(&ctx) {
            entry.record_stop(now, StopReason::StopConditionMet);
            tracing::info!("🛑 Entry '{}' stop condition met", entry.name);
            self.running = None;
            self.save();
            return TickOutcome::Stopped {
                id,
                reason: StopReason::StopConditionMet,
            };
        }
        TickOutcome::Running(id)
    }

    /// Order the snapshot and pick the first startable candidate.
    fn select_candidate(&mut self) -> Option<Uuid> {
        let ctx = EvalContext::new(self.oracle.as_ref());
        let window = chrono::Duration::seconds(self.config.weight_group_window_secs as i64);
        let ordered = ordering::order(&self.entries, &ctx, true, window, &mut self.rng);
        for entry in ordered {
            if !entry.enabled || !entry.is_due(&ctx) {
                continue;
            }
            if !entry.has_bounded_stop() {
                tracing::warn!(
                    "Entry '{}' has an unsatisfiable stop tree and no unbounded-run opt-in, skipping",
                    entry.name
                );
                continue;
            }
            return Some(entry.id);
        }
        None
    }

    /// Fulfill requirements, then start the entry.
    async fn start_entry(&mut self, id: Uuid) -> TickOutcome {
        let requirements = match self.entries.iter().find(|e| e.id == id) {
            Some(entry) => entry.requirements.clone(),
            None => return TickOutcome::Idle,
        };

        for requirement in &requirements {
            match self.orchestrator.fulfill(requirement, &mut self.rng).await {
                Ok(_) => {}
                Err(err) => {
                    let now = self.oracle.now();
                    if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
                        tracing::warn!(
                            "⚠️ Entry '{}' aborted before start: {err}",
                            entry.name
                        );
                        entry.last_stop_reason = Some(StopReason::MandatoryRequirementFailed);
                        // Consume the start trigger so the entry waits a full
                        // cycle before the next attempt instead of retrying
                        // every tick.
                        entry
                            .start_condition
                            .on_trigger_consumed(now, &mut self.rng);
                    }
                    self.save();
                    return TickOutcome::Aborted(id);
                }
            }
        }

        let now = self.oracle.now();
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return TickOutcome::Idle;
        };
        entry.record_start(now, &mut self.rng);
        tracing::info!("🔔 Entry started: '{}'", entry.name);
        self.context.status = format!("running {}", entry.name);
        self.running = Some(id);
        self.save();
        TickOutcome::Started(id)
    }

    fn save(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.entries) {
                tracing::warn!("⚠️ Failed to save entries: {e}");
            }
        }
    }
}

/// Drive the engine on a fixed-delay polling loop as a background task.
pub async fn spawn_scheduler(engine: Arc<Mutex<SchedulerEngine>>) {
    let poll_secs = {
        let eng = engine.lock().await;
        eng.config.poll_interval_secs
    };
    tracing::info!("⏰ Scheduler started (poll every {poll_secs}s)");

    let mut interval = tokio::time::interval(std::time::Duration::from_secs(poll_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let outcome = {
            let mut eng = engine.lock().await;
            eng.tick().await
        };
        match &outcome {
            TickOutcome::Started(id) => tracing::debug!(%id, "tick: started"),
            TickOutcome::Stopped { id, reason } => {
                tracing::debug!(%id, %reason, "tick: stopped")
            }
            TickOutcome::Aborted(id) => tracing::debug!(%id, "tick: aborted"),
            _ => {}
        }
    }
}
