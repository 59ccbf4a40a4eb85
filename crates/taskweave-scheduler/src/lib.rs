//! # Taskweave Scheduler
//!
//! Condition-gated scheduling for independent automation tasks: each task
//! entry owns a start- and a stop-condition tree, the engine polls them on a
//! fixed cadence, and a weighted tie-break keeps equally-eligible tasks from
//! starving each other.
//!
//! ## Architecture
//! ```text
//! SchedulerEngine (tokio interval)
//!   ├── TaskEntry: start/stop LogicalCondition trees
//!   │     ├── TimeCondition: Interval | TimeWindow | DayOfWeek | SingleTrigger
//!   │     └── StateCondition: inventory / skill / position (via StateOracle)
//!   ├── ordering: total order + weighted sampling inside qualifying ties
//!   └── on select → GoalOrchestrator
//!         ├── world hop retry (exponential backoff, ±10% jitter)
//!         ├── travel (TravelProvider) supervised by movement watchdog
//!         └── Fulfilled | SkippedSuccess | Failed
//! ```
//!
//! The engine never reads the wall clock directly; the host's [`StateOracle`]
//! is the single time source, which keeps every evaluation testable.
//!
//! [`StateOracle`]: taskweave_core::StateOracle

pub mod condition;
pub mod engine;
pub mod entry;
pub mod goal;
pub mod ordering;
pub mod store;

pub use condition::logical::{Combinator, LockCondition, LogicalCondition};
pub use condition::state::StateCondition;
pub use condition::time::{
    DayOfWeekCondition, IntervalCondition, RepeatCycle, SingleTriggerCondition,
    TimeWindowCondition,
};
pub use condition::{Condition, ConditionNode, EvalContext};
pub use engine::{spawn_scheduler, SchedulerContext, SchedulerEngine, TickOutcome};
pub use entry::{StopReason, TaskEntry};
pub use goal::orchestrator::{FulfillmentOutcome, GoalOrchestrator};
pub use goal::watchdog::CancelFlag;
pub use goal::{LocationRequirement, LocationTarget, RequirementPriority};
pub use store::EntryStore;
