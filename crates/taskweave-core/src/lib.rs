//! # Taskweave Core
//!
//! Shared foundation for the Taskweave automation scheduler: world coordinate
//! types, the narrow collaborator traits the engine consumes (position/state
//! oracle, travel, world relocation), the error taxonomy, and configuration.
//!
//! The scheduler itself lives in `taskweave-scheduler`; this crate exists so
//! hosts can implement the collaborator traits without pulling in the engine.

pub mod config;
pub mod error;
pub mod oracle;
pub mod types;

pub use config::SchedulerConfig;
pub use error::{Result, TaskweaveError};
pub use oracle::{StateOracle, TravelProvider, WorldHopper};
pub use types::{Skill, WorldPoint};
