#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Flux Engine
//!
//! The orchestrator that ties the workflow and execution data models to
//! running code: the session registry tracking live executions, the
//! scheduler dispatching nodes and propagating their data, the UI
//! interaction bridge suspending and resuming interactive nodes, and the
//! facade that exposes all of it as one entry point (§4, §6).
//!
//! - [`SessionRegistry`] / [`ExecutionSession`] — the one-live-execution-per-workflow registry (§4.2)
//! - [`propagator`] — builds a node's input document from its predecessors (§4.3)
//! - [`Scheduler`] — admits, runs, and finalizes nodes (§4.4)
//! - [`InteractionBridge`] — suspends and resumes interactive nodes (§4.5)
//! - [`EngineFacade`] — the public operation surface (§4.6, §6)
//! - [`EngineConfig`] — process-wide tuning (§10)

pub mod config;
pub mod facade;
pub mod interaction;
pub mod propagator;
pub mod scheduler;
pub mod session;

pub use config::EngineConfig;
pub use facade::{EngineFacade, ExecutionStatistics, FacadeError};
pub use interaction::{InteractionBridge, InteractionError, InteractionStatus, UiInteraction};
pub use scheduler::{Scheduler, SchedulerError};
pub use session::{ExecutionSession, SessionRegistry};
