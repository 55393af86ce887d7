//! Scenario runner for the DLMM settlement engine.
//!
//! Loads a TOML scenario, replays it against an in-memory store and balance
//! ledger, and reports each step's settlement plus a final conservation check.

pub mod runner;
pub mod scenario;

pub use runner::{ConservationReport, Outcome, RunReport, Runner, StepReport};
pub use scenario::{Action, Scenario, Step};
