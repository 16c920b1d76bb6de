//! Core domain models for provisioning
//!
//! This module defines environments, packages, planned commands and the
//! state of a provisioning run, plus the pure planning logic that ties them
//! together.

pub mod command;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod package;
pub mod planner;
pub mod state;

pub use command::*;
pub use environment::*;
pub use error::*;
pub use interpreter::*;
pub use package::*;
pub use planner::*;
pub use state::*;
