pub mod answers;
pub mod assistant;
pub mod commit_message;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod git;
pub mod paths;
pub mod policy;
pub mod prepush;
pub mod push_flow;
pub mod recorder;
pub mod registry;
pub mod remediation;
pub mod ui;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use context::Context;
pub use error::{Result, ShipitError};
