//! Drift reconciliation and orchestrated teardown for the RAG application's
//! AWS footprint.
//!
//! Two binaries sit on top of this library: `cleanup` (check / clean / all)
//! and `reconcile` (import orphans back into Terraform state).

pub mod cli;
pub mod cloud;
pub mod commands;
pub mod config;
pub mod context;
pub mod declared_state;
pub mod discovery;
pub mod drift;
pub mod error;
pub mod handlers;
pub mod iac;
pub mod import_executor;
pub mod output;
pub mod planner;
pub mod resolver;
pub mod resource;
pub mod retry;
pub mod safety;
pub mod session;
pub mod teardown;
pub mod traits;

#[cfg(test)]
mod test_helpers;
