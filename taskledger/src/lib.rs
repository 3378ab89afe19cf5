//! Optimistic client for tasks and categories stored on a
//! gas-priced remote ledger.

pub mod config;
pub mod ledger;
pub mod orchestrator;
pub mod tracker;
pub mod views;
