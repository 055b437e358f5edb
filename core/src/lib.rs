//! Judging core: runs a solution against numbered testcases under a
//! calibrated time limit and an address-space ceiling, then classifies and
//! aggregates the results.
//!
//! Unix only.

pub mod accept_code;
pub mod action;
pub mod calibrate;
pub mod cmdline;
pub mod config;
pub mod problem;
pub mod report;
pub mod testing;

pub use crate::config::Config;
