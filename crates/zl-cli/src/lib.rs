//! zelland CLI library
//!
//! Command implementations and output helpers for the `zelland` binary.

pub mod commands;
pub mod context;
pub mod output;
