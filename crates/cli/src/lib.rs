//! Command definitions and execution for the annotator CLI.
pub mod commands;
