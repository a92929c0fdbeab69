//! Harness core: subprocess execution, tool-state bootstrap, structural
//! assertions, configuration, and the check suite.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod output;
pub mod process;
pub mod structure;
pub mod suite;
