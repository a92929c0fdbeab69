//! External tool integrations driven through the process runner.

pub mod scan;
pub mod terraform;
