// Command implementations for the `pw` binary.

pub mod audit;
pub mod plan;
pub mod replay;
pub mod secret;
pub mod serve;
