//! Subcommand implementations

pub mod analyze;
pub mod configure;
pub mod status;
pub mod topology;
