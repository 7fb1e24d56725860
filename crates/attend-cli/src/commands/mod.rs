//! CLI subcommand implementations.

pub mod events;
pub mod export;
pub mod overrides;
pub mod participants;
pub mod report;
pub mod scan;
pub mod serve;
pub mod status;
pub mod util;
