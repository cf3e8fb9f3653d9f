//! CLI subcommand implementations for the buildsheet binary.

pub mod doctor;
pub mod enrich_cmd;
pub mod harvest_cmd;
pub mod output;
pub mod run_cmd;
