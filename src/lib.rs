pub mod analysis;
pub mod config;
pub mod constraints;
pub mod error;
pub mod history;
pub mod optimizer;
pub mod results;
pub mod simulation;
pub mod types;
pub mod warnings;
