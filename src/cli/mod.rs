//! CLI command implementations
//!
//! - `decisions`: analyze and table commands
//! - `simulate`: run file replay
//! - `config`: config validation and schema commands
//! - `util`: shared argument and output helpers

pub mod config;
pub mod decisions;
pub mod simulate;
pub mod util;

pub use config::{cmd_config, cmd_schema};
pub use decisions::{cmd_analyze, cmd_table};
pub use simulate::cmd_simulate;
