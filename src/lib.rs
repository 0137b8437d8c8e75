pub mod config;
pub mod foreach;
pub mod git;
pub mod model;
pub mod pool;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod shell;
pub mod shell_exec;
pub mod styling;
pub mod subcommand;
pub mod sync;
pub mod utils;

#[cfg(test)]
mod testing;
