//! Command implementations.

mod check;
mod run;
mod setup;

pub use check::run_check;
pub use run::run_bridge;
