//! Command-line interface module.

mod args;
pub mod build;
pub mod classify;
pub mod serve;

pub use args::{Cli, Commands, ServeArgs};
