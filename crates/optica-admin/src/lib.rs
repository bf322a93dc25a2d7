//! Admin script library behind the `optica-admin` binary.

pub mod cli;
pub mod commands;
