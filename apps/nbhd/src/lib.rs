//! # nbhd
//!
//! Library half of the nbhd binary: the CLI definition, command
//! implementations, and configuration loading. `main.rs` only wires up
//! logging and calls [`cli::execute`].

pub mod cli;
pub mod config;
