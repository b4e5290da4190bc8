//! rmbench-runner - remote benchmark orchestration
//!
//! This crate provides the `rmbench` binary that provisions terraform setups,
//! runs the benchmark client against a Redis module build, validates the
//! results and tears the setups down again.

pub mod aws;
pub mod benchmark;
pub mod check;
pub mod command;
pub mod config;
pub mod env;
pub mod interrupt;
pub mod orchestrator;
pub mod publish;
pub mod remote;
pub mod setup;
pub mod terraform;
pub mod wait;
