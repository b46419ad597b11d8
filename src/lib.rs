//! taxsim - Brazilian corporate tax regime simulator
//!
//! Computes what a company would owe under Simples Nacional, Lucro Presumido
//! and Lucro Real from a single financial snapshot, stores the itemized
//! result set and compares the regimes.

pub mod cli;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod error;
pub mod tax;
pub mod utils;
