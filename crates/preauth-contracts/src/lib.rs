//! # preauth-contracts
//!
//! Shared types, progress records, and error contracts for the PREAUTH
//! prior authorization pipeline.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, small conversions, and error types.

pub mod decision;
pub mod error;
pub mod outputs;
pub mod progress;
pub mod request;
pub mod stage;
pub mod tool;
