//! # Core Runtime Module
//!
//! Provides the runtime infrastructure shared by the audio file crates:
//! - Logging and tracing setup
//! - Runtime error types
//!
//! ## Overview
//!
//! Library crates only emit `tracing` events; binaries, demos and tests call
//! [`logging::init_logging`] once to decide where those events go.

pub mod error;
pub mod logging;

pub use error::{Error, Result};
