//! Utility functions and helpers for spotify-blend.
//!
//! # Submodules
//!
//! - `logging`: Tracing initialization and token redaction for log output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
