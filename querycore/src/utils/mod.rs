//! Utilities for querycore: settings, errors and small helpers.

pub mod config;
pub mod error;
pub mod io;
pub mod sync;
pub mod time;
