//! Netlog Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and utilities for the net-control logbook workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`NetlogError`] and the [`Result`] alias
//! - **Logging**: tracing subscriber bootstrap driven by `LOG_*` variables
//! - **Call signs**: normalisation and validation of amateur call signs
//!
//! # Example
//!
//! ```no_run
//! use netlog_common::callsign::CallSign;
//!
//! fn lookup(raw: &str) -> netlog_common::Result<()> {
//!     let call = CallSign::parse(raw)?;
//!     tracing::info!(call_sign = %call, "Looking up licence");
//!     Ok(())
//! }
//! ```

pub mod callsign;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{NetlogError, Result};
