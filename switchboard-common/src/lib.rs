//! Common utilities shared across Switchboard crates.
//!
//! This crate only carries the pieces every binary and integration test
//! needs before the UI exists: the centralised tracing setup. It is kept
//! dependency-light so the core crate and the config loader can both use it
//! without pulling in the terminal stack.
//!
//! # Examples
//!
//! ```rust
//! use switchboard_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.app_name, "switchboard");
//! ```
pub mod observability;

pub use observability::{init_logging, LogConfig, LogFormat};
