//! udpjson Common Library
//!
//! This crate provides the shared types used by every udpjson crate:
//! configuration loading, system-wide defaults, the C-UAV protocol
//! records and the metadata record attached to tracked objects.
//!
//! Nothing in here performs I/O beyond reading a configuration file.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide defaults and limits
//! - [`cuav`] - C-UAV message identifiers, header and payload records
//! - [`meta`] - Per-object metadata record handed to the host pipeline
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use udpjson_common::prelude::*;
//!
//! let id = CuavMessageId::from(0x7111);
//! assert_eq!(id, CuavMessageId::Guidance);
//! ```

pub mod config;
pub mod consts;
pub mod cuav;
pub mod meta;
pub mod prelude;
