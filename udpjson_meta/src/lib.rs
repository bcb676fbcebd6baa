//! # udpjson Meta Library
//!
//! Asynchronous UDP JSON telemetry ingestion with a shared TTL cache and a
//! per-frame enrichment pass for tracked objects.
//!
//! # Module Structure
//!
//! - [`receiver`] - Polled UDP sockets and receive threads
//! - [`keyed`] - Generic keyed-value decoder
//! - [`cache`] - Concurrent TTL cache with overflow flush
//! - [`cuav`] - C-UAV structured decoder, observer dispatch and encoder
//! - [`enrich`] - Frame/object enrichment against the cache
//! - [`service`] - Orchestrator owning the cache and all receive loops
//! - [`config`] - TOML configuration of the service
//! - [`stats`] - Per-channel ingestion counters
//! - [`clock`] - Process monotonic clock
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          MetaService                             │
//! │  ┌──────────────┐    ┌─────────────────┐                         │
//! │  │ channel-N    │───►│ KeyedValue      │──write──┐               │
//! │  │ (receiver)   │    │ Decoder         │         ▼               │
//! │  └──────────────┘    └─────────────────┘   ┌──────────┐          │
//! │  ┌──────────────┐    ┌─────────────────┐   │ TtlCache │          │
//! │  │ cuav         │───►│ CuavDecoder     │   └────┬─────┘          │
//! │  │ (receiver)   │    │ ──► observers   │        │ read           │
//! │  └──────────────┘    └─────────────────┘        ▼                │
//! │                                           ┌──────────┐           │
//! │              host processing cycle ──────►│ Enricher │──► sink   │
//! │                                           └──────────┘           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod cuav;
pub mod enrich;
pub mod keyed;
pub mod receiver;
pub mod service;
pub mod stats;

// Re-export key types for convenience
pub use crate::cache::{CacheKey, CachedValue, TtlCache};
pub use crate::config::MetaConfig;
pub use crate::cuav::{CuavDecoder, CuavEncoder, CuavError, CuavPayload};
pub use crate::enrich::{Enricher, Frame, MetadataSink, TrackedObject};
pub use crate::keyed::{DropReason, KeyedValueDecoder};
pub use crate::receiver::{DatagramReceiver, ReceiverError, ReceiverTask};
pub use crate::service::{MetaService, ServiceError};
