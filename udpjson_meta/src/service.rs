//! Service orchestrator.
//!
//! [`MetaService`] owns the cache and every receive loop. Lifecycle:
//!
//! ```text
//! new(config) ──► start() ──► [loops running] ──► stop() / drop
//!                   │
//!                   └─ binds every socket first; spawns only if all bound
//! ```
//!
//! All loops share one running flag. Clearing it (directly, through
//! [`MetaService::running_flag`], or with [`MetaService::stop`]) makes every
//! loop exit within one poll interval; `stop` then joins them before the
//! sockets are closed.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, warn};
use udpjson_common::config::{ConfigError, Validate};

use crate::cache::TtlCache;
use crate::config::MetaConfig;
use crate::cuav::{CuavDecoder, CuavDecoderBuilder};
use crate::enrich::Enricher;
use crate::keyed::KeyedValueDecoder;
use crate::receiver::{DatagramReceiver, ReceiverError, ReceiverTask};
use crate::stats::StatsSnapshot;

/// Label of the C-UAV channel in logs and stats.
pub const CUAV_CHANNEL_LABEL: &str = "cuav";

/// Service lifecycle failure.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A channel could not be set up.
    #[error(transparent)]
    Receiver(#[from] ReceiverError),

    /// `start` called while loops are running.
    #[error("service already running")]
    AlreadyRunning,
}

/// Ingestion service: cache, generic channels and the optional C-UAV channel.
pub struct MetaService {
    config: MetaConfig,
    cache: Arc<TtlCache>,
    keyed: Arc<KeyedValueDecoder>,
    cuav: Arc<CuavDecoder>,
    running: Arc<AtomicBool>,
    tasks: Vec<ReceiverTask>,
    local_addrs: Vec<(String, SocketAddr)>,
}

impl MetaService {
    /// Create a stopped service.
    ///
    /// # Errors
    /// Returns `ServiceError::Config` if the configuration fails validation.
    pub fn new(config: MetaConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let cache = Arc::new(TtlCache::new(config.cache.ttl_ms, config.cache.max_size));
        let keyed = Arc::new(KeyedValueDecoder::new(&config.decoder));
        let cuav = Arc::new(CuavDecoder::builder().debug(config.cuav.debug).build());

        info!(
            "MetaService '{}' created: {} generic channel(s), cuav={}, ttl={}ms, max_size={}",
            config.shared.service_name,
            config.effective_channels().len(),
            config.cuav.enabled,
            config.cache.ttl_ms,
            config.cache.max_size
        );

        Ok(Self {
            config,
            cache,
            keyed,
            cuav,
            running: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
            local_addrs: Vec::new(),
        })
    }

    /// Install C-UAV observers. Takes effect on the next `start`.
    ///
    /// The debug toggle comes from the configuration.
    pub fn with_cuav_observers(mut self, builder: CuavDecoderBuilder) -> Self {
        self.cuav = Arc::new(builder.debug(self.config.cuav.debug).build());
        self
    }

    /// Bind every channel, then start one receive loop per channel.
    ///
    /// Loops left behind by a running flag cleared elsewhere (a signal
    /// handler) are joined first, so the service can be restarted without an
    /// explicit `stop`.
    ///
    /// # Errors
    /// A channel setup failure closes every socket bound so far and is
    /// returned; no loop is left running. Returns `AlreadyRunning` while the
    /// flag is still set.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if !self.tasks.is_empty() {
            if self.running.load(Ordering::SeqCst) {
                return Err(ServiceError::AlreadyRunning);
            }
            self.stop();
        }

        let mut generic = Vec::new();
        for (idx, channel) in self.config.effective_channels().iter().enumerate() {
            generic.push(DatagramReceiver::bind(format!("channel-{idx}"), channel)?);
        }
        let cuav = if self.config.cuav.enabled {
            Some(DatagramReceiver::bind(
                CUAV_CHANNEL_LABEL,
                &self.config.cuav.channel(),
            )?)
        } else {
            None
        };

        self.local_addrs = generic
            .iter()
            .chain(cuav.iter())
            .filter_map(|rx| rx.local_addr().ok().map(|addr| (rx.label().to_string(), addr)))
            .collect();

        self.running.store(true, Ordering::SeqCst);

        for receiver in generic {
            let cache = Arc::clone(&self.cache);
            let keyed = Arc::clone(&self.keyed);
            let task = receiver.spawn(Arc::clone(&self.running), move |data| {
                keyed.apply(data, &cache)
            });
            self.push_task(task)?;
        }
        if let Some(receiver) = cuav {
            let decoder = Arc::clone(&self.cuav);
            let task = receiver.spawn(Arc::clone(&self.running), move |data| {
                decoder.parse(data).is_ok()
            });
            self.push_task(task)?;
        }

        info!("MetaService started with {} receive loop(s)", self.tasks.len());
        Ok(())
    }

    fn push_task(&mut self, task: Result<ReceiverTask, ReceiverError>) -> Result<(), ServiceError> {
        match task {
            Ok(task) => {
                self.tasks.push(task);
                Ok(())
            }
            Err(e) => {
                warn!("Aborting start: {}", e);
                self.stop();
                Err(e.into())
            }
        }
    }

    /// Clear the running flag and join every loop. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if self.tasks.is_empty() {
            return;
        }

        for mut task in self.tasks.drain(..) {
            task.join();
            info!("{} stopped: {}", task.label(), task.stats());
        }
        self.local_addrs.clear();
        info!("MetaService stopped");
    }

    /// True while loops are running and the flag is set.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.tasks.is_empty()
    }

    /// Shared running flag, for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// Enricher reading the shared cache with the configured metadata key.
    pub fn enricher(&self) -> Enricher {
        Enricher::new(
            Arc::clone(&self.cache),
            self.config.meta_key(),
            self.config.enrich.lock_timeout(),
        )
    }

    /// Change the TTL; applies from the next lookup.
    pub fn set_cache_ttl_ms(&self, ttl_ms: u64) {
        self.cache.set_ttl_ms(ttl_ms);
    }

    /// Change the capacity; applies from the next insert.
    pub fn set_max_cache_size(&self, max_size: usize) {
        self.cache.set_max_size(max_size);
    }

    /// Bound address of each channel while running.
    pub fn local_addrs(&self) -> &[(String, SocketAddr)] {
        &self.local_addrs
    }

    /// Counters of each running channel.
    pub fn channel_stats(&self) -> Vec<(String, StatsSnapshot)> {
        self.tasks
            .iter()
            .map(|task| (task.label().to_string(), task.stats()))
            .collect()
    }

    /// Configuration the service was created with.
    pub fn config(&self) -> &MetaConfig {
        &self.config
    }
}

impl Drop for MetaService {
    fn drop(&mut self) {
        self.stop();
    }
}
