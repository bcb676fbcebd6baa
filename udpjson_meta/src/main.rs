//! # udpjson Meta Daemon
//!
//! Standalone ingestion service: receives keyed values into the TTL cache and
//! optionally decodes the C-UAV feed, logging every decoded message.
//!
//! # Usage
//!
//! ```bash
//! # Defaults (239.255.0.1:6000, no C-UAV)
//! udpjson_meta
//!
//! # Config file with CLI overrides
//! udpjson_meta --config /etc/udpjson/meta.toml --iface eth0 --ttl-ms 500
//!
//! # C-UAV feed with record logging, JSON logs
//! udpjson_meta --cuav --cuav-debug --json
//! ```

use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;
use udpjson_common::config::{ConfigLoader, LogLevel};
use udpjson_meta::config::{ChannelConfig, MetaConfig};
use udpjson_meta::cuav::CuavDecoder;
use udpjson_meta::service::MetaService;

/// udpjson Meta - UDP JSON telemetry ingestion daemon
#[derive(Parser, Debug)]
#[command(name = "udpjson_meta")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "UDP JSON telemetry ingestion with TTL cache and C-UAV decoding")]
#[command(long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// UDP port of the generic channel (replaces configured channels' port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Multicast group of the generic channel
    #[arg(long, value_name = "IP")]
    multicast_ip: Option<Ipv4Addr>,

    /// Network interface for every channel
    #[arg(long)]
    iface: Option<String>,

    /// Cache TTL in milliseconds (0 disables expiry)
    #[arg(long)]
    ttl_ms: Option<u64>,

    /// Maximum cache entries (0 = unbounded)
    #[arg(long)]
    max_cache_size: Option<usize>,

    /// Enable the C-UAV channel
    #[arg(long)]
    cuav: bool,

    /// UDP port of the C-UAV channel
    #[arg(long)]
    cuav_port: Option<u16>,

    /// Log every decoded C-UAV record
    #[arg(long)]
    cuav_debug: bool,

    /// Seconds between stats log lines (0 disables)
    #[arg(long, default_value_t = 10)]
    stats_interval: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("udpjson_meta startup failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match MetaConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                // No config yet: report at the default level.
                setup_tracing(&args, LogLevel::default());
                return Err(format!("{}: {}", path.display(), e).into());
            }
        },
        None => MetaConfig::default(),
    };
    let config = apply_overrides(config, &args);

    setup_tracing(&args, config.shared.log_level);

    info!(
        "{} (udpjson Meta v{}) starting...",
        config.shared.service_name,
        env!("CARGO_PKG_VERSION")
    );
    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    let mut service = MetaService::new(config)?.with_cuav_observers(
        CuavDecoder::builder()
            .on_guidance(|header, g| {
                info!(
                    "Guidance #{}: tar_id={} category={} range={:.2} bearing={:.2} elevation={:.2}",
                    header.msg_sn,
                    g.tar_id,
                    g.category(),
                    g.enu_r,
                    g.enu_a,
                    g.enu_e
                );
            })
            .on_eo_system(|header, p| {
                info!(
                    "EO system #{}: sv_stat={} pointing h={:.2} v={:.2}",
                    header.msg_sn, p.sv_stat, p.st_loc_h, p.st_loc_v
                );
            })
            .on_servo(|header, s| {
                info!(
                    "Servo control #{}: mode h={} v={} position h={:.2} v={:.2}",
                    header.msg_sn, s.mode_h, s.mode_v, s.loc_h, s.loc_v
                );
            })
            .on_raw(|header, specific| {
                info!(
                    "C-UAV {} ({} fields) type={} sn={}",
                    header.message_id(),
                    specific.len(),
                    header.message_type(),
                    header.msg_sn
                );
            }),
    );

    let running = service.running_flag();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        running.store(false, Ordering::SeqCst);
    })?;

    service.start()?;

    let running = service.running_flag();
    let stats_interval = Duration::from_secs(args.stats_interval);
    let mut last_stats = Instant::now();
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if !stats_interval.is_zero() && last_stats.elapsed() >= stats_interval {
            last_stats = Instant::now();
            info!(
                "Cache: {} entries, {} overflow flushes",
                service.cache().len(),
                service.cache().flush_count()
            );
            for (label, stats) in service.channel_stats() {
                info!("  {}: {}", label, stats);
            }
        }
    }

    service.stop();
    info!("udpjson Meta shutdown complete");
    Ok(())
}

/// Apply CLI overrides on top of the loaded configuration.
fn apply_overrides(mut config: MetaConfig, args: &Args) -> MetaConfig {
    if args.port.is_some() || args.multicast_ip.is_some() {
        let mut channels = config.effective_channels();
        for channel in &mut channels {
            if let Some(port) = args.port {
                channel.port = port;
            }
            if let Some(group) = args.multicast_ip {
                channel.multicast_ip = Some(group);
            }
        }
        // A single port override collapses multiple channels into one.
        if args.port.is_some() {
            channels.truncate(1);
        }
        config.channels = channels;
    }

    if let Some(iface) = &args.iface {
        if config.channels.is_empty() {
            config.channels.push(ChannelConfig::default());
        }
        for channel in &mut config.channels {
            channel.iface = Some(iface.clone());
        }
        config.cuav.iface = Some(iface.clone());
    }

    if let Some(ttl_ms) = args.ttl_ms {
        config.cache.ttl_ms = ttl_ms;
    }
    if let Some(max_size) = args.max_cache_size {
        config.cache.max_size = max_size;
    }

    if args.cuav {
        config.cuav.enabled = true;
    }
    if let Some(port) = args.cuav_port {
        config.cuav.port = port;
    }
    if args.cuav_debug {
        config.cuav.debug = true;
    }
    if args.verbose {
        config.shared.log_level = LogLevel::Debug;
    }
    config
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args, log_level: LogLevel) {
    let filter = if args.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level.as_directive()))
    };

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
