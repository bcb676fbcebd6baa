//! # udpjson Send
//!
//! Test-traffic generator for both message families.
//!
//! # Usage
//!
//! ```bash
//! # Keyed value to the default generic group
//! udpjson_send keyed --object-id 42 --source-id 3 --value 7.5
//!
//! # Ten guidance messages, 200 ms apart, to a unicast receiver
//! udpjson_send --dest 127.0.0.1 --count 10 --interval-ms 200 guidance --tar-id 7 --range 1500
//!
//! # Arbitrary C-UAV payload
//! udpjson_send raw --msg-id 0x7101 --specific '{"cmd_id": 4}'
//! ```

use clap::{Parser, Subcommand};
use serde_json::{Map, Value, json};
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};
use std::time::Duration;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;
use udpjson_common::consts::{
    DEFAULT_CUAV_MULTICAST_IP, DEFAULT_CUAV_PORT, DEFAULT_MULTICAST_IP, DEFAULT_PORT,
};
use udpjson_common::cuav::{CommonHeader, CuavMessageId, GuidanceInfo, MessageType, ServoControl};
use udpjson_meta::cuav::CuavEncoder;

/// udpjson Send - test traffic for udpjson receivers
#[derive(Parser, Debug)]
#[command(name = "udpjson_send")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Send keyed-value or C-UAV test datagrams")]
struct Args {
    /// Destination address (defaults to the family's multicast group)
    #[arg(short, long, global = true, value_name = "IP")]
    dest: Option<Ipv4Addr>,

    /// Destination port (defaults to the family's port)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Multicast TTL
    #[arg(long, global = true, default_value_t = 1)]
    ttl: u32,

    /// Number of datagrams to send
    #[arg(short = 'n', long, global = true, default_value_t = 1)]
    count: u32,

    /// Pause between datagrams in milliseconds
    #[arg(long, global = true, default_value_t = 100)]
    interval_ms: u64,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generic keyed value
    Keyed {
        /// Object id
        #[arg(long)]
        object_id: u64,
        /// Source id
        #[arg(long, default_value_t = 0)]
        source_id: u32,
        /// Value; parsed as JSON when possible, sent as a string otherwise
        #[arg(long)]
        value: String,
        /// Member name of the object id
        #[arg(long, default_value = "object_id")]
        object_id_key: String,
        /// Member name of the source id
        #[arg(long, default_value = "source_id")]
        source_id_key: String,
        /// Member name of the value
        #[arg(long, default_value = "value")]
        value_key: String,
    },

    /// C-UAV guidance (0x7111)
    Guidance {
        /// Guidance batch number
        #[arg(long, default_value_t = 1)]
        tar_id: u32,
        /// Target category
        #[arg(long, default_value_t = 9)]
        category: u16,
        /// Range (m)
        #[arg(long, default_value_t = 1000.0)]
        range: f64,
        /// Bearing (deg)
        #[arg(long, default_value_t = 0.0)]
        bearing: f64,
        /// Elevation (deg)
        #[arg(long, default_value_t = 0.0)]
        elevation: f64,
        /// Latitude (deg)
        #[arg(long, default_value_t = 0.0)]
        lat: f64,
        /// Longitude (deg)
        #[arg(long, default_value_t = 0.0)]
        lon: f64,
        /// Altitude (m)
        #[arg(long, default_value_t = 0.0)]
        alt: f64,
        /// Bearing step added per repeated message (deg)
        #[arg(long, default_value_t = 0.0)]
        sweep: f64,
        /// Wrap the payload in the multi-item envelope
        #[arg(long)]
        envelope: bool,
    },

    /// C-UAV EO servo control (0x7204)
    Servo {
        /// Device: 0 visible, 1 infrared, 2 both
        #[arg(long, default_value_t = 0)]
        dev_id: u8,
        /// Horizontal mode: 0 manual, 1 tracking
        #[arg(long, default_value_t = 0)]
        mode_h: u8,
        /// Vertical mode: 0 manual, 1 tracking
        #[arg(long, default_value_t = 0)]
        mode_v: u8,
        /// Horizontal speed [1, 200]
        #[arg(long, default_value_t = 1)]
        speed_h: u8,
        /// Vertical speed [1, 200]
        #[arg(long, default_value_t = 1)]
        speed_v: u8,
        /// Horizontal position (deg)
        #[arg(long, default_value_t = 0.0)]
        loc_h: f32,
        /// Vertical position (deg)
        #[arg(long, default_value_t = 0.0)]
        loc_v: f32,
    },

    /// C-UAV message with an arbitrary payload
    Raw {
        /// Message id (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_u16)]
        msg_id: u16,
        /// Message type
        #[arg(long, default_value_t = 3)]
        msg_type: u8,
        /// Payload object as JSON
        #[arg(long, default_value = "{}")]
        specific: String,
    },
}

fn parse_u16(text: &str) -> Result<u16, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid message id '{text}': {e}"))
}

fn main() {
    let args = Args::parse();
    setup_tracing(args.verbose);

    if let Err(e) = run(&args) {
        error!("udpjson_send failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let (default_ip, default_port) = match args.command {
        Command::Keyed { .. } => (DEFAULT_MULTICAST_IP, DEFAULT_PORT),
        _ => (DEFAULT_CUAV_MULTICAST_IP, DEFAULT_CUAV_PORT),
    };
    let dest = SocketAddrV4::new(
        args.dest.unwrap_or(default_ip),
        args.port.unwrap_or(default_port),
    );

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    if dest.ip().is_multicast() {
        socket.set_multicast_ttl_v4(args.ttl)?;
    }

    let mut encoder = CuavEncoder::new(CommonHeader {
        tx_sys_id: 999,
        tx_dev_type: 1,
        tx_dev_id: 999,
        tx_subdev_id: 999,
        rx_sys_id: 999,
        rx_dev_type: 999,
        rx_dev_id: 999,
        rx_subdev_id: 999,
        ..Default::default()
    });

    info!("Sending {} datagram(s) to {}", args.count, dest);
    for i in 0..args.count {
        let datagram = build(&args.command, &mut encoder, i)?;
        let sent = socket.send_to(&datagram, dest)?;
        debug!("#{} sent {} bytes: {}", i, sent, String::from_utf8_lossy(&datagram));

        if i + 1 < args.count {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }
    info!("Done");
    Ok(())
}

/// Encode the `index`-th datagram of the run.
fn build(
    command: &Command,
    encoder: &mut CuavEncoder,
    index: u32,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let datagram = match command {
        Command::Keyed {
            object_id,
            source_id,
            value,
            object_id_key,
            source_id_key,
            value_key,
        } => {
            let value = serde_json::from_str::<Value>(value).unwrap_or_else(|_| json!(value));
            let mut root = Map::new();
            root.insert(object_id_key.clone(), json!(object_id));
            root.insert(source_id_key.clone(), json!(source_id));
            root.insert(value_key.clone(), value);
            serde_json::to_vec(&root)?
        }
        Command::Guidance {
            tar_id,
            category,
            range,
            bearing,
            elevation,
            lat,
            lon,
            alt,
            sweep,
            envelope,
        } => {
            let guidance = GuidanceInfo {
                tar_id: *tar_id,
                tar_category: *category,
                guid_stat: 1,
                enu_r: *range,
                enu_a: (bearing + sweep * f64::from(index)).rem_euclid(360.0),
                enu_e: *elevation,
                lat: *lat,
                lon: *lon,
                alt: *alt,
                ..Default::default()
            };
            if *envelope {
                encoder.encode_many(CuavMessageId::Guidance, MessageType::Stream, 1, &[guidance])?
            } else {
                encoder.guidance(&guidance)?
            }
        }
        Command::Servo {
            dev_id,
            mode_h,
            mode_v,
            speed_h,
            speed_v,
            loc_h,
            loc_v,
        } => encoder.servo(&ServoControl {
            dev_id: *dev_id,
            dev_en: 1,
            ctrl_en: 1,
            mode_h: *mode_h,
            mode_v: *mode_v,
            speed_en_h: 1,
            speed_h: *speed_h,
            speed_en_v: 1,
            speed_v: *speed_v,
            loc_en_h: 1,
            loc_h: *loc_h,
            loc_en_v: 1,
            loc_v: *loc_v,
            ..Default::default()
        })?,
        Command::Raw {
            msg_id,
            msg_type,
            specific,
        } => {
            let specific: Value = serde_json::from_str(specific)?;
            if !specific.is_object() {
                return Err("--specific must be a JSON object".into());
            }
            encoder.encode_raw(*msg_id, *msg_type, specific)?
        }
    };
    Ok(datagram)
}

fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
