//! Configuration of the ingestion service.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "udpjson-meta"
//!
//! [[channels]]
//! multicast_ip = "239.255.0.1"   # "" for unicast/broadcast only
//! port = 6000
//! iface = "eth0"
//! recv_buf_size = 1048576
//!
//! [decoder]
//! object_id_key = "object_id"
//! source_id_key = "source_id"
//! value_key = "value"
//!
//! [cache]
//! ttl_ms = 1000
//! max_size = 2048
//!
//! [cuav]
//! enabled = true
//! port = 8003
//! debug = false
//!
//! [enrich]
//! meta_key = "speed"
//! lock_timeout_ms = 5
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::Duration;
use udpjson_common::config::{ConfigError, SharedConfig, Validate};
use udpjson_common::consts::{
    DEFAULT_CACHE_TTL_MS, DEFAULT_CUAV_MULTICAST_IP, DEFAULT_CUAV_PORT, DEFAULT_LOCK_TIMEOUT_MS,
    DEFAULT_MAX_CACHE_SIZE, DEFAULT_MULTICAST_IP, DEFAULT_OBJECT_ID_KEY, DEFAULT_PORT,
    DEFAULT_SOURCE_ID_KEY, DEFAULT_VALUE_KEY, MAX_IFACE_NAME_LEN,
};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// Shared settings.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Generic keyed-value channels. Empty means one default channel.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,

    /// Member names for the keyed-value decoder.
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Cache bounds.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Structured C-UAV feed.
    #[serde(default)]
    pub cuav: CuavConfig,

    /// Enrichment pass settings.
    #[serde(default)]
    pub enrich: EnrichConfig,
}

/// One receive socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    /// Multicast group to join. `None` receives unicast/broadcast only.
    ///
    /// In TOML an empty string (or `"none"`) means no group.
    #[serde(default = "default_multicast_ip", with = "multicast_group")]
    pub multicast_ip: Option<Ipv4Addr>,

    /// UDP port. 0 lets the OS pick one.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Network interface to bind to and join the group on.
    #[serde(default)]
    pub iface: Option<String>,

    /// `SO_RCVBUF` in bytes. 0 keeps the OS default.
    #[serde(default)]
    pub recv_buf_size: u32,
}

/// `Option<Ipv4Addr>` as a TOML string, `""` standing for `None`.
mod multicast_group {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use std::net::Ipv4Addr;

    pub fn serialize<S: Serializer>(group: &Option<Ipv4Addr>, s: S) -> Result<S::Ok, S::Error> {
        match group {
            Some(ip) => s.serialize_str(&ip.to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Ipv4Addr>, D::Error> {
        let text = String::deserialize(d)?;
        let text = text.trim();
        if text.is_empty() || text.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        text.parse().map(Some).map_err(de::Error::custom)
    }
}

fn default_multicast_ip() -> Option<Ipv4Addr> {
    Some(DEFAULT_MULTICAST_IP)
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            multicast_ip: default_multicast_ip(),
            port: default_port(),
            iface: None,
            recv_buf_size: 0,
        }
    }
}

impl ChannelConfig {
    /// Plain unicast channel on `port`, any interface.
    pub fn unicast(port: u16) -> Self {
        Self {
            multicast_ip: None,
            port,
            iface: None,
            recv_buf_size: 0,
        }
    }

    fn validate(&self, label: &str) -> Result<(), ConfigError> {
        if let Some(group) = self.multicast_ip {
            if !group.is_multicast() {
                return Err(ConfigError::ValidationError(format!(
                    "{label}: {group} is not a multicast address"
                )));
            }
        }
        if let Some(iface) = &self.iface {
            if iface.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "{label}: iface cannot be empty"
                )));
            }
            if iface.len() > MAX_IFACE_NAME_LEN {
                return Err(ConfigError::ValidationError(format!(
                    "{label}: iface '{iface}' longer than {MAX_IFACE_NAME_LEN} bytes"
                )));
            }
        }
        if i32::try_from(self.recv_buf_size).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "{label}: recv_buf_size {} exceeds i32::MAX",
                self.recv_buf_size
            )));
        }
        Ok(())
    }
}

/// JSON member names read by the keyed-value decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    /// Member holding the tracked object id.
    #[serde(default = "default_object_id_key")]
    pub object_id_key: String,
    /// Member holding the source id.
    #[serde(default = "default_source_id_key")]
    pub source_id_key: String,
    /// Member holding the value.
    #[serde(default = "default_value_key")]
    pub value_key: String,
}

fn default_object_id_key() -> String {
    DEFAULT_OBJECT_ID_KEY.to_string()
}

fn default_source_id_key() -> String {
    DEFAULT_SOURCE_ID_KEY.to_string()
}

fn default_value_key() -> String {
    DEFAULT_VALUE_KEY.to_string()
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            object_id_key: default_object_id_key(),
            source_id_key: default_source_id_key(),
            value_key: default_value_key(),
        }
    }
}

/// Cache bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Freshness bound in milliseconds; 0 disables expiry.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    /// Maximum number of entries; 0 means unbounded.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}

fn default_max_size() -> usize {
    DEFAULT_MAX_CACHE_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            max_size: default_max_size(),
        }
    }
}

/// Structured C-UAV channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CuavConfig {
    /// Start the C-UAV receiver.
    #[serde(default)]
    pub enabled: bool,

    /// Multicast group to join. Empty string in TOML means no group.
    #[serde(default = "default_cuav_multicast_ip", with = "multicast_group")]
    pub multicast_ip: Option<Ipv4Addr>,

    /// UDP port.
    #[serde(default = "default_cuav_port")]
    pub port: u16,

    /// Network interface to bind to.
    #[serde(default)]
    pub iface: Option<String>,

    /// `SO_RCVBUF` in bytes. 0 keeps the OS default.
    #[serde(default)]
    pub recv_buf_size: u32,

    /// Log every decoded typed record.
    #[serde(default)]
    pub debug: bool,
}

fn default_cuav_multicast_ip() -> Option<Ipv4Addr> {
    Some(DEFAULT_CUAV_MULTICAST_IP)
}

fn default_cuav_port() -> u16 {
    DEFAULT_CUAV_PORT
}

impl Default for CuavConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            multicast_ip: default_cuav_multicast_ip(),
            port: default_cuav_port(),
            iface: None,
            recv_buf_size: 0,
            debug: false,
        }
    }
}

impl CuavConfig {
    /// Socket settings of the C-UAV channel.
    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            multicast_ip: self.multicast_ip,
            port: self.port,
            iface: self.iface.clone(),
            recv_buf_size: self.recv_buf_size,
        }
    }
}

/// Enrichment pass settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnrichConfig {
    /// Name stored with each attached value. Defaults to the decoder value key.
    #[serde(default)]
    pub meta_key: Option<String>,

    /// Upper bound on waiting for shared cache access per frame.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            meta_key: None,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl EnrichConfig {
    /// Shared-lock wait bound as a `Duration`.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

impl MetaConfig {
    /// Generic channels, falling back to one default channel.
    pub fn effective_channels(&self) -> Vec<ChannelConfig> {
        if self.channels.is_empty() {
            vec![ChannelConfig::default()]
        } else {
            self.channels.clone()
        }
    }

    /// Metadata key attached by the enrichment pass.
    pub fn meta_key(&self) -> &str {
        self.enrich
            .meta_key
            .as_deref()
            .unwrap_or(&self.decoder.value_key)
    }
}

impl Validate for MetaConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        for (name, value) in [
            ("decoder.object_id_key", &self.decoder.object_id_key),
            ("decoder.source_id_key", &self.decoder.source_id_key),
            ("decoder.value_key", &self.decoder.value_key),
        ] {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!("{name} cannot be empty")));
            }
        }
        if self.enrich.meta_key.as_deref() == Some("") {
            return Err(ConfigError::ValidationError(
                "enrich.meta_key cannot be empty".to_string(),
            ));
        }
        if self.enrich.lock_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "enrich.lock_timeout_ms must be > 0".to_string(),
            ));
        }

        let channels = self.effective_channels();
        let mut ports = HashSet::new();
        for (idx, channel) in channels.iter().enumerate() {
            channel.validate(&format!("channels[{idx}]"))?;
            if channel.port != 0 && !ports.insert(channel.port) {
                return Err(ConfigError::ValidationError(format!(
                    "channels[{idx}]: duplicate port {}",
                    channel.port
                )));
            }
        }

        if self.cuav.enabled {
            self.cuav.channel().validate("cuav")?;
            if self.cuav.port != 0 && ports.contains(&self.cuav.port) {
                return Err(ConfigError::ValidationError(format!(
                    "cuav: port {} already used by a generic channel",
                    self.cuav.port
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use udpjson_common::config::ConfigLoader;

    #[test]
    fn empty_document_uses_defaults() {
        let config = MetaConfig::from_toml_str("").unwrap();
        assert!(config.validate().is_ok());

        let channels = config.effective_channels();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].port, DEFAULT_PORT);
        assert_eq!(channels[0].multicast_ip, Some(DEFAULT_MULTICAST_IP));

        assert_eq!(config.decoder.object_id_key, "object_id");
        assert_eq!(config.cache.ttl_ms, 1000);
        assert_eq!(config.cache.max_size, 2048);
        assert!(!config.cuav.enabled);
        assert_eq!(config.cuav.port, 8003);
        assert_eq!(config.meta_key(), "value");
        assert_eq!(config.enrich.lock_timeout(), Duration::from_millis(5));
    }

    #[test]
    fn full_document_parses() {
        let config = MetaConfig::from_toml_str(
            r#"
[shared]
log_level = "debug"
service_name = "edge-01"

[[channels]]
multicast_ip = "239.1.2.3"
port = 7000
iface = "eth0"
recv_buf_size = 65536

[[channels]]
port = 7001

[decoder]
object_id_key = "oid"
value_key = "speed"

[cache]
ttl_ms = 0
max_size = 0

[cuav]
enabled = true
port = 9000
debug = true

[enrich]
meta_key = "velocity"
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].iface.as_deref(), Some("eth0"));
        assert_eq!(config.channels[1].multicast_ip, Some(DEFAULT_MULTICAST_IP));
        assert_eq!(config.decoder.source_id_key, "source_id");
        assert_eq!(config.cache.ttl_ms, 0);
        assert!(config.cuav.debug);
        assert_eq!(config.meta_key(), "velocity");
    }

    #[test]
    fn empty_group_means_no_join() {
        let config = MetaConfig::from_toml_str(
            r#"
[[channels]]
multicast_ip = ""
port = 7000

[[channels]]
multicast_ip = "none"
port = 7001

[cuav]
enabled = true
multicast_ip = ""
"#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels[0].multicast_ip, None);
        assert_eq!(config.channels[1].multicast_ip, None);
        assert_eq!(config.cuav.channel().multicast_ip, None);

        // Absent key still joins the default group.
        let config = MetaConfig::from_toml_str("[[channels]]\nport = 7000\n").unwrap();
        assert_eq!(config.channels[0].multicast_ip, Some(DEFAULT_MULTICAST_IP));

        assert!(MetaConfig::from_toml_str("[[channels]]\nmulticast_ip = \"239.1\"\n").is_err());
    }

    #[test]
    fn unicast_channel_survives_toml_round_trip() {
        let config = MetaConfig {
            channels: vec![ChannelConfig::unicast(6100)],
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        let parsed = MetaConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.channels, config.channels);
    }

    #[test]
    fn rejects_unicast_group() {
        let config = MetaConfig {
            channels: vec![ChannelConfig {
                multicast_ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_long_iface() {
        let config = MetaConfig {
            channels: vec![ChannelConfig {
                iface: Some("a-very-long-interface-name".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_recv_buffer() {
        let config = MetaConfig {
            channels: vec![ChannelConfig {
                recv_buf_size: u32::MAX,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_ports() {
        let config = MetaConfig {
            channels: vec![ChannelConfig::unicast(7000), ChannelConfig::unicast(7000)],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let ephemeral = MetaConfig {
            channels: vec![ChannelConfig::unicast(0), ChannelConfig::unicast(0)],
            ..Default::default()
        };
        assert!(ephemeral.validate().is_ok());
    }

    #[test]
    fn rejects_cuav_port_collision() {
        let mut config = MetaConfig {
            channels: vec![ChannelConfig::unicast(8003)],
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.cuav.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_member_names_and_zero_timeout() {
        let mut config = MetaConfig::default();
        config.decoder.value_key.clear();
        assert!(config.validate().is_err());

        let mut config = MetaConfig::default();
        config.enrich.lock_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = MetaConfig::from_toml_str("[cache]\nttl = 5\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
