//! C-UAV structured telemetry protocol.
//!
//! Every datagram is one UTF-8 JSON object. The common header lives under
//! [`HEADER_MEMBER`]; the message-specific payload lives either directly
//! under [`PAYLOAD_MEMBER`] or inside the [`ENVELOPE_MEMBER`] array, where
//! the first item carrying [`PAYLOAD_MEMBER`] wins.
//!
//! ```text
//! { "公共内容": { "msg_id": 29025, ... }, "具体信息": { "tar_id": 7, ... } }
//! { "公共内容": { ... }, "cont": [ { "具体信息": { ... } } ] }
//! ```
//!
//! This module only holds the identifier tables and typed records. Parsing
//! and dispatch live in `udpjson_meta::cuav`.

pub mod ids;
pub mod records;

pub use ids::{CuavMessageId, MessageType, TargetCategory};
pub use records::{CommonHeader, EoSystemParams, GuidanceInfo, ServoControl};

/// Member name of the common header object.
pub const HEADER_MEMBER: &str = "公共内容";

/// Member name of the message-specific payload object.
pub const PAYLOAD_MEMBER: &str = "具体信息";

/// Member name of the multi-item envelope array.
pub const ENVELOPE_MEMBER: &str = "cont";
