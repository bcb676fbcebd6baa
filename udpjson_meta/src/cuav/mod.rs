//! C-UAV structured telemetry: decoding, observer dispatch and encoding.
//!
//! Identifier tables and typed records live in `udpjson_common::cuav`.

mod coerce;
pub mod decoder;
pub mod encoder;

pub use decoder::{
    CuavDecoder, CuavDecoderBuilder, CuavError, CuavPayload, DecodedMessage, Observer,
    RawObserver, decode, decode_at,
};
pub use encoder::CuavEncoder;
