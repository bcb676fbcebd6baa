//! C-UAV message encoding.
//!
//! Builds datagrams in the same shape the decoder accepts. Used by the
//! `udpjson_send` test sender and by tests.

use chrono::{Datelike, Local, Timelike};
use serde::Serialize;
use serde_json::{Map, Value};
use udpjson_common::cuav::{
    CommonHeader, CuavMessageId, ENVELOPE_MEMBER, EoSystemParams, GuidanceInfo, HEADER_MEMBER,
    MessageType, PAYLOAD_MEMBER, ServoControl,
};

/// Stateful encoder: owns the sender identity and the sequence counter.
#[derive(Debug, Clone)]
pub struct CuavEncoder {
    template: CommonHeader,
    next_sn: u32,
}

impl Default for CuavEncoder {
    fn default() -> Self {
        Self::new(CommonHeader::default())
    }
}

impl CuavEncoder {
    /// Create an encoder. Addressing fields of `template` are copied into
    /// every header; id, type, sequence, time and content fields are
    /// overwritten per message.
    pub fn new(template: CommonHeader) -> Self {
        Self {
            template,
            next_sn: 1,
        }
    }

    /// Sequence number the next message will carry.
    pub fn next_sn(&self) -> u32 {
        self.next_sn
    }

    /// Header for the next message, stamped with local wall-clock time.
    fn next_header(&mut self, msg_id: u16, msg_type: u8, cont_type: u8, cont_sum: u16) -> CommonHeader {
        let now = Local::now();
        let header = CommonHeader {
            msg_id,
            msg_sn: self.next_sn,
            msg_type,
            yr: u16::try_from(now.year()).unwrap_or_default(),
            mo: now.month() as u8,
            dy: now.day() as u8,
            h: now.hour() as u8,
            min: now.minute() as u8,
            sec: now.second() as u8,
            msec: now.timestamp_subsec_micros() as f32 / 1000.0,
            cont_type,
            cont_sum,
            recv_ts_us: 0,
            ..self.template
        };
        self.next_sn = self.next_sn.wrapping_add(1);
        header
    }

    /// Encode one payload directly under the payload member.
    pub fn encode<T: Serialize>(
        &mut self,
        msg_id: CuavMessageId,
        msg_type: MessageType,
        payload: &T,
    ) -> serde_json::Result<Vec<u8>> {
        let specific = serde_json::to_value(payload)?;
        self.encode_raw(msg_id.code(), msg_type.code(), specific)
    }

    /// Encode several payloads inside the envelope array.
    ///
    /// `cont_type` is 1 for multi-target and 2 for time-shared multi-target.
    pub fn encode_many<T: Serialize>(
        &mut self,
        msg_id: CuavMessageId,
        msg_type: MessageType,
        cont_type: u8,
        payloads: &[T],
    ) -> serde_json::Result<Vec<u8>> {
        let items = payloads
            .iter()
            .map(|p| -> serde_json::Result<Value> {
                let mut item = Map::new();
                item.insert(PAYLOAD_MEMBER.to_string(), serde_json::to_value(p)?);
                Ok(Value::Object(item))
            })
            .collect::<serde_json::Result<Vec<_>>>()?;

        let cont_sum = u16::try_from(items.len()).unwrap_or(u16::MAX);
        let header = self.next_header(msg_id.code(), msg_type.code(), cont_type, cont_sum);

        let mut root = Map::new();
        root.insert(HEADER_MEMBER.to_string(), serde_json::to_value(header)?);
        root.insert(ENVELOPE_MEMBER.to_string(), Value::Array(items));
        serde_json::to_vec(&root)
    }

    /// Encode an arbitrary payload object with raw codes.
    pub fn encode_raw(&mut self, msg_id: u16, msg_type: u8, specific: Value) -> serde_json::Result<Vec<u8>> {
        let header = self.next_header(msg_id, msg_type, 0, 1);

        let mut root = Map::new();
        root.insert(HEADER_MEMBER.to_string(), serde_json::to_value(header)?);
        root.insert(PAYLOAD_MEMBER.to_string(), specific);
        serde_json::to_vec(&root)
    }

    /// Guidance stream message.
    pub fn guidance(&mut self, guidance: &GuidanceInfo) -> serde_json::Result<Vec<u8>> {
        self.encode(CuavMessageId::Guidance, MessageType::Stream, guidance)
    }

    /// EO system parameter feedback message.
    pub fn eo_system(&mut self, params: &EoSystemParams) -> serde_json::Result<Vec<u8>> {
        self.encode(CuavMessageId::EoSystem, MessageType::Feedback, params)
    }

    /// Servo control message.
    pub fn servo(&mut self, servo: &ServoControl) -> serde_json::Result<Vec<u8>> {
        self.encode(CuavMessageId::EoServo, MessageType::Control, servo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cuav::decoder::{CuavPayload, decode};

    #[test]
    fn guidance_round_trips_through_decoder() {
        let mut encoder = CuavEncoder::new(CommonHeader {
            tx_sys_id: 999,
            tx_dev_type: 1,
            ..Default::default()
        });
        let guidance = GuidanceInfo {
            tar_id: 31,
            tar_category: 9,
            enu_r: 820.25,
            enu_a: 12.5,
            enu_e: 4.0,
            lat: 31.2,
            ..Default::default()
        };

        let data = encoder.guidance(&guidance).unwrap();
        let msg = decode(&data).unwrap();

        assert_eq!(msg.header.msg_sn, 1);
        assert_eq!(msg.header.tx_sys_id, 999);
        assert_eq!(msg.header.message_type(), MessageType::Stream);
        assert_eq!(msg.header.cont_sum, 1);
        assert!(msg.header.yr >= 2024);
        match msg.payload {
            CuavPayload::Guidance(decoded) => assert_eq!(decoded, guidance),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn sequence_advances_per_message() {
        let mut encoder = CuavEncoder::default();
        encoder.servo(&ServoControl::default()).unwrap();
        encoder.servo(&ServoControl::default()).unwrap();
        assert_eq!(encoder.next_sn(), 3);
    }

    #[test]
    fn envelope_carries_every_item() {
        let mut encoder = CuavEncoder::default();
        let targets = [
            GuidanceInfo {
                tar_id: 1,
                ..Default::default()
            },
            GuidanceInfo {
                tar_id: 2,
                ..Default::default()
            },
        ];
        let data = encoder
            .encode_many(CuavMessageId::Guidance, MessageType::Stream, 1, &targets)
            .unwrap();

        let root: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(root[HEADER_MEMBER]["cont_sum"], 2);
        assert_eq!(root[ENVELOPE_MEMBER].as_array().map(Vec::len), Some(2));

        // The decoder takes the first item.
        match decode(&data).unwrap().payload {
            CuavPayload::Guidance(g) => assert_eq!(g.tar_id, 1),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
