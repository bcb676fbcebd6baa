//! C-UAV message decoding and observer dispatch.
//!
//! Decoding is stateless: [`decode`] turns one datagram into a
//! [`DecodedMessage`]. A [`CuavDecoder`] adds the observer slots built with
//! [`CuavDecoderBuilder`] and invokes them for each decoded message.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};
use udpjson_common::cuav::ids::{device_status_name, tracking_status_name};
use udpjson_common::cuav::{
    CommonHeader, CuavMessageId, ENVELOPE_MEMBER, EoSystemParams, GuidanceInfo, HEADER_MEMBER,
    PAYLOAD_MEMBER, ServoControl,
};

use super::coerce::Fields;
use crate::clock;

/// Per-message decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CuavError {
    /// Payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    /// Root is not a JSON object.
    #[error("root is not a JSON object")]
    RootNotObject,
    /// No header object under the header member.
    #[error("no common header found")]
    MissingHeader,
    /// No payload object, directly or in the envelope.
    #[error("no payload found for msg_id=0x{msg_id:04X}")]
    MissingPayload {
        /// Message id read from the header.
        msg_id: u16,
    },
}

/// Typed payload, selected by the header's message id.
#[derive(Debug, Clone, PartialEq)]
pub enum CuavPayload {
    /// 0x7111
    Guidance(GuidanceInfo),
    /// 0x7201
    EoSystem(EoSystemParams),
    /// 0x7204
    ServoControl(ServoControl),
    /// Any other id. Only the raw payload is available.
    Unknown,
}

/// One decoded datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    /// Common header, stamped with the receipt time.
    pub header: CommonHeader,
    /// Typed payload.
    pub payload: CuavPayload,
    /// The payload object as received.
    pub specific: Map<String, Value>,
}

impl DecodedMessage {
    /// Message id from the header.
    pub fn message_id(&self) -> CuavMessageId {
        self.header.message_id()
    }
}

/// Decode one datagram, stamping the header with the current monotonic time.
pub fn decode(data: &[u8]) -> Result<DecodedMessage, CuavError> {
    decode_at(data, clock::now_us())
}

/// Decode one datagram with an explicit receipt timestamp.
pub fn decode_at(data: &[u8], recv_ts_us: u64) -> Result<DecodedMessage, CuavError> {
    let root: Value =
        serde_json::from_slice(data).map_err(|e| CuavError::InvalidJson(e.to_string()))?;
    let mut root = match root {
        Value::Object(map) => map,
        _ => return Err(CuavError::RootNotObject),
    };

    let header = match root.get(HEADER_MEMBER) {
        Some(Value::Object(common)) => parse_header(Fields::new(common), recv_ts_us),
        _ => return Err(CuavError::MissingHeader),
    };

    let specific = take_payload(&mut root).ok_or(CuavError::MissingPayload {
        msg_id: header.msg_id,
    })?;

    let fields = Fields::new(&specific);
    let payload = match header.message_id() {
        CuavMessageId::Guidance => CuavPayload::Guidance(parse_guidance(fields)),
        CuavMessageId::EoSystem => CuavPayload::EoSystem(parse_eo_system(fields)),
        CuavMessageId::EoServo => CuavPayload::ServoControl(parse_servo(fields)),
        _ => CuavPayload::Unknown,
    };

    Ok(DecodedMessage {
        header,
        payload,
        specific,
    })
}

/// Payload object stored directly, or the first envelope item carrying one.
///
/// A direct payload member that is not an object is a missing payload; the
/// envelope is only consulted when the direct member is absent.
fn take_payload(root: &mut Map<String, Value>) -> Option<Map<String, Value>> {
    if let Some(direct) = root.remove(PAYLOAD_MEMBER) {
        return match direct {
            Value::Object(specific) => Some(specific),
            _ => None,
        };
    }

    let Some(Value::Array(items)) = root.remove(ENVELOPE_MEMBER) else {
        return None;
    };
    items.into_iter().find_map(|item| match item {
        Value::Object(mut item) => match item.remove(PAYLOAD_MEMBER) {
            Some(Value::Object(specific)) => Some(specific),
            _ => None,
        },
        _ => None,
    })
}

fn parse_header(f: Fields<'_>, recv_ts_us: u64) -> CommonHeader {
    CommonHeader {
        msg_id: f.get("msg_id"),
        msg_sn: f.get("msg_sn"),
        msg_type: f.get("msg_type"),
        tx_sys_id: f.get("tx_sys_id"),
        tx_dev_type: f.get("tx_dev_type"),
        tx_dev_id: f.get("tx_dev_id"),
        tx_subdev_id: f.get("tx_subdev_id"),
        rx_sys_id: f.get("rx_sys_id"),
        rx_dev_type: f.get("rx_dev_type"),
        rx_dev_id: f.get("rx_dev_id"),
        rx_subdev_id: f.get("rx_subdev_id"),
        yr: f.get("yr"),
        mo: f.get("mo"),
        dy: f.get("dy"),
        h: f.get("h"),
        min: f.get("min"),
        sec: f.get("sec"),
        msec: f.get("msec"),
        cont_type: f.get("cont_type"),
        cont_sum: f.get("cont_sum"),
        recv_ts_us,
    }
}

fn parse_guidance(f: Fields<'_>) -> GuidanceInfo {
    GuidanceInfo {
        yr: f.get("yr"),
        mo: f.get("mo"),
        dy: f.get("dy"),
        h: f.get("h"),
        min: f.get("min"),
        sec: f.get("sec"),
        msec: f.get("msec"),
        tar_id: f.get("tar_id"),
        tar_category: f.get("tar_category"),
        guid_stat: f.get("guid_stat"),
        ecef_x: f.get("ecef_x"),
        ecef_y: f.get("ecef_y"),
        ecef_z: f.get("ecef_z"),
        ecef_vx: f.get("ecef_vx"),
        ecef_vy: f.get("ecef_vy"),
        ecef_vz: f.get("ecef_vz"),
        h_dvi_pct: f.get("h_dvi_pct"),
        v_dvi_pct: f.get("v_dvi_pct"),
        enu_r: f.get("enu_r"),
        enu_a: f.get("enu_a"),
        enu_e: f.get("enu_e"),
        enu_v: f.get("enu_v"),
        enu_h: f.get("enu_h"),
        lon: f.get("lon"),
        lat: f.get("lat"),
        alt: f.get("alt"),
    }
}

fn parse_eo_system(f: Fields<'_>) -> EoSystemParams {
    EoSystemParams {
        sv_stat: f.get("sv_stat"),
        sv_err: f.get("sv_err"),
        st_mode_h: f.get("st_mode_h"),
        st_mode_v: f.get("st_mode_v"),
        st_loc_h: f.get("st_loc_h"),
        st_loc_v: f.get("st_loc_v"),
        pt_stat: f.get("pt_stat"),
        pt_err: f.get("pt_err"),
        pt_focal: f.get("pt_focal"),
        pt_focus: f.get("pt_focus"),
        pt_fov_h: f.get("pt_fov_h"),
        pt_fov_v: f.get("pt_fov_v"),
        ir_stat: f.get("ir_stat"),
        ir_err: f.get("ir_err"),
        ir_focal: f.get("ir_focal"),
        ir_focus: f.get("ir_focus"),
        ir_fov_h: f.get("ir_fov_h"),
        ir_fov_v: f.get("ir_fov_v"),
        dm_stat: f.get("dm_stat"),
        dm_err: f.get("dm_err"),
        dm_dev: f.get("dm_dev"),
        trk_dev: f.get("trk_dev"),
        pt_trk_link: f.get("pt_trk_link"),
        ir_trk_link: f.get("ir_trk_link"),
        trk_str: f.get("trk_str"),
        trk_mod: f.get("trk_mod"),
        det_trk: f.get("det_trk"),
        trk_stat: f.get("trk_stat"),
        pt_zoom: f.get("pt_zoom"),
        ir_zoom: f.get("ir_zoom"),
        pt_focus_mode: f.get("pt_focus_mode"),
        ir_focus_mode: f.get("ir_focus_mode"),
    }
}

fn parse_servo(f: Fields<'_>) -> ServoControl {
    ServoControl {
        dev_id: f.get("dev_id"),
        dev_en: f.get("dev_en"),
        ctrl_en: f.get("ctrl_en"),
        mode_h: f.get("mode_h"),
        mode_v: f.get("mode_v"),
        speed_en_h: f.get("speed_en_h"),
        speed_h: f.get("speed_h"),
        speed_en_v: f.get("speed_en_v"),
        speed_v: f.get("speed_v"),
        loc_en_h: f.get("loc_en_h"),
        loc_h: f.get("loc_h"),
        loc_en_v: f.get("loc_en_v"),
        loc_v: f.get("loc_v"),
        offset_en: f.get("offset_en"),
        offset_h: f.get("offset_h"),
        offset_v: f.get("offset_v"),
    }
}

/// Observer for one typed payload family.
pub type Observer<T> = Box<dyn Fn(&CommonHeader, &T) + Send + Sync>;

/// Observer for every decoded message, with the payload as received.
pub type RawObserver = Box<dyn Fn(&CommonHeader, &Map<String, Value>) + Send + Sync>;

/// Decoder with one optional observer per payload family.
///
/// Observers are fixed at construction, so dispatch never races with
/// registration.
#[derive(Default)]
pub struct CuavDecoder {
    guidance: Option<Observer<GuidanceInfo>>,
    eo_system: Option<Observer<EoSystemParams>>,
    servo: Option<Observer<ServoControl>>,
    raw: Option<RawObserver>,
    debug: bool,
}

impl std::fmt::Debug for CuavDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CuavDecoder")
            .field("guidance", &self.guidance.is_some())
            .field("eo_system", &self.eo_system.is_some())
            .field("servo", &self.servo.is_some())
            .field("raw", &self.raw.is_some())
            .field("debug", &self.debug)
            .finish()
    }
}

impl CuavDecoder {
    /// Start building a decoder.
    pub fn builder() -> CuavDecoderBuilder {
        CuavDecoderBuilder::default()
    }

    /// Whether decoded records are logged.
    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    /// Decode one datagram and invoke the observers.
    ///
    /// A known message id invokes its typed observer, then the raw observer.
    /// An unknown id invokes only the raw observer and still succeeds.
    pub fn parse(&self, data: &[u8]) -> Result<DecodedMessage, CuavError> {
        let message = match decode(data) {
            Ok(message) => message,
            Err(e) => {
                debug!("C-UAV datagram dropped: {}", e);
                return Err(e);
            }
        };
        self.dispatch(&message);
        Ok(message)
    }

    /// Invoke the observers for an already decoded message.
    pub fn dispatch(&self, message: &DecodedMessage) {
        let header = &message.header;

        match &message.payload {
            CuavPayload::Guidance(guidance) => {
                if self.debug {
                    log_guidance(guidance);
                }
                if let Some(observer) = &self.guidance {
                    observer(header, guidance);
                }
                debug!(
                    "Parsed guidance: tar_id={}, guid_stat={}, enu_a={:.2}, enu_e={:.2}",
                    guidance.tar_id, guidance.guid_stat, guidance.enu_a, guidance.enu_e
                );
            }
            CuavPayload::EoSystem(params) => {
                if self.debug {
                    log_eo_system(params);
                }
                if let Some(observer) = &self.eo_system {
                    observer(header, params);
                }
                debug!(
                    "Parsed EO system: sv_stat={}, st_loc_h={:.2}, st_loc_v={:.2}",
                    params.sv_stat, params.st_loc_h, params.st_loc_v
                );
            }
            CuavPayload::ServoControl(servo) => {
                if self.debug {
                    log_servo(servo);
                }
                if let Some(observer) = &self.servo {
                    observer(header, servo);
                }
                debug!(
                    "Parsed servo control: mode_h={}, mode_v={}, loc_h={:.2}, loc_v={:.2}",
                    servo.mode_h, servo.mode_v, servo.loc_h, servo.loc_v
                );
            }
            CuavPayload::Unknown => {
                if self.debug {
                    info!("[CUAV] unhandled message {}", header.message_id());
                }
            }
        }

        if let Some(observer) = &self.raw {
            observer(header, &message.specific);
        }
    }
}

/// Builder for [`CuavDecoder`]. Setting a slot twice keeps the last observer.
#[derive(Default)]
pub struct CuavDecoderBuilder {
    inner: CuavDecoder,
}

impl CuavDecoderBuilder {
    /// Observer for guidance records.
    pub fn on_guidance<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CommonHeader, &GuidanceInfo) + Send + Sync + 'static,
    {
        self.inner.guidance = Some(Box::new(observer));
        self
    }

    /// Observer for EO system parameters.
    pub fn on_eo_system<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CommonHeader, &EoSystemParams) + Send + Sync + 'static,
    {
        self.inner.eo_system = Some(Box::new(observer));
        self
    }

    /// Observer for servo control records.
    pub fn on_servo<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CommonHeader, &ServoControl) + Send + Sync + 'static,
    {
        self.inner.servo = Some(Box::new(observer));
        self
    }

    /// Observer for every decoded message.
    pub fn on_raw<F>(mut self, observer: F) -> Self
    where
        F: Fn(&CommonHeader, &Map<String, Value>) + Send + Sync + 'static,
    {
        self.inner.raw = Some(Box::new(observer));
        self
    }

    /// Log each decoded typed record at info level.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.inner.debug = enabled;
        self
    }

    /// Finish.
    pub fn build(self) -> CuavDecoder {
        self.inner
    }
}

fn log_guidance(g: &GuidanceInfo) {
    info!(
        "[CUAV] guidance: time={}-{:02}-{:02} {:02}:{:02}:{:02}.{:.0} tar_id={} category={}({}) stat={}",
        g.yr,
        g.mo,
        g.dy,
        g.h,
        g.min,
        g.sec,
        g.msec,
        g.tar_id,
        g.tar_category,
        g.category(),
        g.guid_stat
    );
    info!(
        "[CUAV]   ecef=({:.2}, {:.2}, {:.2}) range={:.2} bearing={:.2}° elevation={:.2}° lla=({:.6}, {:.6}, {:.2})",
        g.ecef_x, g.ecef_y, g.ecef_z, g.enu_r, g.enu_a, g.enu_e, g.lon, g.lat, g.alt
    );
}

fn log_eo_system(p: &EoSystemParams) {
    info!(
        "[CUAV] EO system: servo={}({}) pointing h={:.2}° v={:.2}° visible focal={:.1} focus={} infrared focal={:.1} focus={}",
        p.sv_stat,
        device_status_name(p.sv_stat),
        p.st_loc_h,
        p.st_loc_v,
        p.pt_focal,
        p.pt_focus,
        p.ir_focal,
        p.ir_focus
    );
    info!(
        "[CUAV]   tracking: dev={} link=visible {}/infrared {} stat={}({})",
        p.trk_dev,
        p.pt_trk_link,
        p.ir_trk_link,
        p.trk_stat,
        tracking_status_name(p.trk_stat)
    );
}

fn log_servo(s: &ServoControl) {
    let mode = |m: u8| if m == 0 { "manual" } else { "tracking" };
    info!(
        "[CUAV] servo control: dev_id={} dev_en={} ctrl_en={} mode h={} v={} speed h={} v={} position h={:.2}° v={:.2}°",
        s.dev_id,
        s.dev_en,
        s.ctrl_en,
        mode(s.mode_h),
        mode(s.mode_v),
        s.speed_h,
        s.speed_v,
        s.loc_h,
        s.loc_v
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guidance_datagram() -> Vec<u8> {
        json!({
            "公共内容": {"msg_id": 0x7111, "msg_sn": "70000", "msg_type": 3, "cont_type": 0, "cont_sum": 1},
            "具体信息": {"tar_id": 12, "tar_category": "9", "enu_r": 1520.5, "enu_a": "45.25", "enu_e": 3}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn decodes_guidance_with_mixed_encodings() {
        let msg = decode_at(&guidance_datagram(), 77).unwrap();
        assert_eq!(msg.header.msg_sn, 70000);
        assert_eq!(msg.header.recv_ts_us, 77);
        assert_eq!(msg.message_id(), CuavMessageId::Guidance);

        let CuavPayload::Guidance(g) = msg.payload else {
            panic!("expected guidance, got {:?}", msg.payload);
        };
        assert_eq!(g.tar_id, 12);
        assert_eq!(g.tar_category, 9);
        assert_eq!(g.enu_r, 1520.5);
        assert_eq!(g.enu_a, 45.25);
        assert_eq!(g.enu_e, 3.0);
        assert_eq!(g.lat, 0.0);
    }

    #[test]
    fn payload_found_in_envelope() {
        let data = json!({
            "公共内容": {"msg_id": 0x7204, "cont_type": 1, "cont_sum": 2},
            "cont": [
                {"other": 1},
                {"具体信息": {"dev_id": 2, "offset_h": -15, "loc_h": "90.5"}},
                {"具体信息": {"dev_id": 9}}
            ]
        })
        .to_string();

        let msg = decode(data.as_bytes()).unwrap();
        let CuavPayload::ServoControl(servo) = msg.payload else {
            panic!("expected servo control");
        };
        assert_eq!(servo.dev_id, 2);
        assert_eq!(servo.offset_h, -15);
        assert_eq!(servo.loc_h, 90.5);
    }

    #[test]
    fn non_object_direct_payload_ignores_envelope() {
        let data = json!({
            "公共内容": {"msg_id": 0x7204},
            "具体信息": 5,
            "cont": [{"具体信息": {"dev_id": 1}}]
        })
        .to_string();

        assert_eq!(
            decode(data.as_bytes()),
            Err(CuavError::MissingPayload { msg_id: 0x7204 })
        );
    }

    #[test]
    fn decode_failures() {
        assert!(matches!(decode(b"not json"), Err(CuavError::InvalidJson(_))));
        assert_eq!(decode(b"[]"), Err(CuavError::RootNotObject));
        assert_eq!(
            decode(r#"{"具体信息":{}}"#.as_bytes()),
            Err(CuavError::MissingHeader)
        );
        assert_eq!(
            decode(r#"{"公共内容":{"msg_id":29025},"cont":[{"x":1}]}"#.as_bytes()),
            Err(CuavError::MissingPayload { msg_id: 0x7161 })
        );
    }

    #[test]
    fn unknown_id_reaches_raw_only() {
        let typed = Arc::new(AtomicUsize::new(0));
        let raw = Arc::new(AtomicUsize::new(0));
        let (t1, t2, t3, r) = (typed.clone(), typed.clone(), typed.clone(), raw.clone());

        let decoder = CuavDecoder::builder()
            .on_guidance(move |_, _| {
                t1.fetch_add(1, Ordering::SeqCst);
            })
            .on_eo_system(move |_, _| {
                t2.fetch_add(1, Ordering::SeqCst);
            })
            .on_servo(move |_, _| {
                t3.fetch_add(1, Ordering::SeqCst);
            })
            .on_raw(move |header, specific| {
                assert_eq!(header.msg_id, 0x7101);
                assert_eq!(specific.get("cmd_id"), Some(&json!(4)));
                r.fetch_add(1, Ordering::SeqCst);
            })
            .debug(true)
            .build();

        let data = json!({"公共内容": {"msg_id": 0x7101}, "具体信息": {"cmd_id": 4}}).to_string();
        let msg = decoder.parse(data.as_bytes()).unwrap();

        assert_eq!(msg.payload, CuavPayload::Unknown);
        assert_eq!(typed.load(Ordering::SeqCst), 0);
        assert_eq!(raw.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn last_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (a, b) = (first.clone(), second.clone());

        let decoder = CuavDecoder::builder()
            .on_guidance(move |_, _| {
                a.fetch_add(1, Ordering::SeqCst);
            })
            .on_guidance(move |_, _| {
                b.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        decoder.parse(&guidance_datagram()).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_decode_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let decoder = CuavDecoder::builder()
            .on_raw(move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .build();

        assert!(decoder.parse(r#"{"公共内容": 5}"#.as_bytes()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
