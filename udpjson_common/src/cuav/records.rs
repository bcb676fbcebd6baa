//! Typed C-UAV records.
//!
//! Field names match the wire member names so the same structs serialize
//! back into valid messages. Physical ranges are documented per field; the
//! decoder does not enforce them.

use serde::{Deserialize, Serialize};

use super::ids::{CuavMessageId, MessageType, TargetCategory};

/// Common header present on every message.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CommonHeader {
    /// Message identifier
    pub msg_id: u16,
    /// Sender-side sequence counter
    pub msg_sn: u32,
    /// Message type (see [`MessageType`])
    pub msg_type: u8,
    /// Transmitter system id
    pub tx_sys_id: u16,
    /// Transmitter device type
    pub tx_dev_type: u16,
    /// Transmitter device id
    pub tx_dev_id: u16,
    /// Transmitter sub-device id
    pub tx_subdev_id: u16,
    /// Receiver system id
    pub rx_sys_id: u16,
    /// Receiver device type
    pub rx_dev_type: u16,
    /// Receiver device id
    pub rx_dev_id: u16,
    /// Receiver sub-device id
    pub rx_subdev_id: u16,
    /// Year
    pub yr: u16,
    /// Month
    pub mo: u8,
    /// Day
    pub dy: u8,
    /// Hour
    pub h: u8,
    /// Minute
    pub min: u8,
    /// Second
    pub sec: u8,
    /// Millisecond (fractional)
    pub msec: f32,
    /// Content cardinality: 0 single, 1 multi-target, 2 time-shared multi-target
    pub cont_type: u8,
    /// Number of content items
    pub cont_sum: u16,
    /// Local receipt time, microseconds on the process monotonic clock.
    /// Never serialized.
    #[serde(skip)]
    pub recv_ts_us: u64,
}

impl CommonHeader {
    /// Typed message identifier.
    pub fn message_id(&self) -> CuavMessageId {
        CuavMessageId::from(self.msg_id)
    }

    /// Typed message type.
    pub fn message_type(&self) -> MessageType {
        MessageType::from(self.msg_type)
    }
}

/// Guidance record (`msg_id` 0x7111).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GuidanceInfo {
    /// Year
    pub yr: u16,
    /// Month
    pub mo: u8,
    /// Day
    pub dy: u8,
    /// Hour
    pub h: u8,
    /// Minute
    pub min: u8,
    /// Second
    pub sec: u8,
    /// Millisecond (fractional)
    pub msec: f32,
    /// Guidance batch number
    pub tar_id: u32,
    /// Target category (see [`TargetCategory`])
    pub tar_category: u16,
    /// 0 cancelled, 1 normal, 2 extrapolated
    pub guid_stat: u8,
    /// ECEF X (m)
    pub ecef_x: f64,
    /// ECEF Y (m)
    pub ecef_y: f64,
    /// ECEF Z (m)
    pub ecef_z: f64,
    /// ECEF velocity X (m/s)
    pub ecef_vx: f64,
    /// ECEF velocity Y (m/s)
    pub ecef_vy: f64,
    /// ECEF velocity Z (m/s)
    pub ecef_vz: f64,
    /// Horizontal deviation (%)
    pub h_dvi_pct: f32,
    /// Vertical deviation (%)
    pub v_dvi_pct: f32,
    /// Target range (m)
    pub enu_r: f64,
    /// Target bearing (deg)
    pub enu_a: f64,
    /// Target elevation (deg)
    pub enu_e: f64,
    /// Target speed (m/s)
    pub enu_v: f64,
    /// Target relative height (m)
    pub enu_h: f64,
    /// Longitude (deg)
    pub lon: f64,
    /// Latitude (deg)
    pub lat: f64,
    /// Altitude (m)
    pub alt: f64,
}

impl GuidanceInfo {
    /// Typed target category.
    pub fn category(&self) -> TargetCategory {
        TargetCategory::from(self.tar_category)
    }
}

/// Electro-optical system parameters (`msg_id` 0x7201).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EoSystemParams {
    /// Servo status: 0 invalid, 1 normal, 2 self-test, 3 warm-up, 4 fault
    pub sv_stat: u8,
    /// Servo error code
    pub sv_err: u16,
    /// Servo horizontal mode: 0 manual, 1 tracking
    pub st_mode_h: u8,
    /// Servo vertical mode: 0 manual, 1 tracking
    pub st_mode_v: u8,
    /// Servo horizontal pointing (deg), [0, 360)
    pub st_loc_h: f32,
    /// Servo vertical pointing (deg), [-90, 90]
    pub st_loc_v: f32,
    /// Visible-light status
    pub pt_stat: u8,
    /// Visible-light error code
    pub pt_err: u16,
    /// Visible-light focal length, [134, 16298]
    pub pt_focal: f32,
    /// Visible-light focus
    pub pt_focus: u16,
    /// Visible-light horizontal field of view
    pub pt_fov_h: f32,
    /// Visible-light vertical field of view
    pub pt_fov_v: f32,
    /// Infrared status
    pub ir_stat: u8,
    /// Infrared error code
    pub ir_err: u16,
    /// Infrared focal length, [851, 1223]
    pub ir_focal: f32,
    /// Infrared focus
    pub ir_focus: u16,
    /// Infrared horizontal field of view
    pub ir_fov_h: f32,
    /// Infrared vertical field of view
    pub ir_fov_v: f32,
    /// Range finder status
    pub dm_stat: u8,
    /// Range finder error code
    pub dm_err: u16,
    /// Range finder device
    pub dm_dev: u8,
    /// Tracking device: 0 visible, 1 infrared, 3 multi-sensor
    pub trk_dev: u8,
    /// Visible-light tracking linkage: 0 stopped, 1 started
    pub pt_trk_link: u8,
    /// Infrared tracking linkage: 0 stopped, 1 started
    pub ir_trk_link: u8,
    /// Tracking switch: 0 stopped, 1 started
    pub trk_str: u8,
    /// Tracking mode: 0 automatic, 1 semi-automatic, 2 manual
    pub trk_mod: u8,
    /// 0 detection, 1 recognition
    pub det_trk: u8,
    /// Tracking status: 0 idle, 1 tracking, 3 lock lost, 4 target lost
    pub trk_stat: u8,
    /// Visible-light auto zoom
    pub pt_zoom: u8,
    /// Infrared auto zoom
    pub ir_zoom: u8,
    /// Visible-light focus mode: 0 automatic, 1 manual
    pub pt_focus_mode: u8,
    /// Infrared focus mode: 0 automatic, 1 manual
    pub ir_focus_mode: u8,
}

/// Electro-optical servo control (`msg_id` 0x7204).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ServoControl {
    /// Device: 0 visible, 1 infrared, 2 both
    pub dev_id: u8,
    /// Power: 0 off, 1 on
    pub dev_en: u8,
    /// Control enable: 0 ignore, 1 apply
    pub ctrl_en: u8,
    /// Horizontal control mode: 0 manual, 1 tracking
    pub mode_h: u8,
    /// Vertical control mode: 0 manual, 1 tracking
    pub mode_v: u8,
    /// Horizontal speed action: 0 none, 1 set, 2 get, 3 increase, 4 decrease
    pub speed_en_h: u8,
    /// Horizontal speed, [1, 200]
    pub speed_h: u8,
    /// Vertical speed action
    pub speed_en_v: u8,
    /// Vertical speed, [1, 200]
    pub speed_v: u8,
    /// Horizontal position action: 0 none, 1 set, 2 get, 3 increase, 4 decrease
    pub loc_en_h: u8,
    /// Horizontal position (deg)
    pub loc_h: f32,
    /// Vertical position action
    pub loc_en_v: u8,
    /// Vertical position (deg)
    pub loc_v: f32,
    /// Pixel offset enable
    pub offset_en: u8,
    /// Horizontal pixel offset
    pub offset_h: i16,
    /// Vertical pixel offset
    pub offset_v: i16,
}
