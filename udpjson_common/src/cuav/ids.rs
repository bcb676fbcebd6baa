//! C-UAV identifier tables.
//!
//! Numeric codes arrive as plain integers on the wire. Each table maps the
//! known codes to a variant and keeps unknown codes intact, so a message
//! type added by a newer sender still round-trips through logs.

use std::fmt;

/// Message identifier carried in the common header (`msg_id`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CuavMessageId {
    /// 0x7101 - command
    Command,
    /// 0x7102 - device configuration parameters
    DeviceConfig,
    /// 0x7111 - guidance
    Guidance,
    /// 0x7112 - target information 1
    Target1,
    /// 0x7113 - target information 2
    Target2,
    /// 0x7201 - electro-optical system parameters
    EoSystem,
    /// 0x7202 - electro-optical built-in test status
    EoBit,
    /// 0x7203 - electro-optical tracking control
    EoTrack,
    /// 0x7204 - electro-optical servo control
    EoServo,
    /// 0x7205 - visible-light camera control
    EoVisible,
    /// 0x7206 - infrared camera control
    EoInfrared,
    /// 0x7207 - range finder control
    EoRanging,
    /// 0x7208 - operator box selection
    EoBox,
    /// 0x7209 - recording control
    EoRecord,
    /// 0x720A - auxiliary equipment control
    EoAuxiliary,
    /// 0x720B - image control
    EoImage,
    /// Any code not listed above.
    Unknown(u16),
}

const MESSAGE_IDS: [(u16, CuavMessageId); 16] = [
    (0x7101, CuavMessageId::Command),
    (0x7102, CuavMessageId::DeviceConfig),
    (0x7111, CuavMessageId::Guidance),
    (0x7112, CuavMessageId::Target1),
    (0x7113, CuavMessageId::Target2),
    (0x7201, CuavMessageId::EoSystem),
    (0x7202, CuavMessageId::EoBit),
    (0x7203, CuavMessageId::EoTrack),
    (0x7204, CuavMessageId::EoServo),
    (0x7205, CuavMessageId::EoVisible),
    (0x7206, CuavMessageId::EoInfrared),
    (0x7207, CuavMessageId::EoRanging),
    (0x7208, CuavMessageId::EoBox),
    (0x7209, CuavMessageId::EoRecord),
    (0x720A, CuavMessageId::EoAuxiliary),
    (0x720B, CuavMessageId::EoImage),
];

impl CuavMessageId {
    /// Wire code of this identifier.
    pub fn code(self) -> u16 {
        if let CuavMessageId::Unknown(code) = self {
            return code;
        }
        MESSAGE_IDS
            .iter()
            .find(|(_, id)| *id == self)
            .map(|(code, _)| *code)
            .unwrap_or_default()
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            CuavMessageId::Command => "command",
            CuavMessageId::DeviceConfig => "device config",
            CuavMessageId::Guidance => "guidance",
            CuavMessageId::Target1 => "target info 1",
            CuavMessageId::Target2 => "target info 2",
            CuavMessageId::EoSystem => "EO system parameters",
            CuavMessageId::EoBit => "EO BIT status",
            CuavMessageId::EoTrack => "EO tracking control",
            CuavMessageId::EoServo => "EO servo control",
            CuavMessageId::EoVisible => "visible-light control",
            CuavMessageId::EoInfrared => "infrared control",
            CuavMessageId::EoRanging => "ranging control",
            CuavMessageId::EoBox => "box selection",
            CuavMessageId::EoRecord => "EO recording",
            CuavMessageId::EoAuxiliary => "auxiliary control",
            CuavMessageId::EoImage => "image control",
            CuavMessageId::Unknown(_) => "unknown",
        }
    }
}

impl From<u16> for CuavMessageId {
    fn from(code: u16) -> Self {
        MESSAGE_IDS
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, id)| *id)
            .unwrap_or(CuavMessageId::Unknown(code))
    }
}

impl fmt::Display for CuavMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.name(), self.code())
    }
}

/// Message type carried in the common header (`msg_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// 0
    Control,
    /// 1
    Feedback,
    /// 2
    Query,
    /// 3
    Stream,
    /// 100
    Init,
    /// Anything else.
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(code: u8) -> Self {
        match code {
            0 => MessageType::Control,
            1 => MessageType::Feedback,
            2 => MessageType::Query,
            3 => MessageType::Stream,
            100 => MessageType::Init,
            other => MessageType::Unknown(other),
        }
    }
}

impl MessageType {
    /// Wire code of this message type.
    pub fn code(self) -> u8 {
        match self {
            MessageType::Control => 0,
            MessageType::Feedback => 1,
            MessageType::Query => 2,
            MessageType::Stream => 3,
            MessageType::Init => 100,
            MessageType::Unknown(code) => code,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Control => "control",
            MessageType::Feedback => "feedback",
            MessageType::Query => "query",
            MessageType::Stream => "stream",
            MessageType::Init => "init",
            MessageType::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target category carried in guidance (`tar_category`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetCategory {
    /// 0
    Unknown,
    /// 1
    Birds,
    /// 2
    Balloon,
    /// 3
    Airplane,
    /// 4
    Car,
    /// 5
    BigBird,
    /// 6
    SmallBird,
    /// 7
    Person,
    /// 8
    CruiseMissile,
    /// 9
    Uav,
    /// 15
    Unspecified,
    /// Code outside the table.
    Other(u16),
}

impl From<u16> for TargetCategory {
    fn from(code: u16) -> Self {
        match code {
            0 => TargetCategory::Unknown,
            1 => TargetCategory::Birds,
            2 => TargetCategory::Balloon,
            3 => TargetCategory::Airplane,
            4 => TargetCategory::Car,
            5 => TargetCategory::BigBird,
            6 => TargetCategory::SmallBird,
            7 => TargetCategory::Person,
            8 => TargetCategory::CruiseMissile,
            9 => TargetCategory::Uav,
            15 => TargetCategory::Unspecified,
            other => TargetCategory::Other(other),
        }
    }
}

impl TargetCategory {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            TargetCategory::Unknown => "unidentified",
            TargetCategory::Birds => "bird flock",
            TargetCategory::Balloon => "balloon",
            TargetCategory::Airplane => "airplane",
            TargetCategory::Car => "car",
            TargetCategory::BigBird => "big bird",
            TargetCategory::SmallBird => "small bird",
            TargetCategory::Person => "person",
            TargetCategory::CruiseMissile => "cruise missile",
            TargetCategory::Uav => "UAV",
            TargetCategory::Unspecified => "unspecified",
            TargetCategory::Other(_) => "other",
        }
    }
}

impl fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetCategory::Other(code) => write!(f, "other({code})"),
            known => f.write_str(known.name()),
        }
    }
}

/// Name of a servo / sensor status code (`sv_stat`, `pt_stat`, ...).
pub fn device_status_name(code: u8) -> &'static str {
    match code {
        0 => "invalid",
        1 => "normal",
        2 => "self-test",
        3 => "warm-up",
        4 => "fault",
        _ => "unknown",
    }
}

/// Name of a tracking status code (`trk_stat`).
pub fn tracking_status_name(code: u8) -> &'static str {
    match code {
        0 => "not tracking",
        1 => "tracking",
        3 => "lock lost",
        4 => "target lost",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_table_round_trips() {
        for (code, id) in MESSAGE_IDS {
            assert_eq!(CuavMessageId::from(code), id);
            assert_eq!(id.code(), code);
        }
    }

    #[test]
    fn unknown_message_id_keeps_code() {
        let id = CuavMessageId::from(0x1234);
        assert_eq!(id, CuavMessageId::Unknown(0x1234));
        assert_eq!(id.code(), 0x1234);
        assert_eq!(id.to_string(), "unknown (0x1234)");
    }

    #[test]
    fn guidance_display() {
        assert_eq!(CuavMessageId::Guidance.to_string(), "guidance (0x7111)");
    }

    #[test]
    fn message_type_codes() {
        assert_eq!(MessageType::from(100), MessageType::Init);
        assert_eq!(MessageType::from(7), MessageType::Unknown(7));
        assert_eq!(MessageType::Stream.code(), 3);
        assert_eq!(MessageType::Query.to_string(), "query");
    }

    #[test]
    fn target_category_names() {
        assert_eq!(TargetCategory::from(9), TargetCategory::Uav);
        assert_eq!(TargetCategory::from(15).to_string(), "unspecified");
        assert_eq!(TargetCategory::from(42).to_string(), "other(42)");
    }

    #[test]
    fn status_names() {
        assert_eq!(device_status_name(4), "fault");
        assert_eq!(device_status_name(9), "unknown");
        assert_eq!(tracking_status_name(2), "unknown");
        assert_eq!(tracking_status_name(3), "lock lost");
    }
}
