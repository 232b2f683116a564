//! Typed payloads for common MSP messages.
//!
//! Each record lists its fields in wire order. Coordinates travel as
//! unsigned 32-bit words holding a signed value in units of 1e-7 degrees.
//! Identity replies mix text with numbers and are parsed by hand.

use crate::codec::Frame;
use crate::error::Result;
use crate::value::{Marshal, RecordFields, Value};

fn degrees(raw: u32) -> f64 {
    f64::from(raw as i32) / 1e7
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Decode the unread rest of `frame` as text (`MSP_FC_VARIANT`, `MSP_NAME`,
/// `MSP_DEBUGMSG`), trimming padding and NULs.
pub fn read_text(frame: &mut Frame) -> String {
    let remaining = frame.remaining();
    // Taking exactly what remains cannot fail.
    frame.take(remaining).map(text).unwrap_or_default()
}

/// Reply to `MSP_BOARD_INFO`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardInfo {
    /// Four-character board identifier.
    pub board_id: String,
    pub hardware_revision: u16,
    /// Only sent by recent firmware.
    pub target_name: Option<String>,
}

impl BoardInfo {
    /// Parse from the frame cursor.
    ///
    /// Layout: id (4), hardware revision (u16), OSD type (u8), VCP flag
    /// (u8), then optionally a length-prefixed target name.
    pub fn parse(frame: &mut Frame) -> Result<Self> {
        let board_id = text(frame.take(4)?);
        let hardware_revision = frame.read_u16()?;
        frame.take(2)?;

        let mut target_name = None;
        if frame.remaining() > 0 {
            let len = usize::from(frame.read_u8()?);
            if frame.remaining() >= len {
                target_name = Some(text(frame.take(len)?));
            }
        }
        Ok(Self {
            board_id,
            hardware_revision,
            target_name,
        })
    }
}

/// Reply to `MSP_BUILD_INFO`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildInfo {
    /// `Mmm dd yyyy`
    pub date: String,
    /// `hh:mm:ss`
    pub time: String,
    /// Short git revision; 7 or 8 characters depending on firmware.
    pub revision: String,
}

impl BuildInfo {
    pub fn parse(frame: &mut Frame) -> Result<Self> {
        let date = text(frame.take(11)?);
        let time = text(frame.take(8)?);
        let revision = read_text(frame);
        Ok(Self {
            date,
            time,
            revision,
        })
    }
}

/// Reply to `MSP_API_VERSION`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiVersion {
    pub protocol: u8,
    pub major: u8,
    pub minor: u8,
}

impl Marshal for ApiVersion {
    fn to_value(&self) -> Value {
        Value::record([
            ("protocol", self.protocol.to_value()),
            ("major", self.major.to_value()),
            ("minor", self.minor.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("ApiVersion", value)?;
        Ok(Self {
            protocol: f.next()?,
            major: f.next()?,
            minor: f.next()?,
        })
    }
}

/// Reply to `MSP_FC_VERSION`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FcVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Marshal for FcVersion {
    fn to_value(&self) -> Value {
        Value::record([
            ("major", self.major.to_value()),
            ("minor", self.minor.to_value()),
            ("patch", self.patch.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("FcVersion", value)?;
        Ok(Self {
            major: f.next()?,
            minor: f.next()?,
            patch: f.next()?,
        })
    }
}

/// Reply to `MSP_RAW_GPS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawGps {
    /// 0 = no fix, 1 = 2D, 2 = 3D.
    pub fix_type: u8,
    pub num_sat: u8,
    pub latitude: u32,
    pub longitude: u32,
    /// Metres above mean sea level.
    pub altitude: u16,
    /// cm/s.
    pub ground_speed: u16,
    /// Decidegrees.
    pub ground_course: u16,
    /// HDOP × 100.
    pub hdop: u16,
}

impl RawGps {
    pub fn latitude_degrees(&self) -> f64 {
        degrees(self.latitude)
    }

    pub fn longitude_degrees(&self) -> f64 {
        degrees(self.longitude)
    }
}

impl Marshal for RawGps {
    fn to_value(&self) -> Value {
        Value::record([
            ("fix_type", self.fix_type.to_value()),
            ("num_sat", self.num_sat.to_value()),
            ("latitude", self.latitude.to_value()),
            ("longitude", self.longitude.to_value()),
            ("altitude", self.altitude.to_value()),
            ("ground_speed", self.ground_speed.to_value()),
            ("ground_course", self.ground_course.to_value()),
            ("hdop", self.hdop.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("RawGps", value)?;
        Ok(Self {
            fix_type: f.next()?,
            num_sat: f.next()?,
            latitude: f.next()?,
            longitude: f.next()?,
            altitude: f.next()?,
            ground_speed: f.next()?,
            ground_course: f.next()?,
            hdop: f.next()?,
        })
    }
}

/// Payload of `MSP_WP` replies and `MSP_SET_WP` commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Waypoint {
    pub number: u8,
    pub action: u8,
    pub latitude: u32,
    pub longitude: u32,
    /// Centimetres.
    pub altitude: u32,
    pub p1: u16,
    pub p2: u16,
    pub p3: u16,
    /// 0xA5 marks the last waypoint of a mission.
    pub flag: u8,
}

impl Waypoint {
    pub fn latitude_degrees(&self) -> f64 {
        degrees(self.latitude)
    }

    pub fn longitude_degrees(&self) -> f64 {
        degrees(self.longitude)
    }
}

impl Marshal for Waypoint {
    fn to_value(&self) -> Value {
        Value::record([
            ("number", self.number.to_value()),
            ("action", self.action.to_value()),
            ("latitude", self.latitude.to_value()),
            ("longitude", self.longitude.to_value()),
            ("altitude", self.altitude.to_value()),
            ("p1", self.p1.to_value()),
            ("p2", self.p2.to_value()),
            ("p3", self.p3.to_value()),
            ("flag", self.flag.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("Waypoint", value)?;
        Ok(Self {
            number: f.next()?,
            action: f.next()?,
            latitude: f.next()?,
            longitude: f.next()?,
            altitude: f.next()?,
            p1: f.next()?,
            p2: f.next()?,
            p3: f.next()?,
            flag: f.next()?,
        })
    }
}

/// Reply to `MSP_NAV_STATUS`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavStatus {
    pub mode: u8,
    pub state: u8,
    pub active_wp_action: u8,
    pub active_wp_number: u8,
    pub error: u8,
    pub heading_hold_target: u16,
}

impl Marshal for NavStatus {
    fn to_value(&self) -> Value {
        Value::record([
            ("mode", self.mode.to_value()),
            ("state", self.state.to_value()),
            ("active_wp_action", self.active_wp_action.to_value()),
            ("active_wp_number", self.active_wp_number.to_value()),
            ("error", self.error.to_value()),
            ("heading_hold_target", self.heading_hold_target.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("NavStatus", value)?;
        Ok(Self {
            mode: f.next()?,
            state: f.next()?,
            active_wp_action: f.next()?,
            active_wp_number: f.next()?,
            error: f.next()?,
            heading_hold_target: f.next()?,
        })
    }
}

/// One serial port entry of `MSP_CF_SERIAL_CONFIG`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialPortConfig {
    pub identifier: u8,
    pub function_mask: u16,
    pub msp_baud_index: u8,
    pub gps_baud_index: u8,
    pub telemetry_baud_index: u8,
    pub peripheral_baud_index: u8,
}

impl Marshal for SerialPortConfig {
    fn to_value(&self) -> Value {
        Value::record([
            ("identifier", self.identifier.to_value()),
            ("function_mask", self.function_mask.to_value()),
            ("msp_baud_index", self.msp_baud_index.to_value()),
            ("gps_baud_index", self.gps_baud_index.to_value()),
            ("telemetry_baud_index", self.telemetry_baud_index.to_value()),
            ("peripheral_baud_index", self.peripheral_baud_index.to_value()),
        ])
    }

    fn template() -> Value {
        Self::default().to_value()
    }

    fn from_value(value: Value) -> Result<Self> {
        let mut f = RecordFields::new("SerialPortConfig", value)?;
        Ok(Self {
            identifier: f.next()?,
            function_mask: f.next()?,
            msp_baud_index: f.next()?,
            gps_baud_index: f.next()?,
            telemetry_baud_index: f.next()?,
            peripheral_baud_index: f.next()?,
        })
    }
}
