//! MSP command and message codes.
//!
//! Codes below 256 are shared with MSPv1; MSPv2 carries them in a 16-bit
//! field, so the same numbers are valid here.

/// API version (protocol, major, minor).
pub const API_VERSION: u16 = 1;
/// Firmware variant identifier, e.g. `INAV`.
pub const FC_VARIANT: u16 = 2;
/// Firmware version (major, minor, patch).
pub const FC_VERSION: u16 = 3;
/// Board identifier, hardware revision and target name.
pub const BOARD_INFO: u16 = 4;
/// Build date, time and revision.
pub const BUILD_INFO: u16 = 5;
pub const INAV_PID: u16 = 6;
pub const SET_INAV_PID: u16 = 7;
/// User-set craft name.
pub const NAME: u16 = 10;
pub const SET_NAME: u16 = 11;
pub const NAV_POSHOLD: u16 = 12;
pub const SET_NAV_POSHOLD: u16 = 13;
pub const POSITION_ESTIMATION_CONFIG: u16 = 16;
/// Load the mission stored in non-volatile memory.
pub const WP_MISSION_LOAD: u16 = 18;
/// Save the current mission to non-volatile memory.
pub const WP_MISSION_SAVE: u16 = 19;
pub const WP_GETINFO: u16 = 20;
pub const RTH_AND_LAND_CONFIG: u16 = 21;
pub const SET_RTH_AND_LAND_CONFIG: u16 = 22;
pub const FW_CONFIG: u16 = 23;
pub const SET_FW_CONFIG: u16 = 24;
pub const FEATURE: u16 = 36;
pub const SET_FEATURE: u16 = 37;
pub const CURRENT_METER_CONFIG: u16 = 40;
pub const CF_SERIAL_CONFIG: u16 = 54;
pub const SET_CF_SERIAL_CONFIG: u16 = 55;
pub const VOLTAGE_METER_CONFIG: u16 = 56;
/// Surface altitude in cm.
pub const SONAR_ALTITUDE: u16 = 58;
/// Reboot the flight controller.
pub const REBOOT: u16 = 68;
pub const STATUS: u16 = 101;
/// GPS fix, satellites, position, speed and course.
pub const RAW_GPS: u16 = 106;
/// Distance and direction to home.
pub const COMP_GPS: u16 = 107;
pub const ATTITUDE: u16 = 108;
pub const ALTITUDE: u16 = 109;
pub const ANALOG: u16 = 110;
/// Read one waypoint; number 0 is home, 16 is position hold.
pub const WP: u16 = 118;
pub const NAV_STATUS: u16 = 121;
pub const NAV_CONFIG: u16 = 122;
pub const STATUS_EX: u16 = 150;
pub const SENSOR_STATUS: u16 = 151;
pub const UID: u16 = 160;
pub const GPS_SV_INFO: u16 = 164;
pub const GPS_STATISTICS: u16 = 166;
/// Write one waypoint.
pub const SET_WP: u16 = 209;
/// Persist settings to EEPROM.
pub const EEPROM_WRITE: u16 = 250;
/// Debug string buffer.
pub const DEBUG_MSG: u16 = 253;
pub const DEBUG: u16 = 254;
/// MSPv1 escape code for an encapsulated MSPv2 frame.
pub const V2_FRAME: u16 = 255;

/// Returns a human-readable name for a message code.
pub fn code_name(code: u16) -> &'static str {
    match code {
        API_VERSION => "API_VERSION",
        FC_VARIANT => "FC_VARIANT",
        FC_VERSION => "FC_VERSION",
        BOARD_INFO => "BOARD_INFO",
        BUILD_INFO => "BUILD_INFO",
        INAV_PID => "INAV_PID",
        SET_INAV_PID => "SET_INAV_PID",
        NAME => "NAME",
        SET_NAME => "SET_NAME",
        NAV_POSHOLD => "NAV_POSHOLD",
        SET_NAV_POSHOLD => "SET_NAV_POSHOLD",
        POSITION_ESTIMATION_CONFIG => "POSITION_ESTIMATION_CONFIG",
        WP_MISSION_LOAD => "WP_MISSION_LOAD",
        WP_MISSION_SAVE => "WP_MISSION_SAVE",
        WP_GETINFO => "WP_GETINFO",
        RTH_AND_LAND_CONFIG => "RTH_AND_LAND_CONFIG",
        SET_RTH_AND_LAND_CONFIG => "SET_RTH_AND_LAND_CONFIG",
        FW_CONFIG => "FW_CONFIG",
        SET_FW_CONFIG => "SET_FW_CONFIG",
        FEATURE => "FEATURE",
        SET_FEATURE => "SET_FEATURE",
        CURRENT_METER_CONFIG => "CURRENT_METER_CONFIG",
        CF_SERIAL_CONFIG => "CF_SERIAL_CONFIG",
        SET_CF_SERIAL_CONFIG => "SET_CF_SERIAL_CONFIG",
        VOLTAGE_METER_CONFIG => "VOLTAGE_METER_CONFIG",
        SONAR_ALTITUDE => "SONAR_ALTITUDE",
        REBOOT => "REBOOT",
        STATUS => "STATUS",
        RAW_GPS => "RAW_GPS",
        COMP_GPS => "COMP_GPS",
        ATTITUDE => "ATTITUDE",
        ALTITUDE => "ALTITUDE",
        ANALOG => "ANALOG",
        WP => "WP",
        NAV_STATUS => "NAV_STATUS",
        NAV_CONFIG => "NAV_CONFIG",
        STATUS_EX => "STATUS_EX",
        SENSOR_STATUS => "SENSOR_STATUS",
        UID => "UID",
        GPS_SV_INFO => "GPS_SV_INFO",
        GPS_STATISTICS => "GPS_STATISTICS",
        SET_WP => "SET_WP",
        EEPROM_WRITE => "EEPROM_WRITE",
        DEBUG_MSG => "DEBUG_MSG",
        DEBUG => "DEBUG",
        V2_FRAME => "V2_FRAME",
        _ => "UNKNOWN",
    }
}

/// Returns true for codes that ask the board to change state rather than report it.
pub fn is_setter(code: u16) -> bool {
    matches!(
        code,
        SET_INAV_PID
            | SET_NAME
            | SET_NAV_POSHOLD
            | SET_RTH_AND_LAND_CONFIG
            | SET_FW_CONFIG
            | SET_FEATURE
            | SET_CF_SERIAL_CONFIG
            | SET_WP
            | WP_MISSION_LOAD
            | WP_MISSION_SAVE
            | EEPROM_WRITE
            | REBOOT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(code_name(RAW_GPS), "RAW_GPS");
        assert_eq!(code_name(REBOOT), "REBOOT");
        assert_eq!(code_name(0x2001), "UNKNOWN");
    }

    #[test]
    fn setters() {
        assert!(is_setter(SET_WP));
        assert!(is_setter(REBOOT));
        assert!(!is_setter(WP));
        assert!(!is_setter(API_VERSION));
    }
}
