//! # Result Structures
//!
//! Telemetry, configuration and version snapshots decoded from controller
//! replies, plus the argument structures for configuration writes. Wire
//! layouts are declared as [`Layout`] tables.

use std::fmt;

use serde::Serialize;

use super::buffer::{Codec, Value, Wire};
use super::commands::FaultCode;
use super::fields::{float_field, raw_field, scaled_field, write_report, Field, Layout};

/// Fault code field, shared by the telemetry layouts
macro_rules! fault_field {
    ($ty:ty) => {
        Field::<$ty> {
            name: "fault",
            codec: Codec::raw(Wire::U8),
            get: |t| Value::Int(t.fault.0 as i64),
            set: |t, v| t.fault = FaultCode(v.as_u8()),
        }
    };
}

/// Realtime telemetry (`GetValues` reply)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Telemetry {
    /// MOSFET temperature in °C
    pub temp_mosfet: f32,
    /// Motor temperature in °C
    pub temp_motor: f32,
    /// Average motor current in A
    pub avg_motor_current: f32,
    /// Average input current in A
    pub avg_input_current: f32,
    /// Average d-axis current in A
    pub avg_id: f32,
    /// Average q-axis current in A
    pub avg_iq: f32,
    /// Duty cycle, -1.0 to 1.0
    pub duty_cycle_now: f32,
    /// Electrical RPM
    pub rpm: f32,
    /// Input voltage in V
    pub input_voltage: f32,
    pub amp_hours: f32,
    pub amp_hours_charged: f32,
    pub watt_hours: f32,
    pub watt_hours_charged: f32,
    /// Tachometer in electrical steps
    pub tachometer: i32,
    pub tachometer_abs: i32,
    pub fault: FaultCode,
    /// PID position in degrees
    pub pid_pos: f32,
    /// Controller id on the CAN bus
    pub controller_id: u8,
}

impl Layout for Telemetry {
    const FIELDS: &'static [Field<Self>] = &[
        scaled_field!(Telemetry, temp_mosfet, I16, 10.0),
        scaled_field!(Telemetry, temp_motor, I16, 10.0),
        scaled_field!(Telemetry, avg_motor_current, I32, 100.0),
        scaled_field!(Telemetry, avg_input_current, I32, 100.0),
        scaled_field!(Telemetry, avg_id, I32, 100.0),
        scaled_field!(Telemetry, avg_iq, I32, 100.0),
        scaled_field!(Telemetry, duty_cycle_now, I16, 1000.0),
        scaled_field!(Telemetry, rpm, I32, 1.0),
        scaled_field!(Telemetry, input_voltage, I16, 10.0),
        scaled_field!(Telemetry, amp_hours, I32, 10_000.0),
        scaled_field!(Telemetry, amp_hours_charged, I32, 10_000.0),
        scaled_field!(Telemetry, watt_hours, I32, 10_000.0),
        scaled_field!(Telemetry, watt_hours_charged, I32, 10_000.0),
        raw_field!(Telemetry, tachometer, I32, as_i32),
        raw_field!(Telemetry, tachometer_abs, I32, as_i32),
        fault_field!(Telemetry),
        scaled_field!(Telemetry, pid_pos, I32, 1_000_000.0),
        raw_field!(Telemetry, controller_id, U8, as_u8),
    ];
}

/// Setup-scaled telemetry (`GetValuesSetup` reply)
///
/// Values are summed over all controllers on the bus when the firmware is
/// configured to do so.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SetupValues {
    pub temp_mosfet: f32,
    pub temp_motor: f32,
    pub motor_current: f32,
    pub input_current: f32,
    pub duty_cycle_now: f32,
    pub rpm: f32,
    /// Speed in m/s
    pub speed: f32,
    pub input_voltage: f32,
    /// Battery level, 0.0 to 1.0
    pub battery_level: f32,
    pub amp_hours: f32,
    pub amp_hours_charged: f32,
    pub watt_hours: f32,
    pub watt_hours_charged: f32,
    /// Distance in m
    pub distance: f32,
    pub distance_abs: f32,
    pub pid_pos: f32,
    pub fault: FaultCode,
    pub controller_id: u8,
    /// Number of controllers on the bus
    pub num_vescs: u8,
    pub watt_hours_left: f32,
    /// Odometer in m
    pub odometer: u32,
    pub uptime_ms: u32,
}

impl Layout for SetupValues {
    const FIELDS: &'static [Field<Self>] = &[
        scaled_field!(SetupValues, temp_mosfet, I16, 10.0),
        scaled_field!(SetupValues, temp_motor, I16, 10.0),
        scaled_field!(SetupValues, motor_current, I32, 100.0),
        scaled_field!(SetupValues, input_current, I32, 100.0),
        scaled_field!(SetupValues, duty_cycle_now, I16, 1000.0),
        scaled_field!(SetupValues, rpm, I32, 1.0),
        scaled_field!(SetupValues, speed, I32, 1000.0),
        scaled_field!(SetupValues, input_voltage, I16, 10.0),
        scaled_field!(SetupValues, battery_level, I16, 1000.0),
        scaled_field!(SetupValues, amp_hours, I32, 10_000.0),
        scaled_field!(SetupValues, amp_hours_charged, I32, 10_000.0),
        scaled_field!(SetupValues, watt_hours, I32, 10_000.0),
        scaled_field!(SetupValues, watt_hours_charged, I32, 10_000.0),
        scaled_field!(SetupValues, distance, I32, 1000.0),
        scaled_field!(SetupValues, distance_abs, I32, 1000.0),
        scaled_field!(SetupValues, pid_pos, I32, 1_000_000.0),
        fault_field!(SetupValues),
        raw_field!(SetupValues, controller_id, U8, as_u8),
        raw_field!(SetupValues, num_vescs, U8, as_u8),
        scaled_field!(SetupValues, watt_hours_left, I32, 1000.0),
        raw_field!(SetupValues, odometer, U32, as_u32),
        raw_field!(SetupValues, uptime_ms, U32, as_u32),
    ];
}

/// Motor configuration limits (`GetMcConf` reply, `SetMcConfTemp` body)
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct McConf {
    pub current_min: f32,
    pub current_max: f32,
    pub erpm_min: f32,
    pub erpm_max: f32,
    pub duty_min: f32,
    pub duty_max: f32,
    pub watt_min: f32,
    pub watt_max: f32,
    pub in_current_min: f32,
    pub in_current_max: f32,
    pub motor_poles: u8,
    pub gear_ratio: f32,
    /// Wheel diameter in m
    pub wheel_diameter: f32,
}

impl Layout for McConf {
    const FIELDS: &'static [Field<Self>] = &[
        float_field!(McConf, current_min),
        float_field!(McConf, current_max),
        float_field!(McConf, erpm_min),
        float_field!(McConf, erpm_max),
        float_field!(McConf, duty_min),
        float_field!(McConf, duty_max),
        float_field!(McConf, watt_min),
        float_field!(McConf, watt_max),
        float_field!(McConf, in_current_min),
        float_field!(McConf, in_current_max),
        raw_field!(McConf, motor_poles, U8, as_u8),
        float_field!(McConf, gear_ratio),
        float_field!(McConf, wheel_diameter),
    ];
}

/// Flags preceding a temporary configuration write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfWriteFlags {
    /// Persist to flash
    pub store: bool,
    /// Apply to every controller on the CAN bus
    pub forward_can: bool,
    /// Request an acknowledgement frame
    pub ack: bool,
    /// Divide current limits by the number of controllers
    pub divide_by_controllers: bool,
}

impl Layout for ConfWriteFlags {
    const FIELDS: &'static [Field<Self>] = &[
        raw_field!(ConfWriteFlags, store, Bool, as_bool),
        raw_field!(ConfWriteFlags, forward_can, Bool, as_bool),
        raw_field!(ConfWriteFlags, ack, Bool, as_bool),
        raw_field!(ConfWriteFlags, divide_by_controllers, Bool, as_bool),
    ];
}

/// Relative limit profile (`SetMcConfTempSetup` body, after the flags)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalProfile {
    /// Scale of the configured minimum current, 0.0 to 1.0
    pub current_min_rel: f32,
    /// Scale of the configured maximum current, 0.0 to 1.0
    pub current_max_rel: f32,
    /// Reverse speed limit in m/s
    pub speed_max_reverse: f32,
    /// Forward speed limit in m/s
    pub speed_max: f32,
    pub duty_min: f32,
    pub duty_max: f32,
    pub watt_min: f32,
    pub watt_max: f32,
}

impl Layout for LocalProfile {
    const FIELDS: &'static [Field<Self>] = &[
        float_field!(LocalProfile, current_min_rel),
        float_field!(LocalProfile, current_max_rel),
        float_field!(LocalProfile, speed_max_reverse),
        float_field!(LocalProfile, speed_max),
        float_field!(LocalProfile, duty_min),
        float_field!(LocalProfile, duty_max),
        float_field!(LocalProfile, watt_min),
        float_field!(LocalProfile, watt_max),
    ];
}

/// Decoded ADC application input (`GetDecodedAdc` reply)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DecodedAdc {
    /// Decoded level in millionths (0 to 1 000 000)
    pub decoded_level: i32,
    /// Input voltage in µV
    pub voltage: i32,
    pub decoded_level2: i32,
    pub voltage2: i32,
}

impl Layout for DecodedAdc {
    const FIELDS: &'static [Field<Self>] = &[
        raw_field!(DecodedAdc, decoded_level, I32, as_i32),
        raw_field!(DecodedAdc, voltage, I32, as_i32),
        raw_field!(DecodedAdc, decoded_level2, I32, as_i32),
        raw_field!(DecodedAdc, voltage2, I32, as_i32),
    ];
}

impl DecodedAdc {
    /// First channel level, 0.0 to 1.0
    pub fn level(&self) -> f32 {
        self.decoded_level as f32 / 1_000_000.0
    }

    /// First channel voltage in V
    pub fn volts(&self) -> f32 {
        self.voltage as f32 / 1_000_000.0
    }

    pub fn level2(&self) -> f32 {
        self.decoded_level2 as f32 / 1_000_000.0
    }

    pub fn volts2(&self) -> f32 {
        self.voltage2 as f32 / 1_000_000.0
    }
}

/// Firmware version (`FwVersion` reply)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    /// Hardware name, when the firmware reports one
    pub hardware_name: Option<String>,
}

impl Layout for FirmwareVersion {
    const FIELDS: &'static [Field<Self>] = &[
        raw_field!(FirmwareVersion, major, U8, as_u8),
        raw_field!(FirmwareVersion, minor, U8, as_u8),
    ];
}

/// Joystick state for the nunchuk application (`SetChuckData` body)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nunchuck {
    /// X axis, 0 to 255 with 127 centered
    pub value_x: u8,
    /// Y axis, 0 to 255 with 127 centered
    pub value_y: u8,
    pub lower_button: bool,
    pub upper_button: bool,
}

impl Default for Nunchuck {
    fn default() -> Self {
        Self {
            value_x: 127,
            value_y: 127,
            lower_button: false,
            upper_button: false,
        }
    }
}

impl Layout for Nunchuck {
    const FIELDS: &'static [Field<Self>] = &[
        raw_field!(Nunchuck, value_x, U8, as_u8),
        raw_field!(Nunchuck, value_y, U8, as_u8),
        raw_field!(Nunchuck, lower_button, Bool, as_bool),
        raw_field!(Nunchuck, upper_button, Bool, as_bool),
    ];
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(self, f)
    }
}

impl fmt::Display for SetupValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(self, f)
    }
}

impl fmt::Display for McConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(self, f)
    }
}

impl fmt::Display for DecodedAdc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_report(self, f)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(name) = &self.hardware_name {
            write!(f, " ({})", name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(Telemetry::wire_size(), 58);
        assert_eq!(SetupValues::wire_size(), 69);
        assert_eq!(McConf::wire_size(), 49);
        assert_eq!(LocalProfile::wire_size(), 32);
        assert_eq!(ConfWriteFlags::wire_size(), 4);
        assert_eq!(DecodedAdc::wire_size(), 16);
        assert_eq!(FirmwareVersion::wire_size(), 2);
        assert_eq!(Nunchuck::wire_size(), 4);
    }

    #[test]
    fn test_field_names_unique() {
        fn check<T: Layout>() {
            let mut names: Vec<_> = T::FIELDS.iter().map(|f| f.name).collect();
            let len = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), len);
        }
        check::<Telemetry>();
        check::<SetupValues>();
        check::<McConf>();
        check::<LocalProfile>();
    }

    #[test]
    fn test_decoded_adc_conversions() {
        let adc = DecodedAdc {
            decoded_level: 500_000,
            voltage: 1_650_000,
            decoded_level2: 1_000_000,
            voltage2: 0,
        };
        assert!((adc.level() - 0.5).abs() < 1e-6);
        assert!((adc.volts() - 1.65).abs() < 1e-6);
        assert!((adc.level2() - 1.0).abs() < 1e-6);
        assert_eq!(adc.volts2(), 0.0);
    }

    #[test]
    fn test_telemetry_report_one_line_per_field() {
        let telemetry = Telemetry {
            input_voltage: 42.0,
            fault: FaultCode(5),
            ..Default::default()
        };

        let report = telemetry.to_string();
        assert_eq!(report.lines().count(), Telemetry::FIELDS.len());
        assert!(report.contains("input_voltage: 42\n"));
        assert!(report.contains("fault: 5\n"));
    }

    #[test]
    fn test_firmware_version_display() {
        let version = FirmwareVersion {
            major: 5,
            minor: 3,
            hardware_name: Some("60".to_string()),
        };
        assert_eq!(version.to_string(), "5.3 (60)");
        assert_eq!(FirmwareVersion::default().to_string(), "0.0");
    }

    #[test]
    fn test_config_floats_use_auto_float() {
        use crate::protocol::buffer::PayloadWriter;
        use crate::protocol::fields::encode_fields;

        let profile = LocalProfile {
            current_max_rel: 0.5,
            ..Default::default()
        };
        let mut writer = PayloadWriter::new();
        encode_fields(&mut writer, &profile);
        assert_eq!(&writer.as_slice()[4..8], &[0x3F, 0x00, 0x00, 0x00]);

        assert!(McConf::FIELDS
            .iter()
            .filter(|f| f.name != "motor_poles")
            .all(|f| f.codec == Codec::float32_auto()));
    }

    #[test]
    fn test_nunchuck_default_centered() {
        let chuck = Nunchuck::default();
        assert_eq!(chuck.value_x, 127);
        assert_eq!(chuck.value_y, 127);
        assert!(!chuck.lower_button && !chuck.upper_button);
    }
}
