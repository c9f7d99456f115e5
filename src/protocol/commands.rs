//! # Protocol Constants and Command Identifiers
//!
//! Framing constants and the firmware's command and fault-code tables.

use serde::Serialize;

/// Start marker for frames with a 1-byte length field
pub const START_SHORT: u8 = 0x02;

/// Start marker for frames with a 2-byte big-endian length field
pub const START_LONG: u8 = 0x03;

/// Stop marker terminating every frame
pub const STOP_BYTE: u8 = 0x03;

/// Largest payload accepted in either direction
pub const MAX_PAYLOAD_SIZE: usize = 512;

/// Largest payload that still uses the short (1-byte length) form
pub const MAX_SHORT_PAYLOAD_SIZE: usize = 255;

/// Bytes following the payload: CRC (2) + stop marker (1)
pub const FRAME_TRAILER_SIZE: usize = 3;

/// Largest possible frame on the wire
pub const MAX_FRAME_SIZE: usize = 3 + MAX_PAYLOAD_SIZE + FRAME_TRAILER_SIZE;

/// Command identifiers understood by the motor controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum CommandId {
    FwVersion = 0,
    GetValues = 4,
    SetDuty = 5,
    SetCurrent = 6,
    SetCurrentBrake = 7,
    SetRpm = 8,
    GetMcConf = 14,
    Alive = 30,
    GetDecodedAdc = 32,
    ForwardCan = 34,
    SetChuckData = 35,
    GetValuesSetup = 47,
    SetMcConfTemp = 48,
    SetMcConfTempSetup = 49,
}

impl CommandId {
    /// Look up a command from its wire id
    pub fn from_u8(id: u8) -> Option<Self> {
        let command = match id {
            0 => Self::FwVersion,
            4 => Self::GetValues,
            5 => Self::SetDuty,
            6 => Self::SetCurrent,
            7 => Self::SetCurrentBrake,
            8 => Self::SetRpm,
            14 => Self::GetMcConf,
            30 => Self::Alive,
            32 => Self::GetDecodedAdc,
            34 => Self::ForwardCan,
            35 => Self::SetChuckData,
            47 => Self::GetValuesSetup,
            48 => Self::SetMcConfTemp,
            49 => Self::SetMcConfTempSetup,
            _ => return None,
        };
        Some(command)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Motor controller fault code
///
/// Values outside the known table are kept as-is and reported as `UNKNOWN`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FaultCode(pub u8);

const FAULT_NAMES: &[&str] = &[
    "FAULT_CODE_NONE",
    "FAULT_CODE_OVER_VOLTAGE",
    "FAULT_CODE_UNDER_VOLTAGE",
    "FAULT_CODE_DRV",
    "FAULT_CODE_ABS_OVER_CURRENT",
    "FAULT_CODE_OVER_TEMP_FET",
    "FAULT_CODE_OVER_TEMP_MOTOR",
    "FAULT_CODE_GATE_DRIVER_OVER_VOLTAGE",
    "FAULT_CODE_GATE_DRIVER_UNDER_VOLTAGE",
    "FAULT_CODE_MCU_UNDER_VOLTAGE",
    "FAULT_CODE_BOOTING_FROM_WATCHDOG_RESET",
    "FAULT_CODE_ENCODER_SPI",
    "FAULT_CODE_ENCODER_SINCOS_BELOW_MIN_AMPLITUDE",
    "FAULT_CODE_ENCODER_SINCOS_ABOVE_MAX_AMPLITUDE",
    "FAULT_CODE_FLASH_CORRUPTION",
    "FAULT_CODE_HIGH_OFFSET_CURRENT_SENSOR_1",
    "FAULT_CODE_HIGH_OFFSET_CURRENT_SENSOR_2",
    "FAULT_CODE_HIGH_OFFSET_CURRENT_SENSOR_3",
    "FAULT_CODE_UNBALANCED_CURRENTS",
];

impl FaultCode {
    pub const NONE: FaultCode = FaultCode(0);

    /// Firmware name of the fault
    pub fn name(self) -> &'static str {
        FAULT_NAMES
            .get(self.0 as usize)
            .copied()
            .unwrap_or("FAULT_CODE_UNKNOWN")
    }

    pub fn is_fault(self) -> bool {
        self != Self::NONE
    }
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}
