//! OpenThings record parameter identifiers.
//!
//! The decoder dispatches on these through a single lookup: each known
//! parameter names itself and selects which field of the received message
//! its value populates. Everything unrecognized funnels through one fallback
//! that aborts the frame.

use num_enum::{FromPrimitive, IntoPrimitive};
use std::fmt;
use strum_macros::Display;

/// Record parameter identifiers. Id 0 is reserved as the record terminator:
/// it marks "no more records, CRC follows".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Parameter {
    /// Record terminator; the CRC follows.
    Crc = 0x00,
    ReportDiagnostics = 0x26,
    ReportVoltage = 0x62,
    Frequency = 0x66,
    Current = 0x69,
    JoinResponse = 0x6A,
    Power = 0x70,
    ReactivePower = 0x71,
    SwitchState = 0x73,
    ReportTemperature = 0x74,
    Voltage = 0x76,
    ExerciseValve = 0xA3,
    SetLowPowerMode = 0xA4,
    SetValveState = 0xA5,
    RequestDiagnostics = 0xA6,
    Test = 0xAA,
    Identify = 0xBF,
    SetReportingInterval = 0xD2,
    RequestVoltage = 0xE2,
    JoinCommand = 0xEA,
    ActuateSwitch = 0xF3,
    SetTemperature = 0xF4,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Which field of a received message a parameter's record value populates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputField {
    Temperature,
    Diagnostics,
    Voltage,
    None,
}

impl Parameter {
    /// Whether the decoder understands this parameter at all.
    ///
    /// Some devices report single-letter ASCII ids; those are accepted
    /// verbatim rather than aborting the frame.
    pub fn is_known(&self) -> bool {
        match self {
            Parameter::Unknown(id) => id.is_ascii_alphabetic(),
            _ => true,
        }
    }

    /// The received-message field this parameter's value feeds.
    pub fn output_field(&self) -> OutputField {
        match self {
            Parameter::ReportTemperature => OutputField::Temperature,
            Parameter::ReportDiagnostics => OutputField::Diagnostics,
            Parameter::Voltage => OutputField::Voltage,
            _ => OutputField::None,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Parameter::Crc => "CRC",
            Parameter::ReportDiagnostics => "Report Diagnostics",
            Parameter::ReportVoltage => "Report Voltage",
            Parameter::Frequency => "Frequency",
            Parameter::Current => "Current",
            Parameter::JoinResponse => "Join Response",
            Parameter::Power => "Power",
            Parameter::ReactivePower => "Reactive Power",
            Parameter::SwitchState => "Switch State",
            Parameter::ReportTemperature => "Report Temperature",
            Parameter::Voltage => "Voltage",
            Parameter::ExerciseValve => "Exercise Valve",
            Parameter::SetLowPowerMode => "Set Low Power Mode",
            Parameter::SetValveState => "Set Valve State",
            Parameter::RequestDiagnostics => "Request Diagnostics",
            Parameter::Test => "Test",
            Parameter::Identify => "Identify",
            Parameter::SetReportingInterval => "Set Reporting Interval",
            Parameter::RequestVoltage => "Request Voltage",
            Parameter::JoinCommand => "Join Command",
            Parameter::ActuateSwitch => "Actuate Switch",
            Parameter::SetTemperature => "Set Temperature",
            Parameter::Unknown(id) if id.is_ascii_alphabetic() => {
                return write!(f, "{}", *id as char);
            }
            Parameter::Unknown(id) => return write!(f, "Unknown({id:#04x})"),
        };
        f.write_str(name)
    }
}

/// Argument to the set-valve-state command. The valve stays fully open or
/// closed until put back into normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive)]
#[repr(u8)]
pub enum ValveState {
    Open = 0,
    Closed = 1,
    Normal = 2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_primitive() {
        assert_eq!(Parameter::from_primitive(0xEA), Parameter::JoinCommand);
        assert_eq!(Parameter::from_primitive(0x00), Parameter::Crc);
        assert_eq!(Parameter::from_primitive(0x11), Parameter::Unknown(0x11));
        let id: u8 = Parameter::ReportTemperature.into();
        assert_eq!(id, 0x74);
    }

    #[test]
    fn ascii_letter_ids_are_known() {
        assert!(Parameter::Unknown(b'Q').is_known());
        assert_eq!(Parameter::Unknown(b'Q').to_string(), "Q");
        assert!(!Parameter::Unknown(0x11).is_known());
    }

    #[test]
    fn output_field_selection() {
        assert_eq!(
            Parameter::ReportTemperature.output_field(),
            OutputField::Temperature
        );
        assert_eq!(
            Parameter::ReportDiagnostics.output_field(),
            OutputField::Diagnostics
        );
        assert_eq!(Parameter::Voltage.output_field(), OutputField::Voltage);
        assert_eq!(Parameter::JoinCommand.output_field(), OutputField::None);
    }
}
