//! Outbound OpenThings message assembly.
//!
//! Frame layout, before encryption:
//!
//! ```text
//! [len][manuf][prod][pip hi][pip lo][sensor 2..0][records...][0x00][crc hi][crc lo]
//! ```
//!
//! `len` counts every byte after itself. The CRC covers the sensor id
//! through the record terminator, and the keystream cipher then scrambles
//! the sensor id through the CRC low byte.

use crate::cipher::Keystream;
use crate::constants::{ENCRYPTION_START, MAX_FRAME_SIZE, MESSAGE_OVERHEAD, SIZE_MSG_LEN};
use crate::crc::crc16;
use crate::error::Error;
use crate::param::{Parameter, ValveState};
use crate::value::{TypeCode, TypeDescriptor};
use bytes::{BufMut, Bytes, BytesMut};

/// One (parameter, type, value) unit in a message payload.
///
/// The gateway only ever issues a handful of commands, so records are built
/// through explicit per-command constructors rather than a general encoder;
/// the decode direction is the fully general one.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    parameter: Parameter,
    descriptor: TypeDescriptor,
    value: Vec<u8>,
}

impl Record {
    /// Build a record from raw value bytes. The descriptor's length nibble
    /// limits a value to 15 bytes.
    pub fn new(parameter: Parameter, code: TypeCode, value: &[u8]) -> Result<Record, Error> {
        if value.len() > 15 {
            return Err(Error::ValueTooLong(value.len()));
        }
        Ok(Record {
            parameter,
            descriptor: TypeDescriptor::new()
                .with_type_code(code.into())
                .with_length(value.len() as u8),
            value: value.to_vec(),
        })
    }

    /// A record carrying no value bytes (requests and acknowledgements).
    pub fn ack(parameter: Parameter) -> Record {
        Record {
            parameter,
            descriptor: TypeDescriptor::new(),
            value: Vec::new(),
        }
    }

    /// Acknowledge a device's join request.
    pub fn join_response() -> Record {
        Record::ack(Parameter::JoinResponse)
    }

    /// Ask the device to identify itself (LED flash).
    pub fn identify() -> Record {
        Record::ack(Parameter::Identify)
    }

    /// Run the valve across its full travel and report diagnostics.
    pub fn exercise_valve() -> Record {
        Record::ack(Parameter::ExerciseValve)
    }

    /// Read the diagnostic flags from the driver board.
    pub fn request_diagnostics() -> Record {
        Record::ack(Parameter::RequestDiagnostics)
    }

    /// Request the battery voltage.
    pub fn request_voltage() -> Record {
        Record::ack(Parameter::RequestVoltage)
    }

    /// New target temperature, sent as Q8 fixed point over two bytes.
    pub fn set_temperature(celsius: f32) -> Record {
        let q8 = (celsius * 256.0).round() as i16;
        Record {
            parameter: Parameter::SetTemperature,
            descriptor: TypeDescriptor::new()
                .with_type_code(TypeCode::SIntBp8.into())
                .with_length(2),
            value: q8.to_be_bytes().to_vec(),
        }
    }

    /// Force the valve fully open or closed, or back to normal operation.
    pub fn set_valve_state(state: ValveState) -> Record {
        Record {
            parameter: Parameter::SetValveState,
            descriptor: TypeDescriptor::new()
                .with_type_code(TypeCode::UInt.into())
                .with_length(1),
            value: vec![state.into()],
        }
    }

    /// Toggle the device's low power mode.
    pub fn set_low_power_mode(enabled: bool) -> Record {
        Record {
            parameter: Parameter::SetLowPowerMode,
            descriptor: TypeDescriptor::new()
                .with_type_code(TypeCode::UInt.into())
                .with_length(1),
            value: vec![u8::from(enabled)],
        }
    }

    /// Seconds between the device's periodic reports.
    pub fn set_reporting_interval(seconds: u16) -> Record {
        Record {
            parameter: Parameter::SetReportingInterval,
            descriptor: TypeDescriptor::new()
                .with_type_code(TypeCode::UInt.into())
                .with_length(2),
            value: seconds.to_be_bytes().to_vec(),
        }
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }

    pub fn descriptor(&self) -> TypeDescriptor {
        self.descriptor
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Bytes this record occupies on the wire.
    fn wire_size(&self) -> usize {
        2 + self.value.len()
    }
}

/// An outbound message: header identifiers plus an ordered record sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub manufacturer_id: u8,
    pub product_id: u8,
    /// 24-bit device identifier; the top byte is ignored.
    pub sensor_id: u32,
    pub records: Vec<Record>,
}

impl OutboundMessage {
    pub fn new(manufacturer_id: u8, product_id: u8, sensor_id: u32) -> Self {
        OutboundMessage {
            manufacturer_id,
            product_id,
            sensor_id,
            records: Vec::new(),
        }
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Encode with a fresh random pip, ready for transmission.
    pub fn encode(&self, encryption_id: u8) -> Result<Bytes, Error> {
        self.encode_with_pip(encryption_id, rand::random())
    }

    /// Deterministic encode: same pip, same bytes. Callers must supply a
    /// fresh random pip per message, or the keystream repeats.
    pub fn encode_with_pip(&self, encryption_id: u8, pip: u16) -> Result<Bytes, Error> {
        let record_bytes: usize = self.records.iter().map(Record::wire_size).sum();
        let remaining = MESSAGE_OVERHEAD + record_bytes;
        let total = SIZE_MSG_LEN + remaining;
        if total > MAX_FRAME_SIZE {
            // Caller bug: the command set is fixed, nothing legitimate gets
            // near the FIFO limit.
            tracing::error!("frame of {total} bytes overflows the {MAX_FRAME_SIZE}-byte FIFO");
            return Err(Error::FrameTooLong {
                len: total,
                max: MAX_FRAME_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(total);
        buf.put_u8(remaining as u8);
        buf.put_u8(self.manufacturer_id);
        buf.put_u8(self.product_id);
        buf.put_u16(pip);
        buf.put_u8((self.sensor_id >> 16) as u8);
        buf.put_u8((self.sensor_id >> 8) as u8);
        buf.put_u8(self.sensor_id as u8);
        for record in &self.records {
            buf.put_u8(record.parameter.into());
            buf.put_u8(record.descriptor.into_bytes()[0]);
            buf.put_slice(&record.value);
        }
        buf.put_u8(Parameter::Crc.into()); // record terminator

        let crc = crc16(&buf[ENCRYPTION_START..]);
        buf.put_u16(crc);

        let mut cipher = Keystream::seed(encryption_id, pip);
        for byte in &mut buf[ENCRYPTION_START..] {
            *byte = cipher.apply(*byte);
        }
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SIZE_CRC;

    #[test]
    fn frame_layout() {
        let frame = OutboundMessage::new(0x04, 0x03, 0x000149)
            .with_record(Record::set_valve_state(ValveState::Closed))
            .encode_with_pip(0xF2, 0x0102)
            .unwrap();

        // 10 bytes overhead + 3 record bytes, plus the length byte itself.
        assert_eq!(frame.len(), 14);
        assert_eq!(frame[0], 13);
        assert_eq!(frame[1], 0x04);
        assert_eq!(frame[2], 0x03);
        assert_eq!(&frame[3..5], &[0x01, 0x02]);

        // Everything from the sensor id is scrambled; undo it and check.
        let mut cipher = Keystream::seed(0xF2, 0x0102);
        let plain: Vec<u8> = frame[ENCRYPTION_START..]
            .iter()
            .map(|&b| cipher.apply(b))
            .collect();
        assert_eq!(&plain[..3], &[0x00, 0x01, 0x49]);
        assert_eq!(plain[3], 0xA5); // set valve state
        assert_eq!(plain[4], 0x01); // unsigned, one byte
        assert_eq!(plain[5], 0x01); // closed
        assert_eq!(plain[6], 0x00); // terminator

        let crc = crc16(&plain[..plain.len() - SIZE_CRC]);
        assert_eq!(&plain[7..], &crc.to_be_bytes());
    }

    #[test]
    fn encode_is_deterministic_given_pip() {
        let msg = OutboundMessage::new(0x04, 0x03, 0x000149)
            .with_record(Record::set_reporting_interval(300));
        let a = msg.encode_with_pip(0xF2, 0xCAFE).unwrap();
        let b = msg.encode_with_pip(0xF2, 0xCAFE).unwrap();
        assert_eq!(a, b);
        let c = msg.encode_with_pip(0xF2, 0xCAFF).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut msg = OutboundMessage::new(0x04, 0x03, 0x000149);
        for _ in 0..20 {
            msg.records
                .push(Record::new(Parameter::Test, TypeCode::UInt, &[0; 4]).unwrap());
        }
        assert!(matches!(
            msg.encode_with_pip(0xF2, 0),
            Err(Error::FrameTooLong { .. })
        ));
    }

    #[test]
    fn record_value_length_capped() {
        assert!(matches!(
            Record::new(Parameter::Test, TypeCode::Chars, &[0u8; 16]),
            Err(Error::ValueTooLong(16))
        ));
    }

    #[test]
    fn temperature_is_q8_big_endian() {
        let record = Record::set_temperature(16.125);
        assert_eq!(record.descriptor().into_bytes(), [0x92]);
        assert_eq!(record.value(), &[0x10, 0x20]);
    }
}
