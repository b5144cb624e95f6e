//! Incremental decoder for inbound OpenThings messages.
//!
//! The transceiver hands over one byte at a time out of its FIFO, and the
//! decoder validates as it goes: no complete message is buffered before
//! checking starts. Each state of the machine declares how many bytes its
//! wire field needs; bytes from the sensor id onward pass through the
//! keystream cipher before they are accumulated. Every abort path funnels
//! through the finish state, so a bad frame can never leave the machine
//! misaligned for the next one.

use crate::cipher::Keystream;
use crate::constants::{
    ENCRYPTION_START, MAX_FRAME_SIZE, SIZE_CRC, SIZE_ENCRYPTION_PIP, SIZE_MANUFACTURER_ID,
    SIZE_MSG_LEN, SIZE_PARAM_ID, SIZE_PRODUCT_ID, SIZE_SENSOR_ID, SIZE_TYPE_DESC,
};
use crate::crc::crc16;
use crate::param::{OutputField, Parameter};
use crate::value::{TypeDescriptor, Value};
use num_enum::FromPrimitive;
use tracing::{debug, error, info, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Decoder states, one per wire field. `Finish` doubles as the drain state
/// for frames that aborted with declared bytes still unread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Length,
    ManufacturerId,
    ProductId,
    EncryptionPip,
    SensorId,
    ParamId,
    TypeDesc,
    DataValue,
    Crc,
    Finish,
}

/// Identifiers a frame must carry to be accepted.
#[derive(Debug, Clone, Copy)]
pub struct DecoderConfig {
    pub manufacturer_id: u8,
    pub product_id: u8,
    pub encryption_id: u8,
}

/// The caller-visible outcome of decoding.
///
/// Fields are populated as the corresponding records arrive, so identifiers
/// and the join flag from a frame that later aborts remain visible through
/// [`Decoder::result`]. `available` is only set once a frame passes its CRC.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReceivedMessage {
    pub available: bool,
    pub manufacturer_id: u8,
    pub product_id: u8,
    pub sensor_id: u32,
    /// The device asked to join the network.
    pub join_command: bool,
    /// Rendered temperature report, e.g. `"24"`. Present as soon as a
    /// report record's id arrives; empty if the record carried no value.
    pub temperature: Option<String>,
    /// Diagnostic flags, low byte first.
    pub diagnostics: Option<[u8; 2]>,
    /// Rendered battery voltage.
    pub voltage: Option<String>,
}

/// Byte-at-a-time message decoder.
///
/// One instance per radio link; it must not be shared between concurrent
/// frames, since the keystream register and capture buffer belong to the
/// frame in flight.
pub struct Decoder {
    config: DecoderConfig,
    state: State,
    /// Bytes of the current frame not yet consumed, per the length field.
    bytes_remaining: usize,
    /// Raw bytes the current state still needs.
    field_bytes_needed: usize,
    field_bytes_read: usize,
    /// Big-endian accumulator for the field being read.
    value: u32,
    /// Everything read so far, already decrypted; the CRC check runs on it.
    buf: Vec<u8>,
    cipher: Keystream,
    parameter: Parameter,
    descriptor: TypeDescriptor,
    pip: u16,
    crc_passed: bool,
    result: ReceivedMessage,
    message_count: u64,
}

impl Decoder {
    pub fn new(config: DecoderConfig) -> Self {
        Decoder {
            config,
            state: State::Length,
            bytes_remaining: SIZE_MSG_LEN,
            field_bytes_needed: SIZE_MSG_LEN,
            field_bytes_read: 0,
            value: 0,
            buf: Vec::with_capacity(MAX_FRAME_SIZE),
            cipher: Keystream::seed(0, 0),
            parameter: Parameter::Crc,
            descriptor: TypeDescriptor::new(),
            pip: 0,
            crc_passed: false,
            result: ReceivedMessage::default(),
            message_count: 0,
        }
    }

    /// Fields populated so far, including by frames that later aborted.
    /// Persists across messages until [`Self::clear_result`].
    pub fn result(&self) -> &ReceivedMessage {
        &self.result
    }

    /// Clear the persistent result ahead of the next message.
    pub fn clear_result(&mut self) {
        self.result = ReceivedMessage::default();
    }

    /// True when the decoder sits between frames, awaiting a length byte.
    pub fn is_idle(&self) -> bool {
        self.state == State::Length && self.field_bytes_read == 0
    }

    /// Feed one byte from the transceiver. Returns the decoded message when
    /// this byte completes a CRC-valid frame.
    pub fn push(&mut self, byte: u8) -> Option<ReceivedMessage> {
        if self.state == State::Finish {
            // Draining the declared remainder of an aborted frame keeps the
            // next length byte aligned.
            trace!("drained {byte:#04x}");
            self.bytes_remaining -= 1;
            if self.bytes_remaining == 0 {
                self.reset_frame();
            }
            return None;
        }

        let byte = if self.in_encrypted_region() {
            self.cipher.apply(byte)
        } else {
            byte
        };
        self.buf.push(byte);
        self.value = (self.value << 8) | u32::from(byte);
        self.field_bytes_read += 1;
        self.bytes_remaining -= 1;

        if self.field_bytes_read == self.field_bytes_needed {
            self.field_bytes_read = 0;
            let delivered = self.advance();
            self.value = 0;
            if self.bytes_remaining == 0 && !matches!(self.state, State::Length | State::Finish) {
                // The declared length ran out on a field boundary with the
                // frame still unfinished. Abort without consuming another
                // byte, so the next frame's length byte stays intact.
                error!(
                    "message {}: frame ends after a {:?} field",
                    self.message_count, self.state
                );
                let _ = self.finish_frame();
            }
            return delivered;
        }

        if self.bytes_remaining == 0 {
            // The declared length ran out mid-field.
            error!(
                "message {}: frame ends inside a {:?} field",
                self.message_count, self.state
            );
            return self.finish_frame();
        }
        None
    }

    /// Force the current frame to a terminal state. Used when the byte
    /// source runs dry with a frame still in flight.
    pub fn abort(&mut self) {
        if !self.is_idle() {
            warn!(
                "message {}: aborted in state {:?}",
                self.message_count, self.state
            );
            self.crc_passed = false;
            self.bytes_remaining = 0;
            let _ = self.finish_frame();
        }
    }

    fn in_encrypted_region(&self) -> bool {
        matches!(
            self.state,
            State::SensorId | State::ParamId | State::TypeDesc | State::DataValue | State::Crc
        )
    }

    /// The current state has all its bytes; run its transition.
    fn advance(&mut self) -> Option<ReceivedMessage> {
        match self.state {
            State::Length => {
                self.on_length();
                None
            }
            State::ManufacturerId => self.on_manufacturer_id(),
            State::ProductId => self.on_product_id(),
            State::EncryptionPip => {
                self.on_encryption_pip();
                None
            }
            State::SensorId => {
                self.on_sensor_id();
                None
            }
            State::ParamId => self.on_param_id(),
            State::TypeDesc => {
                self.on_type_desc();
                None
            }
            State::DataValue => self.on_data_value(),
            State::Crc => self.on_crc(),
            State::Finish => None,
        }
    }

    fn on_length(&mut self) {
        self.message_count += 1;
        self.bytes_remaining = self.value as usize;
        self.state = State::ManufacturerId;
        self.field_bytes_needed = SIZE_MANUFACTURER_ID;
        debug!(
            "receiving message {} ({} bytes follow)",
            self.message_count, self.bytes_remaining
        );
    }

    fn on_manufacturer_id(&mut self) -> Option<ReceivedMessage> {
        if self.value as u8 == self.config.manufacturer_id {
            debug!(" manufacturer id {:#04x}", self.value);
            self.result.manufacturer_id = self.value as u8;
            self.state = State::ProductId;
            self.field_bytes_needed = SIZE_PRODUCT_ID;
            None
        } else {
            warn!(
                "manufacturer id {:#04x} is not {:#04x}, dropping frame",
                self.value, self.config.manufacturer_id
            );
            self.finish_frame()
        }
    }

    fn on_product_id(&mut self) -> Option<ReceivedMessage> {
        if self.value as u8 == self.config.product_id {
            debug!(" product id {:#04x}", self.value);
            self.result.product_id = self.value as u8;
            self.state = State::EncryptionPip;
            self.field_bytes_needed = SIZE_ENCRYPTION_PIP;
            None
        } else {
            warn!(
                "product id {:#04x} is not {:#04x}, dropping frame",
                self.value, self.config.product_id
            );
            self.finish_frame()
        }
    }

    fn on_encryption_pip(&mut self) {
        self.pip = self.value as u16;
        self.cipher = Keystream::seed(self.config.encryption_id, self.pip);
        self.state = State::SensorId;
        self.field_bytes_needed = SIZE_SENSOR_ID;
    }

    fn on_sensor_id(&mut self) {
        let sensor_id = self.value & 0x00FF_FFFF;
        debug!(" sensor id {sensor_id:#08x}");
        self.result.sensor_id = sensor_id;
        self.state = State::ParamId;
        self.field_bytes_needed = SIZE_PARAM_ID;
    }

    fn on_param_id(&mut self) -> Option<ReceivedMessage> {
        let parameter = Parameter::from_primitive(self.value as u8);
        debug!(" parameter {parameter}");
        if parameter == Parameter::Crc {
            // No more records; the checksum follows.
            self.state = State::Crc;
            self.field_bytes_needed = SIZE_CRC;
            return None;
        }
        if !parameter.is_known() {
            error!("unrecognized OpenThings parameter {:#04x}", self.value);
            return self.finish_frame();
        }
        self.parameter = parameter;
        if parameter == Parameter::JoinCommand {
            self.result.join_command = true;
        }
        // Report kinds are noted as soon as the id arrives, even when the
        // record turns out to carry no value.
        match parameter.output_field() {
            OutputField::Temperature => {
                self.result.temperature.get_or_insert_with(String::new);
            }
            OutputField::Diagnostics => {
                self.result.diagnostics.get_or_insert([0, 0]);
            }
            OutputField::Voltage => {
                self.result.voltage.get_or_insert_with(String::new);
            }
            OutputField::None => {}
        }
        self.state = State::TypeDesc;
        self.field_bytes_needed = SIZE_TYPE_DESC;
        None
    }

    fn on_type_desc(&mut self) {
        let descriptor = TypeDescriptor::from_bytes([self.value as u8]);
        self.descriptor = descriptor;
        if descriptor.length() == 0 {
            // Record carries no value; the next parameter id follows.
            self.state = State::ParamId;
            self.field_bytes_needed = SIZE_PARAM_ID;
        } else {
            self.state = State::DataValue;
            self.field_bytes_needed = usize::from(descriptor.length());
        }
    }

    fn on_data_value(&mut self) -> Option<ReceivedMessage> {
        let length = usize::from(self.descriptor.length());
        let value = Value::decode(self.value, self.descriptor.code(), length);
        debug!(" value {value}");
        if value.is_reserved() {
            error!(
                "reserved value type {} in parameter {}",
                self.descriptor.type_code(),
                self.parameter
            );
            return self.finish_frame();
        }
        match self.parameter.output_field() {
            OutputField::Temperature => self.result.temperature = Some(value.to_string()),
            OutputField::Diagnostics => {
                self.result.diagnostics =
                    Some([(self.value & 0xFF) as u8, ((self.value >> 8) & 0xFF) as u8]);
            }
            OutputField::Voltage => self.result.voltage = Some(value.to_string()),
            OutputField::None => {}
        }
        self.state = State::ParamId;
        self.field_bytes_needed = SIZE_PARAM_ID;
        None
    }

    fn on_crc(&mut self) -> Option<ReceivedMessage> {
        let expected = crc16(&self.buf[ENCRYPTION_START..self.buf.len() - SIZE_CRC]);
        let received = self.value as u16;
        if received == expected {
            debug!(" crc ok");
            self.crc_passed = true;
        } else {
            error!(
                "crc mismatch: received {received:#06x}, expected {expected:#06x} (pip {:#06x})",
                self.pip
            );
        }
        self.finish_frame()
    }

    /// Terminal handling shared by the CRC path and every abort path. A
    /// message is delivered only when the CRC matched and the declared
    /// length was fully consumed; a length field that disagrees with the
    /// frame's actual extent drops it.
    fn finish_frame(&mut self) -> Option<ReceivedMessage> {
        let delivered = if self.crc_passed && self.bytes_remaining == 0 {
            self.result.available = true;
            if let Some(temperature) = &self.result.temperature {
                info!(
                    "message {}: sensor {:#08x} temperature {temperature}",
                    self.message_count, self.result.sensor_id
                );
            }
            Some(self.result.clone())
        } else {
            None
        };

        if self.bytes_remaining > 0 {
            warn!(
                "message {}: discarding {} declared bytes after abort",
                self.message_count, self.bytes_remaining
            );
            self.state = State::Finish;
            self.buf.clear();
            self.value = 0;
            self.field_bytes_read = 0;
            self.crc_passed = false;
        } else {
            self.reset_frame();
        }
        delivered
    }

    /// Re-arm for the next frame's length byte.
    fn reset_frame(&mut self) {
        if !self.buf.is_empty() {
            trace!("frame bytes: {:02x?}", self.buf);
        }
        self.state = State::Length;
        self.bytes_remaining = SIZE_MSG_LEN;
        self.field_bytes_needed = SIZE_MSG_LEN;
        self.field_bytes_read = 0;
        self.value = 0;
        self.buf.clear();
        self.crc_passed = false;
    }
}
