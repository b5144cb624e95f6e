use clap::{Args, Parser, Subcommand};
use openthings_lib::ook::{self, ADDRESS_SIZE};
use openthings_lib::{Decoder, DecoderConfig, OutboundMessage, Record, ValveState};
use std::error::Error;

/// Work with OpenThings frames offline: encode gateway commands, decode
/// captured frames, and build legacy on/off bursts.
#[derive(Parser)]
#[command(name = "openthings-cli", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Identifiers shared by the encode and decode paths. Defaults match the
/// Energenie eTRV deployment.
#[derive(Args)]
struct Ids {
    #[arg(long, default_value = "0x04", value_parser = parse_int)]
    manufacturer_id: u8,

    #[arg(long, default_value = "0x03", value_parser = parse_int)]
    product_id: u8,

    /// 24-bit device sensor id.
    #[arg(long, default_value = "0x149", value_parser = parse_int32)]
    sensor_id: u32,

    #[arg(long, default_value = "0xF2", value_parser = parse_int)]
    encryption_id: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Encode an outbound command message and print the frame as hex.
    Encode {
        #[command(flatten)]
        ids: Ids,

        /// Fixed pip for reproducible output; omit for a random one.
        #[arg(long, value_parser = parse_int16)]
        pip: Option<u16>,

        #[command(subcommand)]
        message: EncodeCommand,
    },
    /// Run a hex frame dump through the decoder and print the result.
    Decode {
        #[command(flatten)]
        ids: Ids,

        /// The frame bytes as hex, length byte first.
        frame: String,
    },
    /// Build a legacy on/off switch frame and print it as hex.
    Switch {
        /// The 10-byte socket group address as hex.
        #[arg(long)]
        address: String,

        /// Socket number 1-4, or 0 for every socket on the address.
        #[arg(long, default_value_t = 0)]
        socket: u8,

        #[arg(long)]
        off: bool,
    },
}

#[derive(Subcommand)]
enum EncodeCommand {
    /// Empty message; keeps a listening device awake with nothing queued.
    Nil,
    /// Acknowledge a device's join request.
    JoinResponse,
    /// Ask the device to identify itself.
    Identify,
    /// Set the target temperature in degrees Celsius.
    Temperature { celsius: f32 },
    /// Force the valve open or closed, or back to normal operation.
    ValveState {
        #[arg(value_parser = ["open", "closed", "normal"])]
        state: String,
    },
    /// Toggle low power mode.
    LowPower { enabled: bool },
    /// Set the seconds between periodic reports.
    ReportingInterval { seconds: u16 },
    /// Request battery voltage.
    RequestVoltage,
    /// Request the diagnostic flags.
    RequestDiagnostics,
    /// Run the valve across its travel and report diagnostics.
    ExerciseValve,
}

fn parse_int(s: &str) -> Result<u8, String> {
    parse_int32(s)?
        .try_into()
        .map_err(|_| format!("{s} does not fit in a byte"))
}

fn parse_int16(s: &str) -> Result<u16, String> {
    parse_int32(s)?
        .try_into()
        .map_err(|_| format!("{s} does not fit in 16 bits"))
}

fn parse_int32(s: &str) -> Result<u32, String> {
    let result = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    result.map_err(|e| format!("invalid number {s}: {e}"))
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Encode { ids, pip, message } => {
            let record = match message {
                EncodeCommand::Nil => None,
                EncodeCommand::JoinResponse => Some(Record::join_response()),
                EncodeCommand::Identify => Some(Record::identify()),
                EncodeCommand::Temperature { celsius } => Some(Record::set_temperature(celsius)),
                EncodeCommand::ValveState { state } => {
                    let state = match state.as_str() {
                        "open" => ValveState::Open,
                        "closed" => ValveState::Closed,
                        _ => ValveState::Normal,
                    };
                    Some(Record::set_valve_state(state))
                }
                EncodeCommand::LowPower { enabled } => Some(Record::set_low_power_mode(enabled)),
                EncodeCommand::ReportingInterval { seconds } => {
                    Some(Record::set_reporting_interval(seconds))
                }
                EncodeCommand::RequestVoltage => Some(Record::request_voltage()),
                EncodeCommand::RequestDiagnostics => Some(Record::request_diagnostics()),
                EncodeCommand::ExerciseValve => Some(Record::exercise_valve()),
            };

            let mut message =
                OutboundMessage::new(ids.manufacturer_id, ids.product_id, ids.sensor_id);
            if let Some(record) = record {
                message = message.with_record(record);
            }
            let frame = match pip {
                Some(pip) => message.encode_with_pip(ids.encryption_id, pip)?,
                None => message.encode(ids.encryption_id)?,
            };
            println!("{}", hex::encode(frame));
        }

        Command::Decode { ids, frame } => {
            let bytes = hex::decode(frame.trim())?;
            let mut decoder = Decoder::new(DecoderConfig {
                manufacturer_id: ids.manufacturer_id,
                product_id: ids.product_id,
                encryption_id: ids.encryption_id,
            });

            let mut delivered = 0;
            for byte in bytes {
                if let Some(message) = decoder.push(byte) {
                    delivered += 1;
                    println!("sensor {:#08x}", message.sensor_id);
                    if message.join_command {
                        println!("  join requested");
                    }
                    if let Some(temperature) = &message.temperature {
                        println!("  temperature {temperature}");
                    }
                    if let Some(voltage) = &message.voltage {
                        println!("  voltage {voltage}");
                    }
                    if let Some([low, high]) = message.diagnostics {
                        println!("  diagnostics {low:#04x} {high:#04x}");
                    }
                }
            }
            if delivered == 0 {
                println!("no valid message in input");
            }
            if !decoder.is_idle() {
                println!("warning: input ended mid-frame");
            }
        }

        Command::Switch {
            address,
            socket,
            off,
        } => {
            let bytes = hex::decode(address.trim())?;
            let address: [u8; ADDRESS_SIZE] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| format!("address must be {ADDRESS_SIZE} bytes of hex"))?;
            let frame = ook::switch_frame(&address, socket, !off)?;
            println!("{}", hex::encode(frame));
        }
    }
    Ok(())
}
