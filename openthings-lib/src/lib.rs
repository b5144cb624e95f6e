pub mod cipher;
pub mod constants;
pub mod crc;
pub mod decoder;
pub mod error;
pub mod message;
pub mod ook;
pub mod param;
pub mod queue;
pub mod radio;
pub mod transport;
pub mod value;


// Re-export the types most callers touch.
pub use decoder::{Decoder, DecoderConfig, ReceivedMessage};
pub use error::Error;
pub use message::{OutboundMessage, Record};
pub use param::{Parameter, ValveState};
pub use queue::{CommandQueue, PendingCommand};
pub use radio::Radio;
pub use transport::{Modulation, StatusFlag, Transport};
pub use value::{TypeCode, Value};
