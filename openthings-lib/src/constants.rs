// Wire format constants for the OpenThings frame layout.

/// Size of the remaining-length field (1 byte)
pub const SIZE_MSG_LEN: usize = 1;

/// Size of the manufacturer id field (1 byte)
pub const SIZE_MANUFACTURER_ID: usize = 1;

/// Size of the product id field (1 byte)
pub const SIZE_PRODUCT_ID: usize = 1;

/// Size of the encryption pip (2 bytes)
pub const SIZE_ENCRYPTION_PIP: usize = 2;

/// Size of the sensor id field (3 bytes)
pub const SIZE_SENSOR_ID: usize = 3;

/// Size of a record parameter id (1 byte)
pub const SIZE_PARAM_ID: usize = 1;

/// Size of a record type descriptor (1 byte)
pub const SIZE_TYPE_DESC: usize = 1;

/// Size of the trailing checksum (2 bytes)
pub const SIZE_CRC: usize = 2;

/// Transceiver FIFO capacity. No frame, inbound or outbound, may exceed it.
pub const MAX_FRAME_SIZE: usize = 66;

/// Offset of the sensor id within a captured frame (length byte at offset 0).
/// Encryption and the CRC both start here.
pub const ENCRYPTION_START: usize =
    SIZE_MSG_LEN + SIZE_MANUFACTURER_ID + SIZE_PRODUCT_ID + SIZE_ENCRYPTION_PIP;

/// Fixed overhead counted by the remaining-length byte: every field after it
/// except the records themselves (the record terminator is included).
pub const MESSAGE_OVERHEAD: usize = SIZE_MANUFACTURER_ID
    + SIZE_PRODUCT_ID
    + SIZE_ENCRYPTION_PIP
    + SIZE_SENSOR_ID
    + SIZE_PARAM_ID
    + SIZE_CRC;
