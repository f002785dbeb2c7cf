//! Binary store header: bit-exact layout, byte-order handling.
//!
//! ```text
//! offset 0..4   : magic = 0x029FE862, big-endian u32
//! offset 4      : byte-order flag, 1 byte (1 = little-endian, 0 = big-endian)
//! offset 5..9   : object_size, u32 in the store's own byte order
//! offset 9..13  : max_position, u32 in the store's own byte order
//! offset 13..   : fixed-width records, each object_size bytes
//! ```

use crate::error::{StoreError, StoreResult};

/// Magic number identifying a valid element store file.
pub const STORE_MAGIC: u32 = 44_034_146; // 0x029FE862

/// Length of the on-disk header in bytes.
pub const HEADER_LEN: usize = 13;

/// Absolute offset of the first record, immediately after the header.
pub const BEGIN_POSITION: u64 = HEADER_LEN as u64;

/// Byte order of the multi-byte header fields and of offsets derived from
/// them.
///
/// The order is chosen once at store creation (the machine's native order)
/// and baked into the header; reopening the store on a machine with a
/// different native order keeps reading the persisted order. Carrying it as
/// an explicit field rather than relying on implicit platform defaults keeps
/// the format deterministic across platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreByteOrder {
    LittleEndian,
    BigEndian,
}

impl StoreByteOrder {
    /// The byte order of the machine this code runs on.
    pub fn native() -> StoreByteOrder {
        if cfg!(target_endian = "little") {
            StoreByteOrder::LittleEndian
        } else {
            StoreByteOrder::BigEndian
        }
    }

    /// Encodes the order as the single-byte header flag.
    pub fn flag(self) -> u8 {
        match self {
            StoreByteOrder::LittleEndian => 1,
            StoreByteOrder::BigEndian => 0,
        }
    }

    /// Decodes the single-byte header flag.
    pub fn from_flag(flag: u8) -> StoreByteOrder {
        if flag == 0 {
            StoreByteOrder::BigEndian
        } else {
            StoreByteOrder::LittleEndian
        }
    }

    /// Reads a `u32` stored in this byte order.
    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            StoreByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            StoreByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    /// Writes a `u32` in this byte order.
    pub fn write_u32(self, value: u32) -> [u8; 4] {
        match self {
            StoreByteOrder::LittleEndian => value.to_le_bytes(),
            StoreByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

/// Decoded form of the 13-byte store header.
///
/// Written once at creation and rewritten on every flush/close to persist
/// the current high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
    /// Byte order of `object_size` and `max_position`. The magic is always
    /// big-endian.
    pub byte_order: StoreByteOrder,
    /// Fixed record width in bytes.
    pub object_size: u32,
    /// Absolute offset one past the last committed record.
    pub max_position: u32,
}

impl StoreHeader {
    /// Header for a freshly created, empty store in native byte order.
    pub fn new(object_size: u32) -> StoreHeader {
        StoreHeader {
            byte_order: StoreByteOrder::native(),
            object_size,
            max_position: BEGIN_POSITION as u32,
        }
    }

    /// Encodes the header into its bit-exact 13-byte layout.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&STORE_MAGIC.to_be_bytes());
        bytes[4] = self.byte_order.flag();
        bytes[5..9].copy_from_slice(&self.byte_order.write_u32(self.object_size));
        bytes[9..13].copy_from_slice(&self.byte_order.write_u32(self.max_position));
        bytes
    }

    /// Decodes and validates a 13-byte header.
    ///
    /// Fails with [`StoreError::UnrecognizedFormat`] when the magic does not
    /// match.
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> StoreResult<StoreHeader> {
        let magic = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != STORE_MAGIC {
            return Err(StoreError::UnrecognizedFormat { found: magic });
        }
        let byte_order = StoreByteOrder::from_flag(bytes[4]);
        let object_size = byte_order.read_u32([bytes[5], bytes[6], bytes[7], bytes[8]]);
        let max_position = byte_order.read_u32([bytes[9], bytes[10], bytes[11], bytes[12]]);
        Ok(StoreHeader {
            byte_order,
            object_size,
            max_position,
        })
    }
}
