//! Wire data types understood by the host

use serde::{Deserialize, Serialize};

/// Data types a definition field can be packed as.
/// Maps to SimConnect's `SIMCONNECT_DATATYPE` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum DataType {
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// NUL-padded string, 8 bytes
    String8,
    /// NUL-padded string, 32 bytes
    String32,
    /// NUL-padded string, 64 bytes
    String64,
    /// NUL-padded string, 128 bytes
    String128,
    /// NUL-padded string, 256 bytes
    String256,
    /// NUL-padded string, 260 bytes (MAX_PATH)
    String260,
}

impl DataType {
    /// Returns the `SIMCONNECT_DATATYPE` value sent to the host.
    pub const fn wire_code(&self) -> u32 {
        match self {
            DataType::Int32 => 1,
            DataType::Int64 => 2,
            DataType::Float32 => 3,
            DataType::Float64 => 4,
            DataType::String8 => 5,
            DataType::String32 => 6,
            DataType::String64 => 7,
            DataType::String128 => 8,
            DataType::String256 => 9,
            DataType::String260 => 10,
        }
    }

    /// Returns the packed size in bytes of this data type.
    pub const fn size(&self) -> usize {
        match self {
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
            DataType::String8 => 8,
            DataType::String32 => 32,
            DataType::String64 => 64,
            DataType::String128 => 128,
            DataType::String256 => 256,
            DataType::String260 => 260,
        }
    }

    /// Whether this is one of the fixed-length string types.
    pub const fn is_string(&self) -> bool {
        matches!(
            self,
            DataType::String8
                | DataType::String32
                | DataType::String64
                | DataType::String128
                | DataType::String256
                | DataType::String260
        )
    }

    /// Read one value of this type from `data` at `offset`.
    pub fn read(&self, data: &[u8], offset: usize) -> crate::Result<FieldValue> {
        let bytes = offset
            .checked_add(self.size())
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| {
                crate::SimError::decode_error(
                    "reply payload",
                    format!(
                        "{:?} at offset {} needs {} bytes, payload has {}",
                        self,
                        offset,
                        self.size(),
                        data.len()
                    ),
                )
            })?;

        let value = match self {
            DataType::Int32 => FieldValue::Int32(i32::from_le_bytes(fixed(bytes))),
            DataType::Int64 => FieldValue::Int64(i64::from_le_bytes(fixed(bytes))),
            DataType::Float32 => FieldValue::Float32(f32::from_le_bytes(fixed(bytes))),
            DataType::Float64 => FieldValue::Float64(f64::from_le_bytes(fixed(bytes))),
            _ => FieldValue::Text(read_c_string(bytes)),
        };
        Ok(value)
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum FieldValue {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
}

/// Decode a NUL-padded byte buffer, stopping at the first NUL.
pub(crate) fn read_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

// Callers slice exactly N bytes before calling.
fn fixed<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_simconnect() {
        assert_eq!(DataType::Float64.size(), 8);
        assert_eq!(DataType::String256.size(), 256);
        assert_eq!(DataType::String260.size(), 260);
        assert_eq!(DataType::Int32.size(), 4);
    }

    #[test]
    fn wire_codes_match_simconnect() {
        assert_eq!(DataType::Float64.wire_code(), 4);
        assert_eq!(DataType::String256.wire_code(), 9);
    }

    #[test]
    fn reads_little_endian_float() {
        let data = 47.5f64.to_le_bytes();
        assert_eq!(DataType::Float64.read(&data, 0).unwrap(), FieldValue::Float64(47.5));
    }

    #[test]
    fn string_stops_at_first_nul() {
        let mut data = [0u8; 8];
        data[..3].copy_from_slice(b"abc");
        data[4] = b'z';
        assert_eq!(DataType::String8.read(&data, 0).unwrap(), FieldValue::Text("abc".into()));
    }

    #[test]
    fn unterminated_string_uses_whole_buffer() {
        let data = *b"ABCDEFGH";
        assert_eq!(
            DataType::String8.read(&data, 0).unwrap(),
            FieldValue::Text("ABCDEFGH".into())
        );
    }

    #[test]
    fn short_buffer_is_a_decode_error() {
        let data = [0u8; 6];
        let err = DataType::Float64.read(&data, 0).unwrap_err();
        assert!(matches!(err, crate::SimError::Decode { .. }));
    }

    #[test]
    fn offset_overflow_is_a_decode_error() {
        let data = [0u8; 8];
        assert!(DataType::Int32.read(&data, usize::MAX - 1).is_err());
    }
}
