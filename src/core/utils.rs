use std::io::{self, Write};

/// Binary I/O trait for writing little-endian values
///
/// The record codec writes every multi-byte field through these helpers so
/// that one byte order is used for all intermediate streams.
///
/// # Example
/// ```
/// use ferrous_emit::core::utils::BinaryWrite;
///
/// let mut buffer = Vec::new();
/// buffer.write_i32_le(-1).unwrap();
/// buffer.write_u8_le(0x05).unwrap();
/// assert_eq!(buffer, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x05]);
/// ```
pub trait BinaryWrite: Write {
    /// Write an i32 in little-endian format
    #[inline]
    fn write_i32_le(&mut self, val: i32) -> io::Result<()> {
        self.write_all(&val.to_le_bytes())
    }

    /// Write a u8 (single byte)
    #[inline]
    fn write_u8_le(&mut self, val: u8) -> io::Result<()> {
        self.write_all(&[val])
    }

    /// Write a length-prefixed byte field (i32 length, then the bytes)
    #[inline]
    fn write_bytes_le(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = i32::try_from(bytes.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("field of {} bytes does not fit a 32-bit length", bytes.len()),
            )
        })?;
        self.write_i32_le(len)?;
        self.write_all(bytes)
    }
}

/// Blanket implementation for all types that implement Write
impl<W: Write + ?Sized> BinaryWrite for W {}

/// Decode a little-endian i32 from the first four bytes of `bytes`.
#[inline]
pub fn i32_from_le(bytes: &[u8]) -> i32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    i32::from_le_bytes(raw)
}
