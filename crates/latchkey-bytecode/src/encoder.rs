//! Binary encoding and decoding utilities
//!
//! Little-endian primitives shared by the module format. Strings are
//! length-prefixed UTF-8.

use thiserror::Error;

/// Errors that can occur while decoding a module
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of input
    #[error("Unexpected end of module data at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Unknown tag byte
    #[error("Invalid tag {0:#x} at offset {1}")]
    InvalidTag(u8, usize),
}

/// Writer for the binary module format
pub struct ModuleWriter {
    pub(crate) buffer: Vec<u8>,
}

impl ModuleWriter {
    /// Create a new empty writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Current offset (length of output so far)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    /// Consume the writer and return the encoded bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a 16-bit unsigned integer
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit signed integer
    pub fn emit_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a length-prefixed UTF-8 string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Overwrite a previously emitted u32 at `offset`
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

impl Default for ModuleWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader for the binary module format
pub struct ModuleReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ModuleReader<'a> {
    /// Create a reader over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current read offset
    pub fn offset(&self) -> usize {
        self.position
    }

    /// Whether unread bytes remain
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    /// Read `count` raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if self.position + count > self.data.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = self.data[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(bytes)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        if self.position >= self.data.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    /// Read a 16-bit unsigned integer
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit unsigned integer
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 64-bit signed integer
    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let array: [u8; 8] = bytes.try_into().expect("read_bytes returned 8 bytes");
        Ok(i64::from_le_bytes(array))
    }

    /// Read a 64-bit float
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let array: [u8; 8] = bytes.try_into().expect("read_bytes returned 8 bytes");
        Ok(f64::from_le_bytes(array))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let start = self.position;
        let length = self.read_u32()? as usize;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_roundtrip() {
        let mut writer = ModuleWriter::new();
        writer.emit_u8(7);
        writer.emit_u16(1234);
        writer.emit_u32(567_890);
        writer.emit_i64(-42);
        writer.emit_f64(3.5);
        writer.emit_string("hello");

        let bytes = writer.into_bytes();
        let mut reader = ModuleReader::new(&bytes);
        assert_eq!(reader.read_u8().unwrap(), 7);
        assert_eq!(reader.read_u16().unwrap(), 1234);
        assert_eq!(reader.read_u32().unwrap(), 567_890);
        assert_eq!(reader.read_i64().unwrap(), -42);
        assert_eq!(reader.read_f64().unwrap(), 3.5);
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert!(!reader.has_more());
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = ModuleWriter::new();
        let offset = writer.offset();
        writer.emit_u32(0);
        writer.patch_u32(offset, 99);

        let bytes = writer.into_bytes();
        let mut reader = ModuleReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 99);
    }

    #[test]
    fn test_unexpected_end() {
        let mut reader = ModuleReader::new(&[1, 2]);
        assert!(matches!(
            reader.read_u32(),
            Err(DecodeError::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut writer = ModuleWriter::new();
        writer.emit_u32(2);
        writer.emit_u8(0xFF);
        writer.emit_u8(0xFE);
        let bytes = writer.into_bytes();
        let mut reader = ModuleReader::new(&bytes);
        assert!(matches!(
            reader.read_string(),
            Err(DecodeError::InvalidUtf8(0))
        ));
    }
}
