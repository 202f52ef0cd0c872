use std::io::{Cursor, Error as IoError, ErrorKind, Result as IoResult};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Create a new ByteBuffer from bytes
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Create an empty ByteBuffer with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Get current cursor position
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Set cursor position
    pub fn set_position(&mut self, pos: usize) -> IoResult<()> {
        if pos > self.buffer.len() {
            return Err(self.out_of_range(pos));
        }
        self.cursor = pos;
        Ok(())
    }

    /// Get remaining bytes from current position
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    /// Check if buffer has at least n bytes remaining
    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    fn out_of_range(&self, pos: usize) -> IoError {
        IoError::new(
            ErrorKind::UnexpectedEof,
            format!("position {} out of range", pos),
        )
    }

    fn check(&self, n: usize) -> IoResult<()> {
        if !self.has_remaining(n) {
            return Err(self.out_of_range(self.cursor + n));
        }
        Ok(())
    }

    /// Read bytes from the cursor
    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        self.check(len)?;
        let bytes = self.buffer[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        Ok(bytes)
    }

    /// Read a fixed-length UTF-8 string
    pub fn read_string(&mut self, len: usize) -> IoResult<String> {
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes)
            .map_err(|e| IoError::new(ErrorKind::InvalidData, format!("invalid UTF-8: {}", e)))
    }

    /// Append bytes to the buffer
    pub fn write_bytes(&mut self, data: &[u8]) -> IoResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Read u8
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.check(1)?;
        let value = self.buffer[self.cursor];
        self.cursor += 1;
        Ok(value)
    }

    /// Write u8
    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.buffer.push(value);
        Ok(())
    }

    /// Read u16 (big endian)
    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        self.check(2)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Write u16 (big endian)
    pub fn write_u16_be(&mut self, value: u16) -> IoResult<()> {
        self.buffer.write_u16::<BigEndian>(value)
    }

    /// Read i16 (big endian)
    pub fn read_i16_be(&mut self) -> IoResult<i16> {
        self.check(2)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_i16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Write i16 (big endian)
    pub fn write_i16_be(&mut self, value: i16) -> IoResult<()> {
        self.buffer.write_i16::<BigEndian>(value)
    }

    /// Read u24 (big endian)
    pub fn read_u24_be(&mut self) -> IoResult<u32> {
        self.check(3)?;
        let b = &self.buffer[self.cursor..];
        let value = (b[0] as u32) << 16 | (b[1] as u32) << 8 | b[2] as u32;
        self.cursor += 3;
        Ok(value)
    }

    /// Write u24 (big endian); the top byte of the value is discarded
    pub fn write_u24_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.push((value >> 16) as u8);
        self.buffer.push((value >> 8) as u8);
        self.buffer.push(value as u8);
        Ok(())
    }

    /// Read i24 (big endian), sign extended
    pub fn read_i24_be(&mut self) -> IoResult<i32> {
        let v = self.read_u24_be()?;
        Ok(((v << 8) as i32) >> 8)
    }

    /// Write i24 (big endian)
    pub fn write_i24_be(&mut self, value: i32) -> IoResult<()> {
        self.write_u24_be(value as u32 & 0xFF_FFFF)
    }

    /// Read u32 (big endian)
    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        self.check(4)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Write u32 (big endian)
    pub fn write_u32_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<BigEndian>(value)
    }

    /// Read u32 (little endian) - the RTMP message stream id is the
    /// single little-endian field in the protocol
    pub fn read_u32_le(&mut self) -> IoResult<u32> {
        self.check(4)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u32::<LittleEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Write u32 (little endian)
    pub fn write_u32_le(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<LittleEndian>(value)
    }

    /// Read u40 (big endian)
    pub fn read_u40_be(&mut self) -> IoResult<u64> {
        self.check(5)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_uint::<BigEndian>(5)?;
        self.cursor += 5;
        Ok(value)
    }

    /// Write u40 (big endian)
    pub fn write_u40_be(&mut self, value: u64) -> IoResult<()> {
        self.buffer.write_uint::<BigEndian>(value & 0xFF_FFFF_FFFF, 5)
    }

    /// Read u48 (big endian)
    pub fn read_u48_be(&mut self) -> IoResult<u64> {
        self.check(6)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_uint::<BigEndian>(6)?;
        self.cursor += 6;
        Ok(value)
    }

    /// Write u48 (big endian)
    pub fn write_u48_be(&mut self, value: u64) -> IoResult<()> {
        self.buffer.write_uint::<BigEndian>(value & 0xFFFF_FFFF_FFFF, 6)
    }

    /// Read u64 (big endian)
    pub fn read_u64_be(&mut self) -> IoResult<u64> {
        self.check(8)?;
        let mut cursor = Cursor::new(&self.buffer[self.cursor..]);
        let value = cursor.read_u64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    /// Write u64 (big endian)
    pub fn write_u64_be(&mut self, value: u64) -> IoResult<()> {
        self.buffer.write_u64::<BigEndian>(value)
    }

    /// Read i64 (big endian)
    pub fn read_i64_be(&mut self) -> IoResult<i64> {
        Ok(self.read_u64_be()? as i64)
    }

    /// Write i64 (big endian)
    pub fn write_i64_be(&mut self, value: i64) -> IoResult<()> {
        self.write_u64_be(value as u64)
    }

    /// Read f64 (big endian)
    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        Ok(f64::from_bits(self.read_u64_be()?))
    }

    /// Write f64 (big endian)
    pub fn write_f64_be(&mut self, value: f64) -> IoResult<()> {
        self.write_u64_be(value.to_bits())
    }

    /// Get all bytes as Vec
    pub fn to_vec(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    /// Consume the buffer, returning the bytes
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    /// Get slice of underlying buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Clear buffer and reset cursor
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Get length of buffer
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_u8() {
        let mut buffer = ByteBuffer::with_capacity(10);
        buffer.write_u8(0x42).unwrap();
        buffer.write_u8(0x84).unwrap();

        buffer.set_position(0).unwrap();
        assert_eq!(buffer.read_u8().unwrap(), 0x42);
        assert_eq!(buffer.read_u8().unwrap(), 0x84);
    }

    #[test]
    fn test_read_write_u24() {
        let mut buffer = ByteBuffer::with_capacity(8);
        buffer.write_u24_be(0x123456).unwrap();
        buffer.write_i24_be(-2).unwrap();

        buffer.set_position(0).unwrap();
        assert_eq!(buffer.read_u24_be().unwrap(), 0x123456);
        assert_eq!(buffer.read_i24_be().unwrap(), -2);
    }

    #[test]
    fn test_read_write_u32_le() {
        let mut buffer = ByteBuffer::with_capacity(4);
        buffer.write_u32_le(1).unwrap();
        assert_eq!(buffer.as_slice(), &[0x01, 0x00, 0x00, 0x00]);

        buffer.set_position(0).unwrap();
        assert_eq!(buffer.read_u32_le().unwrap(), 1);
    }

    #[test]
    fn test_wide_integers() {
        let mut buffer = ByteBuffer::with_capacity(24);
        buffer.write_u40_be(0x01_0203_0405).unwrap();
        buffer.write_u48_be(0x0102_0304_0506).unwrap();
        buffer.write_u64_be(0x0102_0304_0506_0708).unwrap();

        buffer.set_position(0).unwrap();
        assert_eq!(buffer.read_u40_be().unwrap(), 0x01_0203_0405);
        assert_eq!(buffer.read_u48_be().unwrap(), 0x0102_0304_0506);
        assert_eq!(buffer.read_u64_be().unwrap(), 0x0102_0304_0506_0708);
    }

    #[test]
    fn test_boundary_checks() {
        let data = vec![1, 2];
        let mut buffer = ByteBuffer::new(data);

        assert!(buffer.read_u16_be().is_ok());

        let err = buffer.read_u32_be().unwrap_err();
        assert!(err.to_string().contains("out of range"));
        // cursor untouched after a failed read
        assert_eq!(buffer.position(), 2);
    }

    #[test]
    fn test_f64_round_trip() {
        let mut buffer = ByteBuffer::with_capacity(8);
        buffer.write_f64_be(1935.5).unwrap();
        buffer.set_position(0).unwrap();
        assert_eq!(buffer.read_f64_be().unwrap(), 1935.5);
    }
}
