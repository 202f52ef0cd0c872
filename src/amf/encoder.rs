use crate::amf::value::{markers, Amf0Value, AmfObject};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(1024),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.encode_number(*n),
            Amf0Value::Boolean(b) => self.encode_boolean(*b),
            Amf0Value::String(s) => self.encode_string(s),
            Amf0Value::LongString(s) => self.encode_long_string(s),
            Amf0Value::Object(obj) => self.encode_object(obj),
            Amf0Value::EcmaArray(obj) => self.encode_ecma_array(obj),
            Amf0Value::Array(arr) => self.encode_array(arr),
            Amf0Value::Date(ts, tz) => self.encode_date(*ts, *tz),
            Amf0Value::Null => self.encode_null(),
            Amf0Value::Undefined => self.encode_undefined(),
            Amf0Value::ByteArray(_) => Err(Error::amf_encode(
                "AMF0 has no byte-array marker",
            )),
        }
    }

    /// Encode a run of values back to back
    pub fn encode_all<'a>(&mut self, values: impl IntoIterator<Item = &'a Amf0Value>) -> Result<()> {
        for value in values {
            self.encode(value)?;
        }
        Ok(())
    }

    fn encode_number(&mut self, value: f64) -> Result<()> {
        self.buffer.write_u8(markers::NUMBER)?;
        self.buffer.write_f64_be(value)?;
        Ok(())
    }

    fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.buffer.write_u8(markers::BOOLEAN)?;
        self.buffer.write_u8(if value { 1 } else { 0 })?;
        Ok(())
    }

    fn encode_string(&mut self, value: &str) -> Result<()> {
        if value.len() > u16::MAX as usize {
            return self.encode_long_string(value);
        }
        self.buffer.write_u8(markers::STRING)?;
        self.write_string_no_marker(value)
    }

    fn encode_long_string(&mut self, value: &str) -> Result<()> {
        self.buffer.write_u8(markers::LONG_STRING)?;
        self.buffer.write_u32_be(value.len() as u32)?;
        self.buffer.write_bytes(value.as_bytes())?;
        Ok(())
    }

    fn encode_pairs(&mut self, obj: &AmfObject) -> Result<()> {
        for (key, value) in obj.iter() {
            if key.is_empty() {
                // an empty key would read as the terminator
                continue;
            }
            self.write_string_no_marker(key)?;
            self.encode(value)?;
        }
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    fn encode_object(&mut self, obj: &AmfObject) -> Result<()> {
        self.buffer.write_u8(markers::OBJECT)?;
        self.encode_pairs(obj)
    }

    fn encode_ecma_array(&mut self, obj: &AmfObject) -> Result<()> {
        self.buffer.write_u8(markers::ECMA_ARRAY)?;
        self.buffer.write_u32_be(obj.len() as u32)?;
        self.encode_pairs(obj)
    }

    fn encode_array(&mut self, arr: &[Amf0Value]) -> Result<()> {
        self.buffer.write_u8(markers::STRICT_ARRAY)?;
        self.buffer.write_u32_be(arr.len() as u32)?;
        for value in arr {
            self.encode(value)?;
        }
        Ok(())
    }

    fn encode_date(&mut self, timestamp: f64, timezone: i16) -> Result<()> {
        self.buffer.write_u8(markers::DATE)?;
        self.buffer.write_f64_be(timestamp)?;
        self.buffer.write_i16_be(timezone)?;
        Ok(())
    }

    fn encode_null(&mut self) -> Result<()> {
        self.buffer.write_u8(markers::NULL)?;
        Ok(())
    }

    fn encode_undefined(&mut self) -> Result<()> {
        self.buffer.write_u8(markers::UNDEFINED)?;
        Ok(())
    }

    /// Write string without type marker (object keys)
    fn write_string_no_marker(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        self.buffer.write_u16_be(bytes.len() as u16)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }

    pub fn get_bytes(&self) -> Vec<u8> {
        self.buffer.to_vec()
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Amf0Encoder::new()
    }
}

/// Serialize a run of values into a fresh byte vector
pub fn encode_amf0_values<'a>(values: impl IntoIterator<Item = &'a Amf0Value>) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    encoder.encode_all(values)?;
    Ok(encoder.into_bytes())
}
