use crate::amf::value::{markers, Amf0Value, AmfObject};
use crate::{ByteBuffer, Error, Result};

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer }
    }

    /// Check if decoder has remaining data to decode
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::NUMBER => self.decode_number(),
            markers::BOOLEAN => self.decode_boolean(),
            markers::STRING => self.decode_string(),
            markers::OBJECT => Ok(Amf0Value::Object(self.decode_pairs()?)),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.decode_ecma_array(),
            markers::STRICT_ARRAY => self.decode_strict_array(),
            markers::DATE => self.decode_date(),
            markers::LONG_STRING => self.decode_long_string(),
            markers::REFERENCE => Err(Error::amf_decode(
                "AMF0 references are not supported",
            )),
            _ => Err(Error::amf_decode(format!(
                "unknown AMF0 marker 0x{:02x}",
                marker
            ))),
        }
    }

    /// Decode every value until the buffer is exhausted
    pub fn decode_all(&mut self) -> Result<Vec<Amf0Value>> {
        let mut values = Vec::new();
        while self.has_remaining() {
            values.push(self.decode()?);
        }
        Ok(values)
    }

    fn decode_number(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_f64_be()?;
        Ok(Amf0Value::Number(value))
    }

    fn decode_boolean(&mut self) -> Result<Amf0Value> {
        let value = self.buffer.read_u8()? != 0;
        Ok(Amf0Value::Boolean(value))
    }

    fn decode_string(&mut self) -> Result<Amf0Value> {
        let len = self.buffer.read_u16_be()? as usize;
        let string = self
            .buffer
            .read_string(len)
            .map_err(|e| Error::amf_decode(format!("string body: {}", e)))?;
        Ok(Amf0Value::String(string))
    }

    /// Null-terminated key/value list shared by objects and ecma arrays
    fn decode_pairs(&mut self) -> Result<AmfObject> {
        let mut object = AmfObject::new();
        loop {
            let name_len = self.buffer.read_u16_be()? as usize;
            if name_len == 0 {
                let end = self.buffer.read_u8()?;
                if end != markers::OBJECT_END {
                    return Err(Error::amf_decode(format!(
                        "expected object end marker, got 0x{:02x}",
                        end
                    )));
                }
                break;
            }
            let name = self
                .buffer
                .read_string(name_len)
                .map_err(|e| Error::amf_decode(format!("property name: {}", e)))?;
            let value = self.decode()?;
            object.set(name, value);
        }
        Ok(object)
    }

    fn decode_ecma_array(&mut self) -> Result<Amf0Value> {
        // The declared count is advisory; the body is null-terminated
        let _count = self.buffer.read_u32_be()?;
        Ok(Amf0Value::EcmaArray(self.decode_pairs()?))
    }

    fn decode_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.buffer.read_u32_be()? as usize;
        if count > self.buffer.remaining() {
            return Err(Error::amf_decode(format!(
                "strict array count {} exceeds remaining bytes",
                count
            )));
        }
        let mut array = Vec::with_capacity(count);
        for _ in 0..count {
            array.push(self.decode()?);
        }
        Ok(Amf0Value::Array(array))
    }

    fn decode_date(&mut self) -> Result<Amf0Value> {
        let timestamp = self.buffer.read_f64_be()?;
        let timezone = self.buffer.read_i16_be()?;
        Ok(Amf0Value::Date(timestamp, timezone))
    }

    fn decode_long_string(&mut self) -> Result<Amf0Value> {
        let len = self.buffer.read_u32_be()? as usize;
        if len > self.buffer.remaining() {
            return Err(Error::amf_decode(format!(
                "long string length {} exceeds remaining bytes",
                len
            )));
        }
        let string = self
            .buffer
            .read_string(len)
            .map_err(|e| Error::amf_decode(format!("long string body: {}", e)))?;
        Ok(Amf0Value::LongString(string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_bytes(data: &[u8]) -> Result<Amf0Value> {
        let mut buffer = ByteBuffer::new(data.to_vec());
        Amf0Decoder::new(&mut buffer).decode()
    }

    #[test]
    fn test_decode_number() {
        let data = [0x00, 0x40, 0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(decode_bytes(&data).unwrap(), Amf0Value::Number(42.0));
    }

    #[test]
    fn test_decode_string() {
        let data = [0x02, 0x00, 0x07, b'c', b'o', b'n', b'n', b'e', b'c', b't'];
        assert_eq!(
            decode_bytes(&data).unwrap(),
            Amf0Value::String("connect".to_string())
        );
    }

    #[test]
    fn test_decode_object_keeps_order() {
        // { app: "live", b: true } terminated with 00 00 09
        let data = [
            0x03, 0x00, 0x03, b'a', b'p', b'p', 0x02, 0x00, 0x04, b'l', b'i', b'v', b'e', 0x00,
            0x01, b'b', 0x01, 0x01, 0x00, 0x00, 0x09,
        ];
        let value = decode_bytes(&data).unwrap();
        let obj = value.as_object().unwrap();
        let keys: Vec<&str> = obj.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["app", "b"]);
        assert_eq!(obj.get_string("app"), Some("live"));
        assert_eq!(obj.get_boolean("b"), Some(true));
    }

    #[test]
    fn test_decode_reference_is_error() {
        let data = [0x07, 0x00, 0x01];
        assert!(matches!(
            decode_bytes(&data),
            Err(Error::AmfDecode(msg)) if msg.contains("reference")
        ));
    }

    #[test]
    fn test_decode_truncated_string() {
        let data = [0x02, 0x00, 0x10, b'x'];
        assert!(decode_bytes(&data).is_err());
    }

    #[test]
    fn test_decode_unknown_marker() {
        let data = [0x42];
        assert!(decode_bytes(&data).is_err());
    }
}
