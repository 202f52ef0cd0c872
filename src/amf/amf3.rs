//! AMF3 decoding, transcoded to the AMF0 value lattice. Reference tables
//! are deliberately rejected: RTMP traffic in the wild only exercises the
//! inline (reference bit set) forms.

use crate::amf::value::{Amf0Value, AmfObject};
use crate::{ByteBuffer, Error, Result};

mod markers {
    pub const UNDEFINED: u8 = 0x00;
    pub const NULL: u8 = 0x01;
    pub const FALSE: u8 = 0x02;
    pub const TRUE: u8 = 0x03;
    pub const INTEGER: u8 = 0x04;
    pub const DOUBLE: u8 = 0x05;
    pub const STRING: u8 = 0x06;
    pub const XML_DOC: u8 = 0x07;
    pub const DATE: u8 = 0x08;
    pub const ARRAY: u8 = 0x09;
    pub const OBJECT: u8 = 0x0A;
    pub const XML: u8 = 0x0B;
    pub const BYTE_ARRAY: u8 = 0x0C;
}

pub struct Amf3Decoder<'a> {
    buffer: &'a mut ByteBuffer,
}

impl<'a> Amf3Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf3Decoder { buffer }
    }

    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    pub fn decode(&mut self) -> Result<Amf0Value> {
        let marker = self.buffer.read_u8()?;
        match marker {
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::NULL => Ok(Amf0Value::Null),
            markers::FALSE => Ok(Amf0Value::Boolean(false)),
            markers::TRUE => Ok(Amf0Value::Boolean(true)),
            markers::INTEGER => {
                let v = self.read_u29()?;
                // sign-extend from 29 bits
                let v = ((v << 3) as i32) >> 3;
                Ok(Amf0Value::Number(v as f64))
            }
            markers::DOUBLE => Ok(Amf0Value::Number(self.buffer.read_f64_be()?)),
            markers::STRING | markers::XML_DOC | markers::XML => {
                Ok(Amf0Value::String(self.read_string()?))
            }
            markers::DATE => self.decode_date(),
            markers::ARRAY => self.decode_array(),
            markers::OBJECT => self.decode_object(),
            markers::BYTE_ARRAY => self.decode_byte_array(),
            _ => Err(Error::amf_decode(format!(
                "unsupported AMF3 marker 0x{:02x}",
                marker
            ))),
        }
    }

    /// Variable 1-4 byte unsigned 29-bit integer
    fn read_u29(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..4 {
            let b = self.buffer.read_u8()?;
            if i == 3 {
                return Ok(value << 8 | b as u32);
            }
            value = value << 7 | (b & 0x7F) as u32;
            if b & 0x80 == 0 {
                return Ok(value);
            }
        }
        unreachable!()
    }

    /// U29 length with the low reference bit; a clear bit is a reference
    /// into the string table, which this decoder rejects
    fn read_length(&mut self, what: &str) -> Result<usize> {
        let v = self.read_u29()?;
        if v & 1 == 0 {
            return Err(Error::amf_decode(format!(
                "AMF3 {} references are not supported",
                what
            )));
        }
        Ok((v >> 1) as usize)
    }

    fn read_string(&mut self) -> Result<String> {
        let len = self.read_length("string")?;
        self.buffer
            .read_string(len)
            .map_err(|e| Error::amf_decode(format!("AMF3 string body: {}", e)))
    }

    fn decode_date(&mut self) -> Result<Amf0Value> {
        self.read_length("date")?;
        let ms = self.buffer.read_f64_be()?;
        Ok(Amf0Value::Date(ms, 0))
    }

    fn decode_array(&mut self) -> Result<Amf0Value> {
        let dense_len = self.read_length("array")?;

        // associative part: key/value pairs up to the empty key
        let mut object = AmfObject::new();
        loop {
            let key = self.read_string()?;
            if key.is_empty() {
                break;
            }
            let value = self.decode()?;
            object.set(key, value);
        }

        if dense_len == 0 {
            return Ok(Amf0Value::EcmaArray(object));
        }

        let mut dense = Vec::with_capacity(dense_len);
        for _ in 0..dense_len {
            dense.push(self.decode()?);
        }
        if object.is_empty() {
            Ok(Amf0Value::Array(dense))
        } else {
            // mixed arrays fold the dense part into numeric keys
            for (i, v) in dense.into_iter().enumerate() {
                object.set(i.to_string(), v);
            }
            Ok(Amf0Value::EcmaArray(object))
        }
    }

    fn decode_object(&mut self) -> Result<Amf0Value> {
        let mut l = {
            let v = self.read_u29()?;
            if v & 1 == 0 {
                return Err(Error::amf_decode(
                    "AMF3 object references are not supported",
                ));
            }
            v >> 1
        };
        if l & 1 == 0 {
            return Err(Error::amf_decode(
                "AMF3 trait references are not supported",
            ));
        }
        l >>= 1;
        if l & 1 == 1 {
            return Err(Error::amf_decode(
                "AMF3 externalizable traits are not supported",
            ));
        }
        l >>= 1;
        let is_dynamic = l & 1 == 1;
        l >>= 1;
        let sealed_count = l as usize;

        // class name, unused
        let _ = self.read_string()?;

        let mut object = AmfObject::new();

        if is_dynamic {
            loop {
                let key = self.read_string()?;
                if key.is_empty() {
                    break;
                }
                let value = self.decode()?;
                object.set(key, value);
            }
        } else {
            let mut keys = Vec::with_capacity(sealed_count);
            for _ in 0..sealed_count {
                keys.push(self.read_string()?);
            }
            for key in keys {
                let value = self.decode()?;
                object.set(key, value);
            }
        }

        Ok(Amf0Value::Object(object))
    }

    fn decode_byte_array(&mut self) -> Result<Amf0Value> {
        let len = self.read_length("byte array")?;
        let bytes = self.buffer.read_bytes(len)?;
        Ok(Amf0Value::ByteArray(bytes))
    }
}

/// Parse a run of AMF values from a message body. AMF3 message bodies may
/// begin with a 0x00 escape byte meaning "the rest is plain AMF0".
pub fn parse_amf_values(data: &[u8], amf3: bool) -> Result<Vec<Amf0Value>> {
    use crate::amf::decoder::Amf0Decoder;

    let mut buffer = ByteBuffer::new(data.to_vec());
    if amf3 {
        if data.is_empty() {
            return Err(Error::amf_decode("empty AMF3 body"));
        }
        if data[0] == 0 {
            buffer.set_position(1)?;
            return Amf0Decoder::new(&mut buffer).decode_all();
        }
        let mut decoder = Amf3Decoder::new(&mut buffer);
        let mut values = Vec::new();
        while decoder.has_remaining() {
            values.push(decoder.decode()?);
        }
        return Ok(values);
    }
    Amf0Decoder::new(&mut buffer).decode_all()
}
