/// AMF0 type markers
pub mod markers {
    pub const NUMBER: u8 = 0x00;
    pub const BOOLEAN: u8 = 0x01;
    pub const STRING: u8 = 0x02;
    pub const OBJECT: u8 = 0x03;
    pub const MOVIE_CLIP: u8 = 0x04; // deprecated
    pub const NULL: u8 = 0x05;
    pub const UNDEFINED: u8 = 0x06;
    pub const REFERENCE: u8 = 0x07; // not supported, decode error
    pub const ECMA_ARRAY: u8 = 0x08;
    pub const OBJECT_END: u8 = 0x09;
    pub const STRICT_ARRAY: u8 = 0x0A;
    pub const DATE: u8 = 0x0B;
    pub const LONG_STRING: u8 = 0x0C;
}

/// AMF0 data types
#[derive(Debug, Clone, PartialEq)]
pub enum Amf0Value {
    Number(f64),
    Boolean(bool),
    String(String),
    LongString(String),
    Object(AmfObject),
    EcmaArray(AmfObject),
    Array(Vec<Amf0Value>),
    /// Milliseconds since epoch plus a timezone field that is always 0 on
    /// the wire
    Date(f64, i16),
    Null,
    Undefined,
    /// Produced by AMF3 ingress only; AMF0 has no byte-array marker
    ByteArray(Vec<u8>),
}

impl Amf0Value {
    /// Extract number value
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Amf0Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract string reference
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Amf0Value::String(s) | Amf0Value::LongString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Extract boolean value
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Amf0Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract object reference (objects and ecma arrays share the shape)
    pub fn as_object(&self) -> Option<&AmfObject> {
        match self {
            Amf0Value::Object(obj) | Amf0Value::EcmaArray(obj) => Some(obj),
            _ => None,
        }
    }

    /// Extract strict array reference
    pub fn as_array(&self) -> Option<&Vec<Amf0Value>> {
        match self {
            Amf0Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Check if null or undefined
    pub fn is_null(&self) -> bool {
        matches!(self, Amf0Value::Null | Amf0Value::Undefined)
    }
}

impl From<f64> for Amf0Value {
    fn from(v: f64) -> Self {
        Amf0Value::Number(v)
    }
}

impl From<i32> for Amf0Value {
    fn from(v: i32) -> Self {
        Amf0Value::Number(v as f64)
    }
}

impl From<u32> for Amf0Value {
    fn from(v: u32) -> Self {
        Amf0Value::Number(v as f64)
    }
}

impl From<bool> for Amf0Value {
    fn from(v: bool) -> Self {
        Amf0Value::Boolean(v)
    }
}

impl From<&str> for Amf0Value {
    fn from(v: &str) -> Self {
        Amf0Value::String(v.to_string())
    }
}

impl From<String> for Amf0Value {
    fn from(v: String) -> Self {
        Amf0Value::String(v)
    }
}

impl From<AmfObject> for Amf0Value {
    fn from(v: AmfObject) -> Self {
        Amf0Value::Object(v)
    }
}

/// Ordered key/value list. Object property order is significant on the
/// wire, so this preserves insertion order; lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmfObject(Vec<(String, Amf0Value)>);

impl AmfObject {
    pub fn new() -> Self {
        AmfObject(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the first value stored under the key
    pub fn get(&self, key: &str) -> Option<&Amf0Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a string property, trying the exact key then its lowercase form
    /// (encoders disagree on the casing of tcUrl/pageUrl/flashVer)
    pub fn get_string_fold(&self, key: &str) -> Option<&str> {
        self.get(key)
            .or_else(|| self.get(&key.to_lowercase()))
            .and_then(|v| v.as_string())
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_string())
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_number())
    }

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_boolean())
    }

    /// Set a key, replacing the first existing entry in place so the wire
    /// order is stable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Amf0Value>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.0.push((key, value));
        }
        self
    }

    /// Builder-style set for literal object construction
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Amf0Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Amf0Value)> {
        self.0.iter()
    }
}

impl FromIterator<(String, Amf0Value)> for AmfObject {
    fn from_iter<T: IntoIterator<Item = (String, Amf0Value)>>(iter: T) -> Self {
        AmfObject(iter.into_iter().collect())
    }
}
