use crate::amf::{encode_amf0_values, parse_amf_values, Amf0Value, AmfObject};
use crate::protocol::message::RtmpMessage;
use crate::{Error, Result};

/// A decoded RTMP command: name, transaction id, the command object, and
/// any trailing parameters.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub transaction_id: f64,
    pub object: Option<AmfObject>,
    pub params: Vec<Amf0Value>,
}

impl Command {
    pub fn new(name: impl Into<String>, transaction_id: f64) -> Self {
        Command {
            name: name.into(),
            transaction_id,
            object: None,
            params: Vec::new(),
        }
    }

    /// Parse a command message body. Returns `None` for non-command
    /// message types.
    pub fn from_message(msg: &RtmpMessage) -> Result<Option<Command>> {
        if !msg.is_command() {
            return Ok(None);
        }
        let amf3 = msg.type_id == crate::protocol::constants::MSG_TYPE_COMMAND_AMF3;
        let values = parse_amf_values(&msg.data, amf3)?;
        Ok(Some(Command::from_values(values)?))
    }

    pub fn from_values(mut values: Vec<Amf0Value>) -> Result<Command> {
        if values.len() < 2 {
            return Err(Error::command("command needs a name and transaction id"));
        }
        let rest = values.split_off(2);
        let mut it = values.into_iter();

        let name = match it.next() {
            Some(Amf0Value::String(s)) | Some(Amf0Value::LongString(s)) => s,
            _ => return Err(Error::command("command name is not a string")),
        };
        let transaction_id = match it.next() {
            Some(Amf0Value::Number(n)) => n,
            _ => return Err(Error::command("transaction id is not a number")),
        };

        let mut rest = rest.into_iter();
        let object = match rest.next() {
            Some(Amf0Value::Object(obj)) | Some(Amf0Value::EcmaArray(obj)) => Some(obj),
            Some(_) | None => None,
        };
        let params = rest.collect();

        Ok(Command {
            name,
            transaction_id,
            object,
            params,
        })
    }

    /// First parameter interpreted as a string (e.g. the publish/play key)
    pub fn param_string(&self, index: usize) -> Option<&str> {
        self.params.get(index).and_then(|v| v.as_string())
    }

    /// First parameter interpreted as a number (e.g. the createStream
    /// result's message stream id)
    pub fn param_number(&self, index: usize) -> Option<f64> {
        self.params.get(index).and_then(|v| v.as_number())
    }

    /// First parameter interpreted as an object (e.g. onStatus info)
    pub fn param_object(&self, index: usize) -> Option<&AmfObject> {
        self.params.get(index).and_then(|v| v.as_object())
    }
}

/// Serialize a command value run into AMF0 bytes. The object slot is
/// `Null` when absent, matching the wire convention.
pub fn encode_command<'a>(
    name: &str,
    transaction_id: f64,
    object: Option<&AmfObject>,
    params: impl IntoIterator<Item = &'a Amf0Value>,
) -> Result<Vec<u8>> {
    let mut values = vec![
        Amf0Value::String(name.to_string()),
        Amf0Value::Number(transaction_id),
    ];
    values.push(match object {
        Some(obj) => Amf0Value::Object(obj.clone()),
        None => Amf0Value::Null,
    });
    values.extend(params.into_iter().cloned());
    encode_amf0_values(values.iter())
}
