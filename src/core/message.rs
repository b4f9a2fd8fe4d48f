//! Purpose: Define the decoded request message model and its JSON rendering.
//! Exports: `Message`, `RscpValue`, `message_json`, `messages_json`.
//! Role: Output side of the request decoder; consumed by the CLI and by
//! whatever protocol layer eventually serializes messages to the wire.
//! Invariants: A `Container` datatype always pairs with `RscpValue::Container`.
//! Invariants: Rendering mirrors the canonical keyed input form (`Tag`/`DataType`/`Value`).

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::registry::{DataType, Tag};

/// Native value union for a decoded message, one variant per scalar shape
/// plus nested containers.
#[derive(Clone, Debug, PartialEq)]
pub enum RscpValue {
    Bool(bool),
    Char8(i8),
    UChar8(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Float32(f32),
    Double64(f64),
    Bitfield(u8),
    CString(String),
    Container(Vec<Message>),
    Timestamp(OffsetDateTime),
    ByteArray(Vec<u8>),
    ErrorCode(u32),
}

/// One decoded protocol message: tag, effective datatype, optional value.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub tag: Tag,
    pub data_type: DataType,
    pub value: Option<RscpValue>,
}

impl Message {
    pub fn new(tag: Tag, data_type: DataType, value: Option<RscpValue>) -> Self {
        Self {
            tag,
            data_type,
            value,
        }
    }

    /// A value-less request message carrying the tag's registry default type.
    pub fn request(tag: Tag) -> Self {
        Self::new(tag, tag.default_data_type(), None)
    }
}

/// Render one decoded message in the canonical keyed form.
pub fn message_json(message: &Message) -> Value {
    let mut map = Map::new();
    map.insert("Tag".to_string(), json!(message.tag.name()));
    map.insert("DataType".to_string(), json!(message.data_type.name()));
    if let Some(value) = &message.value {
        map.insert("Value".to_string(), value_json(value));
    }
    Value::Object(map)
}

pub fn messages_json(messages: &[Message]) -> Value {
    Value::Array(messages.iter().map(message_json).collect())
}

fn value_json(value: &RscpValue) -> Value {
    match value {
        RscpValue::Bool(value) => json!(value),
        RscpValue::Char8(value) => json!(value),
        RscpValue::UChar8(value) => json!(value),
        RscpValue::Int16(value) => json!(value),
        RscpValue::UInt16(value) => json!(value),
        RscpValue::Int32(value) => json!(value),
        RscpValue::UInt32(value) => json!(value),
        RscpValue::Int64(value) => json!(value),
        RscpValue::UInt64(value) => json!(value),
        RscpValue::Float32(value) => json!(f64::from(*value)),
        RscpValue::Double64(value) => json!(value),
        RscpValue::Bitfield(value) => json!(value),
        RscpValue::CString(value) => json!(value),
        RscpValue::Container(messages) => messages_json(messages),
        RscpValue::Timestamp(ts) => match ts.format(&Rfc3339) {
            Ok(text) => json!(text),
            // Rfc3339 only rejects years outside 0-9999, which the decoder
            // cannot produce; fall back to the raw epoch seconds anyway.
            Err(_) => json!(ts.unix_timestamp()),
        },
        RscpValue::ByteArray(bytes) => json!(bytes),
        RscpValue::ErrorCode(code) => json!(code),
    }
}
