//! Purpose: Decode operator-authored JSON into canonical RSCP request messages.
//! Exports: `RequestDecoder`.
//! Role: The request decoder; dispatches on JSON shape, resolves names through
//! the registry, coerces values, and recurses into containers.
//! Invariants: Unresolvable tags and malformed shapes are always fatal.
//! Invariants: Scalar coercion failures are never fatal; the field degrades to
//! "no value, default datatype" and siblings are unaffected.
//! Invariants: Decoding performs no I/O and holds no mutable state.

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::message::{Message, RscpValue};
use crate::core::registry::{DataType, Registry, Tag};

/// Decoder for the three accepted request shapes: bare tag name, positional
/// tuple, and keyed object.
///
/// Holds only a borrow of the immutable [`Registry`]; construction is free and
/// a decoder may be used from any number of threads.
pub struct RequestDecoder<'a> {
    registry: &'a Registry,
}

impl<'a> RequestDecoder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Decode a single request message.
    ///
    /// Accepted shapes, dispatched on the parsed JSON kind:
    ///
    /// - `"TAG_NAME"` — bare tag, registry default datatype, no value.
    /// - `[tag]`, `[tag, datatype-or-value]`, `[tag, datatype, value]` — in the
    ///   2-element form a string second element that resolves as a datatype
    ///   name wins over the value interpretation, even if the tag could take
    ///   that string as a value; use the 3-element form to force a literal.
    ///   The `"None"` sentinel restores the tag's default datatype.
    /// - `{ "Tag": ..., "DataType": ..., "Value": ... }` — keyed form with the
    ///   same override and coercion rules.
    pub fn decode_one(&self, bytes: &[u8]) -> Result<Message, Error> {
        let raw = parse_json(bytes)?;
        self.decode_value(&raw)
    }

    /// Decode a top-level JSON array into one message per element.
    ///
    /// Each element independently runs the full single-message dispatch, so a
    /// batch may mix bare tags, tuples, and objects. The first failing element
    /// aborts the batch; there is no partial-success mode.
    pub fn decode_many(&self, bytes: &[u8]) -> Result<Vec<Message>, Error> {
        let raw = parse_json(bytes)?;
        let items = raw.as_array().ok_or_else(|| {
            Error::new(ErrorKind::Parse).with_message("batch input must be a JSON array")
        })?;
        items.iter().map(|item| self.decode_value(item)).collect()
    }

    fn decode_value(&self, raw: &Value) -> Result<Message, Error> {
        match raw {
            Value::String(name) => {
                let (tag, data_type) = self.registry.resolve_tag(name)?;
                Ok(Message::new(tag, data_type, None))
            }
            Value::Array(items) => self.decode_tuple(items),
            Value::Object(map) => self.decode_object(map),
            _ => Err(Error::new(ErrorKind::InvalidShape)
                .with_message("expected a tag name, tuple, or object")),
        }
    }

    fn decode_tuple(&self, items: &[Value]) -> Result<Message, Error> {
        if items.is_empty() {
            return Err(Error::new(ErrorKind::InvalidShape).with_message("empty tuple"));
        }
        if items.len() > 3 {
            return Err(Error::new(ErrorKind::InvalidShape)
                .with_message("tuple has more than three elements"));
        }
        let name = items[0].as_str().ok_or_else(|| {
            Error::new(ErrorKind::InvalidShape).with_message("tuple tag must be a string")
        })?;
        let (tag, default) = self.registry.resolve_tag(name)?;

        match items.len() {
            1 => Ok(Message::new(tag, default, None)),
            2 => {
                // Disambiguation: a string that resolves as a datatype name is
                // an explicit override, anything else is the value.
                if let Value::String(second) = &items[1] {
                    if let Ok(data_type) = self.registry.resolve_data_type(second) {
                        let effective = if data_type == DataType::None {
                            default
                        } else {
                            data_type
                        };
                        return Ok(Message::new(tag, effective, None));
                    }
                }
                let (data_type, value) = self.apply_value(tag, default, default, &items[1])?;
                Ok(Message::new(tag, data_type, value))
            }
            _ => {
                let type_name = items[1].as_str().ok_or_else(|| {
                    Error::new(ErrorKind::InvalidShape)
                        .with_message("tuple datatype must be a string")
                })?;
                let data_type = self.registry.resolve_data_type(type_name)?;
                if data_type == DataType::None {
                    return Err(Error::new(ErrorKind::UnknownDataType)
                        .with_message("datatype None cannot carry a value")
                        .with_name(type_name));
                }
                let (data_type, value) = self.apply_value(tag, default, data_type, &items[2])?;
                Ok(Message::new(tag, data_type, value))
            }
        }
    }

    fn decode_object(&self, map: &Map<String, Value>) -> Result<Message, Error> {
        let tag_raw = map.get("Tag").ok_or_else(|| {
            Error::new(ErrorKind::InvalidShape).with_message("missing Tag key")
        })?;
        let name = tag_raw.as_str().ok_or_else(|| {
            Error::new(ErrorKind::InvalidShape).with_message("Tag must be a string")
        })?;
        let (tag, default) = self.registry.resolve_tag(name)?;

        let mut effective = default;
        if let Some(type_raw) = map.get("DataType") {
            let type_name = type_raw.as_str().ok_or_else(|| {
                Error::new(ErrorKind::InvalidShape).with_message("DataType must be a string")
            })?;
            let data_type = self.registry.resolve_data_type(type_name)?;
            // The "None" sentinel restores the tag's default, as in the tuple form.
            if data_type != DataType::None {
                effective = data_type;
            }
        }

        match map.get("Value") {
            Some(value_raw) => {
                let (data_type, value) = self.apply_value(tag, default, effective, value_raw)?;
                Ok(Message::new(tag, data_type, value))
            }
            None => Ok(Message::new(tag, effective, None)),
        }
    }

    /// Coerce `raw` under `data_type`, returning the effective datatype and value.
    ///
    /// Containers recurse through the full shape dispatch and any element
    /// failure is fatal. Scalar coercion failure degrades the field to the
    /// tag's default datatype with no value.
    fn apply_value(
        &self,
        tag: Tag,
        default: DataType,
        data_type: DataType,
        raw: &Value,
    ) -> Result<(DataType, Option<RscpValue>), Error> {
        if data_type == DataType::Container {
            let items = raw.as_array().ok_or_else(|| {
                Error::new(ErrorKind::InvalidShape)
                    .with_message("container value must be an array")
                    .with_name(tag.name())
            })?;
            let messages = items
                .iter()
                .map(|item| self.decode_value(item))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok((DataType::Container, Some(RscpValue::Container(messages))));
        }

        match self.registry.coerce(data_type, raw) {
            Ok(value) => Ok((data_type, Some(value))),
            Err(err) if err.kind() == ErrorKind::Coercion => {
                tracing::debug!(
                    tag = tag.name(),
                    datatype = data_type.name(),
                    "value coercion failed; field degrades to default type with no value"
                );
                Ok((default, None))
            }
            Err(err) => Err(err),
        }
    }
}

fn parse_json(bytes: &[u8]) -> Result<Value, Error> {
    serde_json::from_slice(bytes).map_err(|err| {
        Error::new(ErrorKind::Parse)
            .with_message("input is not well-formed JSON")
            .with_source(err)
    })
}
