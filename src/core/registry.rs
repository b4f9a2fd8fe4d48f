//! Purpose: Provide the RSCP protocol registry: tags, datatypes, and scalar coercion.
//! Exports: `Tag`, `DataType`, `Registry`.
//! Role: Leaf dependency of the request decoder; owns every name/id table.
//! Invariants: The registry is immutable after construction and safe to share across threads.
//! Invariants: Coercion never panics; every rejected value surfaces as a `Coercion` error.
//! Notes: The tag table is a representative subset of the E3DC registry, not the full set.

use serde_json::Value;
use time::PrimitiveDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::error::{Error, ErrorKind};
use crate::core::message::RscpValue;

/// Wire timestamps are extended ISO-8601 with a fractional part and a `Z` suffix,
/// e.g. `2024-01-02T03:04:05.123456Z`. Offsets other than `Z` are rejected.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]Z");

/// Protocol tag identifiers. Discriminants are the RSCP wire ids; the upper
/// byte selects the namespace (0x00 RSCP, 0x01 EMS, 0x03 BAT, 0x05 PM, 0x0A INFO).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum Tag {
    RscpReqAuthentication = 0x0000_0001,
    RscpAuthenticationUser = 0x0000_0002,
    RscpAuthenticationPassword = 0x0000_0003,
    EmsReqPowerPv = 0x0100_0001,
    EmsReqPowerBat = 0x0100_0002,
    EmsReqPowerHome = 0x0100_0003,
    EmsReqPowerGrid = 0x0100_0004,
    EmsReqPowerAdd = 0x0100_0005,
    EmsReqBatSoc = 0x0100_0008,
    EmsReqAutarky = 0x0100_000A,
    EmsReqSelfConsumption = 0x0100_000B,
    EmsReqSetPowerMode = 0x0100_0030,
    EmsReqSetPowerValue = 0x0100_0031,
    BatReqRsoc = 0x0300_0001,
    BatReqModuleVoltage = 0x0300_0002,
    BatReqCurrent = 0x0300_0003,
    BatReqChargeCycles = 0x0300_0005,
    BatReqStatusCode = 0x0300_0009,
    BatReqDeviceState = 0x0300_0035,
    BatReqData = 0x0304_0000,
    BatIndex = 0x0304_0001,
    PmReqPowerL1 = 0x0500_0001,
    PmReqPowerL2 = 0x0500_0002,
    PmReqPowerL3 = 0x0500_0003,
    PmReqEnergyL1 = 0x0500_0004,
    PmReqEnergyL2 = 0x0500_0005,
    PmReqEnergyL3 = 0x0500_0006,
    PmReqData = 0x0504_0000,
    PmIndex = 0x0504_0001,
    InfoReqSerialNumber = 0x0A00_0001,
    InfoReqProductionDate = 0x0A00_0002,
    InfoReqMacAddress = 0x0A00_0004,
    InfoReqUtcTime = 0x0A00_0009,
    InfoReqTimeZone = 0x0A00_000A,
    InfoSetTime = 0x0A00_0010,
    InfoSetTimeZone = 0x0A00_0011,
    InfoReqSwRelease = 0x0A00_0012,
}

/// Native value representations. Discriminants are the RSCP wire ids.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum DataType {
    None = 0x00,
    Bool = 0x01,
    Char8 = 0x02,
    UChar8 = 0x03,
    Int16 = 0x04,
    UInt16 = 0x05,
    Int32 = 0x06,
    UInt32 = 0x07,
    Int64 = 0x08,
    UInt64 = 0x09,
    Float32 = 0x0A,
    Double64 = 0x0B,
    Bitfield = 0x0C,
    CString = 0x0D,
    Container = 0x0E,
    Timestamp = 0x0F,
    ByteArray = 0x10,
    Error = 0xFF,
}

// One row per tag: protocol name and the default datatype a bare request carries.
const TAG_TABLE: &[(Tag, &str, DataType)] = &[
    (Tag::RscpReqAuthentication, "RSCP_REQ_AUTHENTICATION", DataType::Container),
    (Tag::RscpAuthenticationUser, "RSCP_AUTHENTICATION_USER", DataType::CString),
    (Tag::RscpAuthenticationPassword, "RSCP_AUTHENTICATION_PASSWORD", DataType::CString),
    (Tag::EmsReqPowerPv, "EMS_REQ_POWER_PV", DataType::None),
    (Tag::EmsReqPowerBat, "EMS_REQ_POWER_BAT", DataType::None),
    (Tag::EmsReqPowerHome, "EMS_REQ_POWER_HOME", DataType::None),
    (Tag::EmsReqPowerGrid, "EMS_REQ_POWER_GRID", DataType::None),
    (Tag::EmsReqPowerAdd, "EMS_REQ_POWER_ADD", DataType::None),
    (Tag::EmsReqBatSoc, "EMS_REQ_BAT_SOC", DataType::None),
    (Tag::EmsReqAutarky, "EMS_REQ_AUTARKY", DataType::None),
    (Tag::EmsReqSelfConsumption, "EMS_REQ_SELF_CONSUMPTION", DataType::None),
    (Tag::EmsReqSetPowerMode, "EMS_REQ_SET_POWER_MODE", DataType::UChar8),
    (Tag::EmsReqSetPowerValue, "EMS_REQ_SET_POWER_VALUE", DataType::Int32),
    (Tag::BatReqRsoc, "BAT_REQ_RSOC", DataType::None),
    (Tag::BatReqModuleVoltage, "BAT_REQ_MODULE_VOLTAGE", DataType::None),
    (Tag::BatReqCurrent, "BAT_REQ_CURRENT", DataType::None),
    (Tag::BatReqChargeCycles, "BAT_REQ_CHARGE_CYCLES", DataType::None),
    (Tag::BatReqStatusCode, "BAT_REQ_STATUS_CODE", DataType::None),
    (Tag::BatReqDeviceState, "BAT_REQ_DEVICE_STATE", DataType::None),
    (Tag::BatReqData, "BAT_REQ_DATA", DataType::Container),
    (Tag::BatIndex, "BAT_INDEX", DataType::UInt16),
    (Tag::PmReqPowerL1, "PM_REQ_POWER_L1", DataType::None),
    (Tag::PmReqPowerL2, "PM_REQ_POWER_L2", DataType::None),
    (Tag::PmReqPowerL3, "PM_REQ_POWER_L3", DataType::None),
    (Tag::PmReqEnergyL1, "PM_REQ_ENERGY_L1", DataType::None),
    (Tag::PmReqEnergyL2, "PM_REQ_ENERGY_L2", DataType::None),
    (Tag::PmReqEnergyL3, "PM_REQ_ENERGY_L3", DataType::None),
    (Tag::PmReqData, "PM_REQ_DATA", DataType::Container),
    (Tag::PmIndex, "PM_INDEX", DataType::UInt16),
    (Tag::InfoReqSerialNumber, "INFO_REQ_SERIAL_NUMBER", DataType::None),
    (Tag::InfoReqProductionDate, "INFO_REQ_PRODUCTION_DATE", DataType::None),
    (Tag::InfoReqMacAddress, "INFO_REQ_MAC_ADDRESS", DataType::None),
    (Tag::InfoReqUtcTime, "INFO_REQ_UTC_TIME", DataType::None),
    (Tag::InfoReqTimeZone, "INFO_REQ_TIME_ZONE", DataType::None),
    (Tag::InfoSetTime, "INFO_SET_TIME", DataType::Timestamp),
    (Tag::InfoSetTimeZone, "INFO_SET_TIME_ZONE", DataType::CString),
    (Tag::InfoReqSwRelease, "INFO_REQ_SW_RELEASE", DataType::None),
];

const DATA_TYPE_TABLE: &[(DataType, &str)] = &[
    (DataType::None, "None"),
    (DataType::Bool, "Bool"),
    (DataType::Char8, "Char8"),
    (DataType::UChar8, "UChar8"),
    (DataType::Int16, "Int16"),
    (DataType::UInt16, "UInt16"),
    (DataType::Int32, "Int32"),
    (DataType::UInt32, "UInt32"),
    (DataType::Int64, "Int64"),
    (DataType::UInt64, "UInt64"),
    (DataType::Float32, "Float32"),
    (DataType::Double64, "Double64"),
    (DataType::Bitfield, "Bitfield"),
    (DataType::CString, "CString"),
    (DataType::Container, "Container"),
    (DataType::Timestamp, "Timestamp"),
    (DataType::ByteArray, "ByteArray"),
    (DataType::Error, "Error"),
];

impl Tag {
    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        TAG_TABLE
            .iter()
            .find(|(tag, _, _)| *tag == self)
            .map(|(_, name, _)| *name)
            .unwrap_or("UNKNOWN")
    }

    pub fn default_data_type(self) -> DataType {
        TAG_TABLE
            .iter()
            .find(|(tag, _, _)| *tag == self)
            .map(|(_, _, data_type)| *data_type)
            .unwrap_or(DataType::None)
    }
}

impl DataType {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        DATA_TYPE_TABLE
            .iter()
            .find(|(data_type, _)| *data_type == self)
            .map(|(_, name)| *name)
            .unwrap_or("None")
    }
}

/// Immutable lookup service for tag/datatype names and scalar value coercion.
///
/// Built once at startup and borrowed by every decoder; all lookups are reads
/// against static tables, so a shared reference is safe from any thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Registry;

impl Registry {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a tag name to its id and the default datatype a request carries.
    pub fn resolve_tag(&self, name: &str) -> Result<(Tag, DataType), Error> {
        TAG_TABLE
            .iter()
            .find(|(_, tag_name, _)| *tag_name == name)
            .map(|(tag, _, data_type)| (*tag, *data_type))
            .ok_or_else(|| {
                Error::new(ErrorKind::UnknownTag)
                    .with_message("unknown tag")
                    .with_name(name)
            })
    }

    pub fn resolve_data_type(&self, name: &str) -> Result<DataType, Error> {
        DATA_TYPE_TABLE
            .iter()
            .find(|(_, type_name)| *type_name == name)
            .map(|(data_type, _)| *data_type)
            .ok_or_else(|| {
                Error::new(ErrorKind::UnknownDataType)
                    .with_message("unknown datatype")
                    .with_name(name)
            })
    }

    /// Coerce a raw JSON scalar into the native value for `data_type`.
    ///
    /// Containers are decoded structurally by the request decoder and are
    /// rejected here. Failures carry `ErrorKind::Coercion`; callers decide
    /// whether that is fatal.
    pub fn coerce(&self, data_type: DataType, raw: &Value) -> Result<RscpValue, Error> {
        match data_type {
            DataType::None => Err(coercion_error(data_type, "no value is permitted")),
            DataType::Bool => match raw {
                Value::Bool(value) => Ok(RscpValue::Bool(*value)),
                _ => Err(coercion_error(data_type, "expected a boolean")),
            },
            DataType::Char8 => {
                coerce_signed(raw, data_type, i8::MIN as i64, i8::MAX as i64)
                    .map(|value| RscpValue::Char8(value as i8))
            }
            DataType::UChar8 => coerce_unsigned(raw, data_type, u8::MAX as u64)
                .map(|value| RscpValue::UChar8(value as u8)),
            DataType::Int16 => {
                coerce_signed(raw, data_type, i16::MIN as i64, i16::MAX as i64)
                    .map(|value| RscpValue::Int16(value as i16))
            }
            DataType::UInt16 => coerce_unsigned(raw, data_type, u16::MAX as u64)
                .map(|value| RscpValue::UInt16(value as u16)),
            DataType::Int32 => {
                coerce_signed(raw, data_type, i32::MIN as i64, i32::MAX as i64)
                    .map(|value| RscpValue::Int32(value as i32))
            }
            DataType::UInt32 => coerce_unsigned(raw, data_type, u32::MAX as u64)
                .map(|value| RscpValue::UInt32(value as u32)),
            DataType::Int64 => {
                coerce_signed(raw, data_type, i64::MIN, i64::MAX).map(RscpValue::Int64)
            }
            DataType::UInt64 => coerce_unsigned(raw, data_type, u64::MAX).map(RscpValue::UInt64),
            DataType::Float32 => match raw.as_f64() {
                Some(value) => Ok(RscpValue::Float32(value as f32)),
                _ => Err(coercion_error(data_type, "expected a number")),
            },
            DataType::Double64 => match raw.as_f64() {
                Some(value) => Ok(RscpValue::Double64(value)),
                _ => Err(coercion_error(data_type, "expected a number")),
            },
            DataType::Bitfield => coerce_unsigned(raw, data_type, u8::MAX as u64)
                .map(|value| RscpValue::Bitfield(value as u8)),
            DataType::CString => match raw {
                Value::String(value) => Ok(RscpValue::CString(value.clone())),
                _ => Err(coercion_error(data_type, "expected a string")),
            },
            DataType::Container => Err(Error::new(ErrorKind::Internal)
                .with_message("container values are decoded structurally, not coerced")),
            DataType::Timestamp => match raw {
                Value::String(value) => PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT)
                    .map(|parsed| RscpValue::Timestamp(parsed.assume_utc()))
                    .map_err(|err| {
                        coercion_error(data_type, "expected an ISO-8601 UTC timestamp")
                            .with_source(err)
                    }),
                _ => Err(coercion_error(data_type, "expected a string")),
            },
            DataType::ByteArray => match raw {
                Value::Array(items) => {
                    let mut bytes = Vec::with_capacity(items.len());
                    for item in items {
                        let byte = item
                            .as_u64()
                            .filter(|value| *value <= u8::MAX as u64)
                            .ok_or_else(|| {
                                coercion_error(data_type, "expected an array of bytes (0-255)")
                            })?;
                        bytes.push(byte as u8);
                    }
                    Ok(RscpValue::ByteArray(bytes))
                }
                _ => Err(coercion_error(data_type, "expected an array of bytes")),
            },
            DataType::Error => coerce_unsigned(raw, data_type, u32::MAX as u64)
                .map(|value| RscpValue::ErrorCode(value as u32)),
        }
    }

    /// Every tag as (name, id, default datatype) rows, in table order.
    pub fn tags(&self) -> impl Iterator<Item = (&'static str, u32, DataType)> {
        TAG_TABLE
            .iter()
            .map(|(tag, name, data_type)| (*name, tag.id(), *data_type))
    }

    /// Every datatype as (name, id) rows, in table order.
    pub fn data_types(&self) -> impl Iterator<Item = (&'static str, u8)> {
        DATA_TYPE_TABLE
            .iter()
            .map(|(data_type, name)| (*name, data_type.id()))
    }
}

fn coercion_error(data_type: DataType, message: &str) -> Error {
    Error::new(ErrorKind::Coercion)
        .with_message(message)
        .with_name(data_type.name())
}

fn coerce_signed(raw: &Value, data_type: DataType, min: i64, max: i64) -> Result<i64, Error> {
    let value = raw
        .as_i64()
        .ok_or_else(|| coercion_error(data_type, "expected an integer"))?;
    if value < min || value > max {
        return Err(coercion_error(data_type, "integer out of range"));
    }
    Ok(value)
}

fn coerce_unsigned(raw: &Value, data_type: DataType, max: u64) -> Result<u64, Error> {
    let value = raw
        .as_u64()
        .ok_or_else(|| coercion_error(data_type, "expected an unsigned integer"))?;
    if value > max {
        return Err(coercion_error(data_type, "integer out of range"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::{DATA_TYPE_TABLE, DataType, Registry, TAG_TABLE, Tag};
    use crate::core::error::ErrorKind;
    use crate::core::message::RscpValue;
    use serde_json::json;
    use std::collections::HashSet;
    use time::macros::datetime;

    #[test]
    fn tag_ids_and_names_are_unique() {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for (tag, name, _) in TAG_TABLE {
            assert!(ids.insert(tag.id()), "duplicate tag id for {name}");
            assert!(names.insert(*name), "duplicate tag name {name}");
        }
    }

    #[test]
    fn data_type_ids_and_names_are_unique() {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for (data_type, name) in DATA_TYPE_TABLE {
            assert!(ids.insert(data_type.id()), "duplicate datatype id for {name}");
            assert!(names.insert(*name), "duplicate datatype name {name}");
        }
    }

    #[test]
    fn resolve_tag_returns_default_data_type() {
        let registry = Registry::new();
        let (tag, data_type) = registry.resolve_tag("BAT_INDEX").expect("resolve");
        assert_eq!(tag, Tag::BatIndex);
        assert_eq!(data_type, DataType::UInt16);

        let err = registry.resolve_tag("INVALID_TAG").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownTag);
        assert_eq!(err.name(), Some("INVALID_TAG"));
    }

    #[test]
    fn resolve_data_type_recognizes_sentinel() {
        let registry = Registry::new();
        assert_eq!(
            registry.resolve_data_type("None").expect("resolve"),
            DataType::None
        );
        let err = registry.resolve_data_type("NotAType").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownDataType);
    }

    #[test]
    fn coerce_integers_checks_width() {
        let registry = Registry::new();
        assert_eq!(
            registry.coerce(DataType::UInt16, &json!(0)).expect("coerce"),
            RscpValue::UInt16(0)
        );
        assert_eq!(
            registry
                .coerce(DataType::Char8, &json!(-128))
                .expect("coerce"),
            RscpValue::Char8(-128)
        );

        let err = registry.coerce(DataType::UInt16, &json!(65536)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
        let err = registry.coerce(DataType::UInt16, &json!(-1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
        let err = registry.coerce(DataType::Int32, &json!(1.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
    }

    #[test]
    fn coerce_none_always_fails() {
        let registry = Registry::new();
        let err = registry.coerce(DataType::None, &json!("")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
    }

    #[test]
    fn coerce_timestamp_requires_utc_suffix_and_fraction() {
        let registry = Registry::new();
        let value = registry
            .coerce(DataType::Timestamp, &json!("1234-05-06T07:08:09.123456Z"))
            .expect("coerce");
        assert_eq!(
            value,
            RscpValue::Timestamp(datetime!(1234-05-06 07:08:09.123456 UTC))
        );

        for bad in [
            "1234-05-06T07:08:09Z",
            "1234-05-06T07:08:09.123456+02:00",
            "not-a-time",
        ] {
            let err = registry.coerce(DataType::Timestamp, &json!(bad)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Coercion, "accepted {bad}");
        }
    }

    #[test]
    fn coerce_byte_array_rejects_out_of_range() {
        let registry = Registry::new();
        assert_eq!(
            registry
                .coerce(DataType::ByteArray, &json!([0, 127, 255]))
                .expect("coerce"),
            RscpValue::ByteArray(vec![0, 127, 255])
        );
        let err = registry
            .coerce(DataType::ByteArray, &json!([0, 256]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Coercion);
    }

    #[test]
    fn coerce_container_is_rejected() {
        let registry = Registry::new();
        let err = registry.coerce(DataType::Container, &json!([])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
