//! Purpose: Contract coverage for the request decoder's accepted shapes.
//! Role: Integration tests exercising the public decode API end to end.
//! Invariants: Equivalent spellings (bare tag, tuple, object) decode identically.
//! Invariants: Bad identifiers and shapes are fatal; bad scalar values degrade.

use rscpq::api::{
    DataType, Error, ErrorKind, Message, Registry, RequestDecoder, RscpValue, Tag, message_json,
};
use time::macros::datetime;

fn decode_one(input: &str) -> Result<Message, Error> {
    let registry = Registry::new();
    let decoder = RequestDecoder::new(&registry);
    decoder.decode_one(input.as_bytes())
}

fn decode_many(input: &str) -> Result<Vec<Message>, Error> {
    let registry = Registry::new();
    let decoder = RequestDecoder::new(&registry);
    decoder.decode_many(input.as_bytes())
}

#[test]
fn bare_tag_forms_decode_identically() {
    let want = Message::new(Tag::InfoReqUtcTime, DataType::None, None);
    for input in [
        r#""INFO_REQ_UTC_TIME""#,
        r#"["INFO_REQ_UTC_TIME"]"#,
        r#"["INFO_REQ_UTC_TIME", "None"]"#,
        r#"{ "Tag": "INFO_REQ_UTC_TIME" }"#,
        r#"{ "Tag": "INFO_REQ_UTC_TIME", "DataType": "None" }"#,
    ] {
        assert_eq!(decode_one(input).expect(input), want, "input {input}");
    }
}

#[test]
fn tuple_with_value_uses_default_datatype() {
    let want = Message::new(
        Tag::RscpAuthenticationUser,
        DataType::CString,
        Some(RscpValue::CString("testuser".to_string())),
    );
    assert_eq!(
        decode_one(r#"["RSCP_AUTHENTICATION_USER", "testuser"]"#).expect("decode"),
        want
    );
}

#[test]
fn triple_and_object_forms_are_equivalent() {
    let spellings = [
        r#"["BAT_INDEX", "UInt16", 0]"#,
        r#"{ "Tag": "BAT_INDEX", "DataType": "UInt16", "Value": 0 }"#,
        r#"{ "Tag": "BAT_INDEX", "Value": 0 }"#,
    ];
    let want = Message::new(Tag::BatIndex, DataType::UInt16, Some(RscpValue::UInt16(0)));
    for input in spellings {
        assert_eq!(decode_one(input).expect(input), want, "input {input}");
    }
}

#[test]
fn nested_container_round_trip() {
    let want = Message::new(
        Tag::BatReqData,
        DataType::Container,
        Some(RscpValue::Container(vec![
            Message::new(Tag::BatIndex, DataType::UInt16, Some(RscpValue::UInt16(0))),
            Message::new(Tag::BatReqDeviceState, DataType::None, None),
        ])),
    );
    for input in [
        r#"["BAT_REQ_DATA", [["BAT_INDEX", 0], "BAT_REQ_DEVICE_STATE"]]"#,
        r#"{ "Tag": "BAT_REQ_DATA", "Value": [ { "Tag": "BAT_INDEX", "Value": 0 }, { "Tag": "BAT_REQ_DEVICE_STATE" } ] }"#,
    ] {
        assert_eq!(decode_one(input).expect(input), want, "input {input}");
    }
}

#[test]
fn explicit_datatype_override_is_never_validated_against_the_tag() {
    // UChar8 makes no semantic sense for a time request, but the decoder only
    // resolves names; the override is kept as-is.
    let message = decode_one(r#"["INFO_REQ_UTC_TIME", "UChar8"]"#).expect("decode");
    assert_eq!(
        message,
        Message::new(Tag::InfoReqUtcTime, DataType::UChar8, None)
    );
}

#[test]
fn unusable_scalar_value_degrades_to_default_with_no_value() {
    // An empty string carries no usable hardware address; the field resets to
    // the tag's default datatype instead of failing the decode.
    let message = decode_one(r#"["INFO_REQ_MAC_ADDRESS", ""]"#).expect("decode");
    assert_eq!(
        message,
        Message::new(Tag::InfoReqMacAddress, DataType::None, None)
    );

    let message = decode_one(r#"{ "Tag": "BAT_INDEX", "Value": 70000 }"#).expect("decode");
    assert_eq!(message, Message::new(Tag::BatIndex, DataType::UInt16, None));
}

#[test]
fn timestamp_value_coerces_to_the_exact_time_point() {
    let message = decode_one(r#"["INFO_SET_TIME", "1234-05-06T07:08:09.123456Z"]"#)
        .expect("decode");
    assert_eq!(
        message,
        Message::new(
            Tag::InfoSetTime,
            DataType::Timestamp,
            Some(RscpValue::Timestamp(datetime!(1234-05-06 07:08:09.123456 UTC))),
        )
    );
}

#[test]
fn malformed_timestamp_degrades_instead_of_failing() {
    let message = decode_one(r#"["INFO_SET_TIME", "yesterday"]"#).expect("decode");
    assert_eq!(
        message,
        Message::new(Tag::InfoSetTime, DataType::Timestamp, None)
    );
}

#[test]
fn canonical_rendering_reparses_to_the_same_message() {
    for input in [
        r#"["BAT_INDEX", "UInt16", 7]"#,
        r#"["INFO_SET_TIME", "1234-05-06T07:08:09.123456Z"]"#,
        r#"["BAT_REQ_DATA", [["BAT_INDEX", 0], "BAT_REQ_DEVICE_STATE"]]"#,
        r#""EMS_REQ_POWER_GRID""#,
    ] {
        let first = decode_one(input).expect(input);
        let rendered = message_json(&first).to_string();
        let second = decode_one(&rendered).expect(&rendered);
        assert_eq!(first, second, "input {input}");
    }
}

#[test]
fn fatal_single_decode_errors() {
    let cases = [
        ("", ErrorKind::Parse),
        ("[x]", ErrorKind::Parse),
        ("[]", ErrorKind::InvalidShape),
        ("[1]", ErrorKind::InvalidShape),
        ("[1,1]", ErrorKind::InvalidShape),
        ("[1,1,1]", ErrorKind::InvalidShape),
        (r#"["BAT_INDEX", "UInt16", 0, 0]"#, ErrorKind::InvalidShape),
        ("42", ErrorKind::InvalidShape),
        (r#""INVALID_TAG""#, ErrorKind::UnknownTag),
        (r#"["INVALID_TAG"]"#, ErrorKind::UnknownTag),
        (r#"["BAT_INDEX", "NotAType", 0]"#, ErrorKind::UnknownDataType),
        (r#"["BAT_INDEX", "None", 0]"#, ErrorKind::UnknownDataType),
        (r#"{ "Tag": 1 }"#, ErrorKind::InvalidShape),
        (r#"{ "Tag": "BAT_INDEX", "DataType": 5 }"#, ErrorKind::InvalidShape),
    ];
    for (input, kind) in cases {
        let err = decode_one(input).unwrap_err();
        assert_eq!(err.kind(), kind, "input {input:?}: {err}");
    }
}

#[test]
fn batch_spellings_decode_to_the_same_sequence() {
    let want = vec![
        Message::new(Tag::InfoReqMacAddress, DataType::None, None),
        Message::new(Tag::InfoReqUtcTime, DataType::None, None),
    ];
    for input in [
        r#"["INFO_REQ_MAC_ADDRESS", "INFO_REQ_UTC_TIME"]"#,
        r#"[["INFO_REQ_MAC_ADDRESS"], ["INFO_REQ_UTC_TIME"]]"#,
        r#"[{ "Tag": "INFO_REQ_MAC_ADDRESS" }, { "Tag": "INFO_REQ_UTC_TIME" }]"#,
    ] {
        assert_eq!(decode_many(input).expect(input), want, "input {input}");
    }
}

#[test]
fn batch_fatal_errors_discard_partial_results() {
    let cases = [
        ("", ErrorKind::Parse),
        (r#"{"Tag":"BAT_INDEX"}"#, ErrorKind::Parse),
        (r#"["INFO_REQ_UTC_TIME", "INVALID_TAG"]"#, ErrorKind::UnknownTag),
        (r#"["INFO_REQ_UTC_TIME", 42]"#, ErrorKind::InvalidShape),
    ];
    for (input, kind) in cases {
        let err = decode_many(input).unwrap_err();
        assert_eq!(err.kind(), kind, "input {input:?}: {err}");
    }
}

#[test]
fn empty_batch_array_decodes_to_no_messages() {
    assert_eq!(decode_many("[]").expect("decode"), Vec::<Message>::new());
}

#[test]
fn decoders_share_one_registry_across_threads() {
    let registry = Registry::new();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let decoder = RequestDecoder::new(&registry);
                let message = decoder
                    .decode_one(br#"["BAT_INDEX", 3]"#)
                    .expect("decode");
                assert_eq!(message.value, Some(RscpValue::UInt16(3)));
            });
        }
    });
}
