use proptest::prelude::*;
use serde_json::Value;
use tracing_json_encoder::writer::{escape, JsonWriter};

fn single_field(key: &str, value: &str) -> String {
    let mut out = String::new();
    let mut json = JsonWriter::new(&mut out);
    json.append(key, value);
    json.close();
    out
}

fn decode(out: &str) -> serde_json::Map<String, Value> {
    match serde_json::from_str(out).expect("writer output is valid json") {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn every_control_character_round_trips() {
    for code in 0u32..0x20 {
        let ch = char::from_u32(code).expect("valid code point");
        let original = ch.to_string();
        let map = decode(&single_field("k", &original));
        assert_eq!(map["k"], Value::String(original.clone()), "code point {code:#04x}");
    }
}

#[test]
fn control_characters_use_expected_escapes() {
    assert_eq!(escape("\u{0}"), "\\u0000");
    assert_eq!(escape("\u{1f}"), "\\u001f");
    assert_eq!(escape("\u{8}\u{c}\n\r\t"), "\\b\\f\\n\\r\\t");
    assert_eq!(escape("\"\\/"), "\\\"\\\\\\/");
}

#[test]
fn special_characters_round_trip() {
    for original in ["\"", "\\", "/", "a/b\\c\"d", "</script>"] {
        let map = decode(&single_field(original, original));
        assert_eq!(map[original], original);
    }
}

proptest! {
    #[test]
    fn arbitrary_strings_round_trip(key in any::<String>(), value in any::<String>()) {
        let map = decode(&single_field(&key, &value));
        prop_assert_eq!(map.len(), 1);
        prop_assert_eq!(map.get(&key).and_then(Value::as_str), Some(value.as_str()));
    }

    #[test]
    fn escaped_output_has_no_raw_control_characters(value in "[\\x00-\\x1f\"\\\\/a-z]{0,64}") {
        let escaped = escape(&value);
        prop_assert!(!escaped.chars().any(|c| (c as u32) < 0x20));
    }
}
