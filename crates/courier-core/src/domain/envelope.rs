//! Envelope codec.
//!
//! Payloads travel as `{"msg": <payload>}` so that the value type survives the
//! text-only transport. Bodies that are not a well-formed envelope are handed
//! to handlers unchanged as [`Payload::Raw`], which keeps plain-string
//! producers compatible.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::CourierError;

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    msg: &'a T,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    msg: serde_json::Value,
}

/// What a handler receives: a decoded envelope or the raw body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Raw(String),
}

impl Payload {
    /// String content, for both a raw body and an enveloped JSON string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Json(value) => value.as_str(),
            Payload::Raw(body) => Some(body),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Payload::Raw(_))
    }

    /// Decode into a concrete type.
    ///
    /// A raw body is parsed as JSON text, so producers that put a bare JSON
    /// document (without the envelope) are still readable.
    pub fn decode_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            Payload::Json(value) => T::deserialize(value),
            Payload::Raw(body) => serde_json::from_str(body),
        }
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Payload::Json(value) => value.serialize(serializer),
            Payload::Raw(body) => serializer.serialize_str(body),
        }
    }
}

/// Wrap `payload` into an envelope body.
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> Result<String, CourierError> {
    Ok(serde_json::to_string(&EnvelopeRef { msg: payload })?)
}

/// Unwrap an envelope body. Never fails: anything that is not an envelope
/// comes back as [`Payload::Raw`].
pub fn decode(body: &str) -> Payload {
    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => Payload::Json(envelope.msg),
        Err(_) => Payload::Raw(body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PostMessage {
        channel_id: String,
        text: String,
        escape: bool,
        tags: Vec<String>,
    }

    #[test]
    fn encode_wraps_payload_in_msg() {
        let body = encode("hello").unwrap();
        assert_eq!(body, r#"{"msg":"hello"}"#);
    }

    #[rstest]
    #[case::string(json!("hello"))]
    #[case::number(json!(42.5))]
    #[case::null(json!(null))]
    #[case::nested(json!({"a": [1, 2, {"b": null}], "c": {"d": true}}))]
    fn decode_reverses_encode(#[case] value: serde_json::Value) {
        let body = encode(&value).unwrap();
        assert_eq!(decode(&body), Payload::Json(value));
    }

    #[rstest]
    #[case::plain_text("a message")]
    #[case::bare_json_string(r#""hello""#)]
    #[case::other_object(r#"{"text":"hi"}"#)]
    #[case::extra_field(r#"{"msg":"hi","extra":1}"#)]
    #[case::truncated(r#"{"msg":"#)]
    #[case::empty("")]
    fn non_envelope_bodies_fall_back_to_raw(#[case] body: &str) {
        assert_eq!(decode(body), Payload::Raw(body.to_string()));
    }

    #[test]
    fn complex_struct_survives_the_envelope() {
        let original = PostMessage {
            channel_id: "C01".into(),
            text: "This is my message".into(),
            escape: false,
            tags: vec!["str1".into(), "str2".into()],
        };

        let payload = decode(&encode(&original).unwrap());
        assert!(!payload.is_raw());
        assert_eq!(payload.decode_as::<PostMessage>().unwrap(), original);
    }

    #[test]
    fn raw_json_body_still_decodes_as_type() {
        let payload = decode(r#"{"k1":"v1","k2":"v2"}"#);
        assert!(payload.is_raw());

        let map: BTreeMap<String, String> = payload.decode_as().unwrap();
        assert_eq!(map.get("k2").map(String::as_str), Some("v2"));
    }

    #[test]
    fn as_str_covers_both_variants() {
        assert_eq!(Payload::Raw("x".into()).as_str(), Some("x"));
        assert_eq!(Payload::Json(json!("y")).as_str(), Some("y"));
        assert_eq!(Payload::Json(json!(1)).as_str(), None);
    }

    #[test]
    fn raw_payload_reencodes_as_string() {
        let body = encode(&Payload::Raw("plain".into())).unwrap();
        assert_eq!(decode(&body), Payload::Json(json!("plain")));
    }
}
