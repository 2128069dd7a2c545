//! Scalar storage types.
//!
//! [`TimeStamp`] and [`JsonText`] each implement the wire contract
//! ([`TextCodec`] and serde) and the driver contract ([`StorageCodec`] and
//! the sqlx SQLite `Type`/`Encode`/`Decode` traits) with matching semantics.

use crate::db::codec::{DriverValue, StorageCodec, TextCodec};
use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteTypeInfo, SqliteValueRef};
use sqlx::{Database, Decode, Encode, Sqlite, Type, ValueRef};
use std::fmt;

// =============================================================================
// TimeStamp
// =============================================================================

/// A point in time that travels as unix seconds.
///
/// The default value is the zero (unset) instant. On the wire it encodes as
/// `0`, and in storage as NULL.
///
/// Decoding is not the inverse of encoding for the zero instant: `0` decodes
/// to the epoch (`1970-01-01T00:00:00Z`), which is a set instant. Stored data
/// written by other clients relies on this, so it is kept as is.
///
/// Only instants chrono can represent (roughly years -262143 to 262142) are
/// accepted. A wire integer outside that range is a valid integer but still
/// fails to decode with [`StoreError::Parse`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStamp(Option<DateTime<Utc>>);

impl TimeStamp {
    /// Wrap an instant.
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(Some(instant))
    }

    /// The instant `secs` seconds after the epoch, if representable.
    pub fn from_unix(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self::new)
    }

    /// The current instant.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    /// The wrapped instant, `None` for the zero value.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.0
    }

    /// Seconds since the epoch; `0` for the zero value.
    pub fn unix(&self) -> i64 {
        self.0.map_or(0, |t| t.timestamp())
    }

    fn parse_wire(data: &[u8]) -> StoreResult<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| StoreError::parse(String::from_utf8_lossy(data), e.to_string()))?;
        let secs: i64 = text
            .parse()
            .map_err(|e: std::num::ParseIntError| StoreError::parse(text, e.to_string()))?;
        Self::from_unix(secs).ok_or_else(|| {
            StoreError::parse(text, "unix seconds outside the representable range")
        })
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::new(instant)
    }
}

impl TextCodec for TimeStamp {
    fn marshal_text(&self) -> StoreResult<Vec<u8>> {
        Ok(self.unix().to_string().into_bytes())
    }

    fn unmarshal_text(&mut self, data: &[u8]) -> StoreResult<()> {
        *self = Self::parse_wire(data)?;
        Ok(())
    }
}

impl StorageCodec for TimeStamp {
    fn to_driver_value(&self) -> StoreResult<DriverValue> {
        Ok(self.0.into())
    }

    fn scan(&mut self, src: &DriverValue) -> StoreResult<()> {
        match src {
            // NULL leaves the current value untouched
            DriverValue::Null => Ok(()),
            DriverValue::Time(instant) => {
                self.0 = Some(*instant);
                Ok(())
            }
            other => Err(StoreError::type_mismatch("time", other.type_name())),
        }
    }
}

impl Serialize for TimeStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.unix())
    }
}

impl<'de> Deserialize<'de> for TimeStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = i64::deserialize(deserializer)?;
        Self::from_unix(secs)
            .ok_or_else(|| D::Error::custom(format!("unix timestamp {secs} out of range")))
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.unix())
    }
}

impl Type<Sqlite> for TimeStamp {
    fn type_info() -> SqliteTypeInfo {
        <DateTime<Utc> as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <DateTime<Utc> as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for TimeStamp {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        <Option<DateTime<Utc>> as Encode<'q, Sqlite>>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> Decode<'r, Sqlite> for TimeStamp {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let instant = <DateTime<Utc> as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Self::new(instant))
    }
}

// =============================================================================
// JsonText
// =============================================================================

/// Raw JSON document bytes, kept verbatim.
///
/// The bytes are never reformatted. [`StorageCodec::to_driver_value`] checks
/// that they parse as JSON before handing them to the driver; scanning and the
/// wire accessors copy bytes without looking at them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct JsonText(Vec<u8>);

impl JsonText {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Serialize `value` into a new document.
    pub fn from_value<T: Serialize + ?Sized>(value: &T) -> StoreResult<Self> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| StoreError::validation(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode the document into `T`.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_slice(&self.0).map_err(|e| StoreError::decode(e.to_string()))
    }

    /// Decode the document into an existing destination.
    pub fn unmarshal_into<T: DeserializeOwned>(&self, target: &mut T) -> StoreResult<()> {
        *target = self.unmarshal()?;
        Ok(())
    }

    /// The bytes as text, provided they are well-formed JSON.
    fn validated_text(&self) -> StoreResult<String> {
        serde_json::from_slice::<&RawValue>(&self.0)
            .map_err(|e| StoreError::validation(e.to_string()))?;
        String::from_utf8(self.0.clone()).map_err(|e| StoreError::validation(e.to_string()))
    }

    fn replace(&mut self, data: &[u8]) {
        self.0.clear();
        self.0.extend_from_slice(data);
    }
}

impl From<Vec<u8>> for JsonText {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&str> for JsonText {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl TextCodec for JsonText {
    fn marshal_text(&self) -> StoreResult<Vec<u8>> {
        Ok(self.0.clone())
    }

    fn unmarshal_text(&mut self, data: &[u8]) -> StoreResult<()> {
        self.replace(data);
        Ok(())
    }
}

impl StorageCodec for JsonText {
    fn to_driver_value(&self) -> StoreResult<DriverValue> {
        self.validated_text().map(DriverValue::Text)
    }

    fn scan(&mut self, src: &DriverValue) -> StoreResult<()> {
        match src {
            DriverValue::Text(text) => self.replace(text.as_bytes()),
            DriverValue::Bytes(bytes) => self.replace(bytes),
            other => return Err(StoreError::type_mismatch("text or bytes", other.type_name())),
        }
        Ok(())
    }
}

impl Serialize for JsonText {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_empty() {
            return Err(S::Error::custom("empty JSON text"));
        }
        let raw: &RawValue = serde_json::from_slice(&self.0).map_err(S::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JsonText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Ok(Self(raw.get().as_bytes().to_vec()))
    }
}

impl fmt::Display for JsonText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Type<Sqlite> for JsonText {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty) || <Vec<u8> as Type<Sqlite>>::compatible(ty)
    }
}

impl<'q> Encode<'q, Sqlite> for JsonText {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, BoxDynError> {
        let text = self.validated_text()?;
        <String as Encode<'q, Sqlite>>::encode(text, buf)
    }
}

impl<'r> Decode<'r, Sqlite> for JsonText {
    fn decode(value: SqliteValueRef<'r>) -> Result<Self, BoxDynError> {
        if value.is_null() {
            return Err(StoreError::type_mismatch("text or bytes", "null").into());
        }
        let bytes = <&[u8] as Decode<'r, Sqlite>>::decode(value)?;
        Ok(Self(bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_wire_encoding() {
        let ts = TimeStamp::from_unix(1467362677).unwrap();
        assert_eq!(ts.marshal_text().unwrap(), b"1467362677");
        assert_eq!(serde_json::to_string(&ts).unwrap(), "1467362677");
    }

    #[test]
    fn test_timestamp_wire_decoding() {
        let mut ts = TimeStamp::default();
        ts.unmarshal_text(b"1467362677").unwrap();
        assert_eq!(ts.unix(), 1467362677);

        let ts: TimeStamp = serde_json::from_str("1467362677").unwrap();
        assert_eq!(ts.unix(), 1467362677);
    }

    #[test]
    fn test_timestamp_zero_round_trip_is_asymmetric() {
        let zero = TimeStamp::default();
        assert_eq!(zero.marshal_text().unwrap(), b"0");

        let mut decoded = TimeStamp::default();
        decoded.unmarshal_text(b"0").unwrap();
        assert!(!decoded.is_zero());
        assert_eq!(decoded.instant(), DateTime::from_timestamp(0, 0));
        assert_ne!(decoded, zero);
    }

    #[test]
    fn test_timestamp_rejects_malformed_wire() {
        let mut ts = TimeStamp::from_unix(5).unwrap();
        let inputs: [&[u8]; 5] = [b"12a", b"", b" 1", b"1.5", b"\xff"];
        for input in inputs {
            let err = ts.unmarshal_text(input).unwrap_err();
            assert!(matches!(err, StoreError::Parse { .. }), "input {input:?}");
        }
        // failed decodes leave the value alone
        assert_eq!(ts.unix(), 5);
        assert!(serde_json::from_str::<TimeStamp>("\"12\"").is_err());
    }

    #[test]
    fn test_timestamp_rejects_unrepresentable_seconds() {
        let mut ts = TimeStamp::from_unix(5).unwrap();
        let inputs: [&[u8]; 2] = [b"9223372036854775807", b"-9223372036854775808"];
        for input in inputs {
            let err = ts.unmarshal_text(input).unwrap_err();
            assert!(
                matches!(&err, StoreError::Parse { message, .. } if message.contains("range")),
                "input {input:?}: {err}"
            );
        }
        assert_eq!(ts.unix(), 5);
        // beyond i64 is an ordinary integer parse failure
        assert!(matches!(
            ts.unmarshal_text(b"9223372036854775808"),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_timestamp_negative_seconds() {
        let mut ts = TimeStamp::default();
        ts.unmarshal_text(b"-86400").unwrap();
        assert_eq!(ts.unix(), -86400);
    }

    #[test]
    fn test_timestamp_driver_value() {
        assert_eq!(TimeStamp::default().to_driver_value().unwrap(), DriverValue::Null);

        let instant = DateTime::from_timestamp(1467362677, 123_456_789).unwrap();
        let ts = TimeStamp::new(instant);
        // full precision, no truncation to seconds
        assert_eq!(ts.to_driver_value().unwrap(), DriverValue::Time(instant));
    }

    #[test]
    fn test_timestamp_scan() {
        let instant = DateTime::from_timestamp(1467362677, 500).unwrap();
        let mut ts = TimeStamp::default();
        ts.scan(&DriverValue::Null).unwrap();
        assert!(ts.is_zero());

        ts.scan(&DriverValue::Time(instant)).unwrap();
        assert_eq!(ts.instant(), Some(instant));

        ts.scan(&DriverValue::Null).unwrap();
        assert_eq!(ts.instant(), Some(instant));

        let err = ts.scan(&DriverValue::Int(1)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch {
                expected: "time",
                found: "int"
            }
        ));
    }

    #[test]
    fn test_json_text_wire_is_verbatim() {
        let mut doc = JsonText::default();
        doc.unmarshal_text(b"{ \"a\" :1 ").unwrap();
        assert_eq!(doc.marshal_text().unwrap(), b"{ \"a\" :1 ");

        doc.unmarshal_text(b"[]").unwrap();
        assert_eq!(doc.as_bytes(), b"[]");
    }

    #[test]
    fn test_json_text_driver_value_validates() {
        let doc = JsonText::from("{\"a\": [1, 2]}");
        assert_eq!(
            doc.to_driver_value().unwrap(),
            DriverValue::Text("{\"a\": [1, 2]}".to_string())
        );

        let truncated = JsonText::from("{\"a\": [1, 2");
        assert!(matches!(
            truncated.to_driver_value(),
            Err(StoreError::Validation { .. })
        ));
        assert!(matches!(
            JsonText::default().to_driver_value(),
            Err(StoreError::Validation { .. })
        ));
    }

    #[test]
    fn test_json_text_scan_then_unmarshal() {
        let mut doc = JsonText::default();
        doc.scan(&DriverValue::Bytes(b"{\"name\":\"x\",\"n\":3}".to_vec()))
            .unwrap();
        let value: serde_json::Value = doc.unmarshal().unwrap();
        assert_eq!(value, json!({"name": "x", "n": 3}));

        doc.scan(&DriverValue::Text("[1,2,3]".to_string())).unwrap();
        let mut numbers: Vec<i32> = Vec::new();
        doc.unmarshal_into(&mut numbers).unwrap();
        assert_eq!(numbers, [1, 2, 3]);
    }

    #[test]
    fn test_json_text_scan_does_not_validate() {
        let mut doc = JsonText::default();
        doc.scan(&DriverValue::Text("not json".to_string())).unwrap();
        assert_eq!(doc.to_string(), "not json");
        assert!(matches!(
            doc.unmarshal::<serde_json::Value>(),
            Err(StoreError::Decode { .. })
        ));
    }

    #[test]
    fn test_json_text_scan_rejects_other_kinds() {
        let mut doc = JsonText::from("{}");
        for src in [DriverValue::Null, DriverValue::Int(1), DriverValue::Bool(true)] {
            assert!(matches!(
                doc.scan(&src),
                Err(StoreError::TypeMismatch { .. })
            ));
        }
        assert_eq!(doc.as_bytes(), b"{}");
    }

    #[derive(Serialize, Deserialize)]
    struct Envelope {
        id: i64,
        created: TimeStamp,
        body: JsonText,
    }

    #[test]
    fn test_serde_embedding() {
        let envelope = Envelope {
            id: 7,
            created: TimeStamp::from_unix(1467362677).unwrap(),
            body: JsonText::from("{\"k\":[true,null]}"),
        };
        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(text, r#"{"id":7,"created":1467362677,"body":{"k":[true,null]}}"#);

        let back: Envelope = serde_json::from_str(r#"{"id":1,"created":0,"body": [1, 2]}"#).unwrap();
        assert_eq!(back.created.unix(), 0);
        assert!(!back.created.is_zero());
        assert_eq!(back.body.as_bytes(), b"[1, 2]");
    }

    #[test]
    fn test_empty_json_text_does_not_serialize() {
        let err = serde_json::to_string(&JsonText::default()).unwrap_err();
        assert!(err.to_string().contains("empty JSON text"));

        let envelope = Envelope {
            id: 1,
            created: TimeStamp::default(),
            body: JsonText::default(),
        };
        assert!(serde_json::to_string(&envelope).is_err());
    }

    #[test]
    fn test_json_text_from_value() {
        let doc = JsonText::from_value(&json!({"a": 1})).unwrap();
        assert_eq!(doc.as_bytes(), b"{\"a\":1}");
    }
}
