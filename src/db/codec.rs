//! Codec capabilities shared by the scalar storage types.
//!
//! A storage scalar speaks two contracts:
//!
//! - [`TextCodec`]: the wire form, raw bytes as they appear in a JSON document
//!   or a Redis value;
//! - [`StorageCodec`]: the driver form, a [`DriverValue`] handed to or read
//!   from a SQL driver.
//!
//! The two are independent traits so each can be used (and tested) alone;
//! [`Codec`] names the combination.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};

/// A value as exchanged with a SQL driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverValue {
    /// NULL value
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    /// Native instant, full precision
    Time(DateTime<Utc>),
}

impl DriverValue {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this value for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Time(_) => "time",
        }
    }
}

impl From<DateTime<Utc>> for DriverValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl From<String> for DriverValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for DriverValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<DriverValue>> From<Option<T>> for DriverValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Wire (text) serialization.
pub trait TextCodec {
    fn marshal_text(&self) -> StoreResult<Vec<u8>>;

    fn unmarshal_text(&mut self, data: &[u8]) -> StoreResult<()>;
}

/// SQL driver value conversion.
pub trait StorageCodec {
    /// Value to bind into a statement.
    fn to_driver_value(&self) -> StoreResult<DriverValue>;

    /// Adopt a value read from a result row.
    fn scan(&mut self, src: &DriverValue) -> StoreResult<()>;
}

/// Both codec capabilities.
pub trait Codec: TextCodec + StorageCodec {}

impl<T: TextCodec + StorageCodec> Codec for T {}

/// Decode `data` into `target`, failing with [`StoreError::NilTarget`] when
/// there is no destination to decode into.
pub fn decode_text_into<C: TextCodec>(target: Option<&mut C>, data: &[u8]) -> StoreResult<()> {
    match target {
        Some(target) => target.unmarshal_text(data),
        None => Err(StoreError::nil_target(short_type_name::<C>())),
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Upper(String);

    impl TextCodec for Upper {
        fn marshal_text(&self) -> StoreResult<Vec<u8>> {
            Ok(self.0.to_uppercase().into_bytes())
        }

        fn unmarshal_text(&mut self, data: &[u8]) -> StoreResult<()> {
            self.0 = String::from_utf8_lossy(data).into_owned();
            Ok(())
        }
    }

    #[test]
    fn test_driver_value_type_names() {
        assert_eq!(DriverValue::Null.type_name(), "null");
        assert_eq!(DriverValue::Int(1).type_name(), "int");
        assert_eq!(DriverValue::Text("x".into()).type_name(), "text");
        assert!(DriverValue::from(None::<String>).is_null());
    }

    #[test]
    fn test_decode_text_into_target() {
        let mut value = Upper::default();
        decode_text_into(Some(&mut value), b"abc").unwrap();
        assert_eq!(value.0, "abc");
        assert_eq!(value.marshal_text().unwrap(), b"ABC");
    }

    #[test]
    fn test_decode_text_into_missing_target() {
        let err = decode_text_into::<Upper>(None, b"abc").unwrap_err();
        assert!(matches!(err, StoreError::NilTarget { type_name: "Upper" }));
    }
}
