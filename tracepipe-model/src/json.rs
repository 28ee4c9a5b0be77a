//! Serde helpers implementing the canonical proto3 JSON mapping.
//!
//! The domain messages are decoded from JSON the way a protobuf JSON parser would read them:
//! `bytes` are base64, 64-bit integers are quoted decimal strings, enums are referenced by name,
//! well-known `Timestamp` and `Duration` types use their string forms, and `null` means "default".
//! All readers are lenient in the same places as the reference parsers: numbers are accepted where
//! strings are emitted and vice versa.

use std::fmt;
use std::marker::PhantomData;

use data_encoding::{BASE64, BASE64_NOPAD, BASE64URL, BASE64URL_NOPAD};
use prost_types::{Duration, Timestamp};
use serde::de::{self, Deserialize, Deserializer, Unexpected, Visitor};
use serde::ser::Serializer;

/// Deserializes `null` as the default value of the field type.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `bytes` fields as standard base64.
pub mod base64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(Vec::new());
        };

        // Padded and unpadded variants of both alphabets are accepted.
        [&BASE64, &BASE64_NOPAD, &BASE64URL, &BASE64URL_NOPAD]
            .into_iter()
            .find_map(|encoding| encoding.decode(encoded.as_bytes()).ok())
            .ok_or_else(|| de::Error::invalid_value(Unexpected::Str(&encoded), &"base64 bytes"))
    }
}

/// Integer types that may appear as JSON numbers or decimal strings.
trait JsonInteger: Sized + Default + TryFrom<i64> + TryFrom<u64> + std::str::FromStr {
    const EXPECTING: &'static str;
}

impl JsonInteger for i64 {
    const EXPECTING: &'static str = "a 64-bit integer";
}

impl JsonInteger for u32 {
    const EXPECTING: &'static str = "an unsigned 32-bit integer";
}

struct IntegerVisitor<T>(PhantomData<T>);

impl<T: JsonInteger> Visitor<'_> for IntegerVisitor<T> {
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(T::EXPECTING)
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<T, E> {
        <T as TryFrom<i64>>::try_from(value)
            .map_err(|_| E::invalid_value(Unexpected::Signed(value), &self))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<T, E> {
        <T as TryFrom<u64>>::try_from(value)
            .map_err(|_| E::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<T, E> {
        if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
            self.visit_i64(value as i64)
        } else {
            Err(E::invalid_value(Unexpected::Float(value), &self))
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<T, E> {
        value
            .parse()
            .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_unit<E: de::Error>(self) -> Result<T, E> {
        Ok(T::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<T, E> {
        Ok(T::default())
    }
}

/// `int64` fields, emitted as quoted decimal strings.
pub mod int64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        deserializer.deserialize_any(IntegerVisitor(PhantomData))
    }
}

/// `uint32` fields, emitted as JSON numbers.
pub mod uint32 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        deserializer.deserialize_any(IntegerVisitor(PhantomData))
    }
}

/// `double` fields, which additionally accept the special string values.
pub mod float64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if value.is_infinite() && value.is_sign_positive() {
            serializer.serialize_str("Infinity")
        } else if value.is_infinite() {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    struct FloatVisitor;

    impl Visitor<'_> for FloatVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a floating point number")
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<f64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<f64, E> {
            Ok(value as f64)
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<f64, E> {
            match value {
                "NaN" => Ok(f64::NAN),
                "Infinity" => Ok(f64::INFINITY),
                "-Infinity" => Ok(f64::NEG_INFINITY),
                _ => value
                    .parse()
                    .map_err(|_| E::invalid_value(Unexpected::Str(value), &self)),
            }
        }

        fn visit_unit<E: de::Error>(self) -> Result<f64, E> {
            Ok(0.0)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        deserializer.deserialize_any(FloatVisitor)
    }
}

/// Protobuf enumerations that are referenced by name in JSON.
pub(crate) trait JsonEnum: Sized {
    /// The name as declared in the protobuf schema.
    fn json_name(value: i32) -> Option<&'static str>;
    /// Looks up the numeric value of a declared name.
    fn from_json_name(name: &str) -> Option<i32>;
}

pub(crate) fn serialize_enum<E, S>(value: i32, serializer: S) -> Result<S::Ok, S::Error>
where
    E: JsonEnum,
    S: Serializer,
{
    match E::json_name(value) {
        Some(name) => serializer.serialize_str(name),
        None => serializer.serialize_i32(value),
    }
}

struct EnumVisitor<E>(PhantomData<E>);

impl<E: JsonEnum> Visitor<'_> for EnumVisitor<E> {
    type Value = i32;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an enum name or number")
    }

    fn visit_str<DeError: de::Error>(self, value: &str) -> Result<i32, DeError> {
        E::from_json_name(value)
            .ok_or_else(|| DeError::invalid_value(Unexpected::Str(value), &self))
    }

    fn visit_i64<DeError: de::Error>(self, value: i64) -> Result<i32, DeError> {
        i32::try_from(value).map_err(|_| DeError::invalid_value(Unexpected::Signed(value), &self))
    }

    fn visit_u64<DeError: de::Error>(self, value: u64) -> Result<i32, DeError> {
        i32::try_from(value).map_err(|_| DeError::invalid_value(Unexpected::Unsigned(value), &self))
    }

    fn visit_unit<DeError: de::Error>(self) -> Result<i32, DeError> {
        Ok(0)
    }
}

pub(crate) fn deserialize_enum<'de, E, D>(deserializer: D) -> Result<i32, D::Error>
where
    E: JsonEnum,
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(EnumVisitor::<E>(PhantomData))
}

/// Declares a serde `with` module for an enumeration field.
macro_rules! json_enum_module {
    ($module:ident, $ty:ty) => {
        pub mod $module {
            pub fn serialize<S: ::serde::Serializer>(
                value: &i32,
                serializer: S,
            ) -> Result<S::Ok, S::Error> {
                $crate::json::serialize_enum::<$ty, S>(*value, serializer)
            }

            pub fn deserialize<'de, D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> Result<i32, D::Error> {
                $crate::json::deserialize_enum::<$ty, D>(deserializer)
            }
        }
    };
}

json_enum_module!(value_type, crate::ValueType);
json_enum_module!(span_ref_type, crate::SpanRefType);

/// `google.protobuf.Timestamp` fields as RFC 3339 strings.
pub mod timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Timestamp>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(timestamp) => serializer.collect_str(timestamp),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Timestamp>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) => value.parse().map(Some).map_err(|_| {
                de::Error::invalid_value(Unexpected::Str(&value), &"an RFC 3339 timestamp")
            }),
            None => Ok(None),
        }
    }
}

/// `google.protobuf.Duration` fields as decimal seconds strings, e.g. `1.000340s`.
pub mod duration {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.collect_str(duration),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(value) => value.parse().map(Some).map_err(|_| {
                de::Error::invalid_value(Unexpected::Str(&value), &"a duration in seconds")
            }),
            None => Ok(None),
        }
    }
}
