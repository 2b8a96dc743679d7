//! Default scalar codecs
//!
//! Numbers and booleans encode to their native [`Value`] variants, byte
//! vectors to `Value::Bytes`; text-like
//! types (strings, characters, UUIDs, big integers, durations) encode to
//! `Value::String`. Every codec also decodes its textual form, so map keys
//! and documents written as text read back correctly.

use super::ScalarCodec;
use crate::error::{Error, Result};
use crate::value::Value;
use num_bigint::BigInt;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

fn unexpected<T>(value: &Value) -> Error {
    Error::codec::<T>(format!("unexpected {} value", value.type_name()))
}

fn parse<T: FromStr>(text: &str) -> Result<T>
where
    T::Err: Display,
{
    text.trim()
        .parse::<T>()
        .map_err(|e| Error::codec::<T>(format!("cannot parse {:?}: {}", text, e)))
}

/// `String` codec
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl ScalarCodec<String> for StringCodec {
    fn encode(&self, value: &String) -> Result<Value> {
        Ok(Value::String(value.clone()))
    }

    fn decode(&self, value: &Value) -> Result<String> {
        match value {
            Value::String(s) => Ok(s.clone()),
            other => other.to_text().ok_or_else(|| unexpected::<String>(other)),
        }
    }
}

/// `char` codec, stored as a one-character string
#[derive(Debug, Clone, Copy, Default)]
pub struct CharCodec;

impl ScalarCodec<char> for CharCodec {
    fn encode(&self, value: &char) -> Result<Value> {
        Ok(Value::String(value.to_string()))
    }

    fn decode(&self, value: &Value) -> Result<char> {
        let text = value.as_str().ok_or_else(|| unexpected::<char>(value))?;
        let mut chars = text.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::codec::<char>(format!(
                "expected exactly one character, got {:?}",
                text
            ))),
        }
    }
}

/// Integer codec for `i8`, `i16`, `i32` and `i64`
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerCodec;

impl<T> ScalarCodec<T> for IntegerCodec
where
    T: Copy + Into<i64> + TryFrom<i64> + FromStr + 'static,
    T::Err: Display,
{
    fn encode(&self, value: &T) -> Result<Value> {
        Ok(Value::Int((*value).into()))
    }

    fn decode(&self, value: &Value) -> Result<T> {
        match value {
            Value::Int(i) => T::try_from(*i)
                .map_err(|_| Error::codec::<T>(format!("{} is out of range", i))),
            Value::String(s) => parse::<T>(s),
            other => Err(unexpected::<T>(other)),
        }
    }
}

/// Floating point codec for `f32` and `f64`
#[derive(Debug, Clone, Copy, Default)]
pub struct FloatCodec;

/// Narrowing from `f64`, implemented for the supported float types
pub trait FromF64: Sized {
    /// Convert, rounding to the nearest representable value
    fn from_f64(value: f64) -> Self;
}

impl FromF64 for f32 {
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl FromF64 for f64 {
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl<T> ScalarCodec<T> for FloatCodec
where
    T: Copy + Into<f64> + FromF64 + FromStr + 'static,
    T::Err: Display,
{
    fn encode(&self, value: &T) -> Result<Value> {
        Ok(Value::Float((*value).into()))
    }

    fn decode(&self, value: &Value) -> Result<T> {
        match value {
            Value::Float(f) => Ok(T::from_f64(*f)),
            Value::Int(i) => Ok(T::from_f64(*i as f64)),
            Value::String(s) => parse::<T>(s),
            other => Err(unexpected::<T>(other)),
        }
    }
}

/// `bool` codec
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolCodec;

impl ScalarCodec<bool> for BoolCodec {
    fn encode(&self, value: &bool) -> Result<Value> {
        Ok(Value::Bool(*value))
    }

    fn decode(&self, value: &Value) -> Result<bool> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => parse::<bool>(s),
            other => Err(unexpected::<bool>(other)),
        }
    }
}

/// `BigInt` codec, stored as a decimal string
#[derive(Debug, Clone, Copy, Default)]
pub struct BigIntCodec;

impl ScalarCodec<BigInt> for BigIntCodec {
    fn encode(&self, value: &BigInt) -> Result<Value> {
        Ok(Value::String(value.to_string()))
    }

    fn decode(&self, value: &Value) -> Result<BigInt> {
        match value {
            Value::String(s) => parse::<BigInt>(s),
            Value::Int(i) => Ok(BigInt::from(*i)),
            other => Err(unexpected::<BigInt>(other)),
        }
    }
}

/// `Uuid` codec, stored in hyphenated form
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidCodec;

impl ScalarCodec<Uuid> for UuidCodec {
    fn encode(&self, value: &Uuid) -> Result<Value> {
        Ok(Value::String(value.hyphenated().to_string()))
    }

    fn decode(&self, value: &Value) -> Result<Uuid> {
        let text = value.as_str().ok_or_else(|| unexpected::<Uuid>(value))?;
        Uuid::parse_str(text.trim()).map_err(|e| Error::codec::<Uuid>(e.to_string()))
    }
}

/// `Vec<u8>` codec, stored as `Value::Bytes`
///
/// Also decodes an array of integers in `0..=255`, the form stores without
/// a binary type use.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl ScalarCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Value> {
        Ok(Value::Bytes(value.clone()))
    }

    fn decode(&self, value: &Value) -> Result<Vec<u8>> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_int()
                        .and_then(|i| u8::try_from(i).ok())
                        .ok_or_else(|| Error::codec::<Vec<u8>>(format!("{} is not a byte", item)))
                })
                .collect(),
            other => Err(unexpected::<Vec<u8>>(other)),
        }
    }
}

/// `Duration` codec, stored as `"<secs>.<nanos>"` with nine nanosecond digits
#[derive(Debug, Clone, Copy, Default)]
pub struct DurationCodec;

impl ScalarCodec<Duration> for DurationCodec {
    fn encode(&self, value: &Duration) -> Result<Value> {
        Ok(Value::String(format!(
            "{}.{:09}",
            value.as_secs(),
            value.subsec_nanos()
        )))
    }

    fn decode(&self, value: &Value) -> Result<Duration> {
        match value {
            Value::Int(secs) if *secs >= 0 => Ok(Duration::from_secs(*secs as u64)),
            Value::String(text) => {
                let text = text.trim();
                let (secs, nanos) = text.split_once('.').unwrap_or((text, "0"));
                if nanos.len() > 9 {
                    return Err(Error::codec::<Duration>(format!(
                        "too many fractional digits in {:?}",
                        text
                    )));
                }
                let secs = parse::<u64>(secs)?;
                // Right-pad so "1.5" means 500ms, not 5ns
                let nanos = parse::<u32>(&format!("{:0<9}", nanos))?;
                Ok(Duration::new(secs, nanos))
            }
            other => Err(unexpected::<Duration>(other)),
        }
    }
}
