//! Canonical JSON serialization for deterministic content hashing.
//!
//! Catalog documents are addressed by the hash of their canonical encoding,
//! so the encoding must be byte-stable across processes and releases:
//!
//! - Object keys sorted lexicographically (UTF-8 byte order)
//! - No whitespace
//! - UTF-8 output
//! - Integers only (floats rejected)
//!
//! Floats are rejected because their stringification is not deterministic
//! across languages and serializer versions; documents that participate in
//! identity must use integers (millis, counts, bytes).

use serde::Serialize;
use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Errors that can occur during canonical JSON serialization.
#[derive(Debug, Error)]
pub enum CanonicalJsonError {
    /// Serde JSON conversion failed.
    #[error("serde_json error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Float values are not allowed in canonical JSON.
    #[error("float values are not allowed in canonical JSON (use integers)")]
    FloatNotAllowed,

    /// Non-finite number (NaN, Infinity) encountered.
    #[error("non-finite number not allowed: {0}")]
    NonFiniteNumber(String),

    /// IO error during writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 encoding error (should never happen with valid JSON).
    #[error("UTF-8 encoding error")]
    Utf8Error,
}

impl serde::ser::Error for CanonicalJsonError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Self::Serde(<serde_json::Error as serde::ser::Error>::custom(
            msg.to_string(),
        ))
    }
}

impl From<CanonicalJsonError> for crate::error::Error {
    fn from(err: CanonicalJsonError) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

/// Serialize `value` into canonical JSON bytes.
///
/// # Errors
///
/// Returns `CanonicalJsonError::FloatNotAllowed` if the value contains
/// floats, `CanonicalJsonError::NonFiniteNumber` for NaN or infinities, or
/// `CanonicalJsonError::Serde` if serialization fails.
#[must_use = "canonical bytes should be used for hashing"]
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CanonicalJsonError> {
    // Floats must be caught before the Value conversion: serde_json folds
    // NaN and infinities into null there, which would silently hand three
    // different documents the same identity.
    reject_floats(value)?;
    let v = serde_json::to_value(value)?;
    let mut out = Vec::<u8>::new();
    write_value(&v, &mut out)?;
    Ok(out)
}

/// Same as `to_canonical_bytes`, but returns a UTF-8 String.
///
/// # Errors
///
/// Returns `CanonicalJsonError::FloatNotAllowed` if the value contains
/// floats, `CanonicalJsonError::NonFiniteNumber` for NaN or infinities,
/// `CanonicalJsonError::Serde` if serialization fails, or
/// `CanonicalJsonError::Utf8Error` if UTF-8 conversion fails.
#[must_use = "canonical string should be used for hashing"]
pub fn to_canonical_string<T: Serialize>(value: &T) -> Result<String, CanonicalJsonError> {
    let bytes = to_canonical_bytes(value)?;
    String::from_utf8(bytes).map_err(|_| CanonicalJsonError::Utf8Error)
}

/// Computes the content hash of a document: base64 of the SHA-256 digest of
/// its canonical JSON bytes.
///
/// Standard base64 with padding; consumers that embed the hash in a path must
/// sanitize it first.
///
/// # Errors
///
/// Returns an error if the value cannot be canonicalized.
#[must_use = "the content hash identifies the document"]
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, CanonicalJsonError> {
    let bytes = to_canonical_bytes(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(BASE64.encode(digest))
}

/// Walks the value through a no-output serializer that errors on any float.
fn reject_floats<T: Serialize>(value: &T) -> Result<(), CanonicalJsonError> {
    value.serialize(FloatScan)
}

struct FloatScan;

struct FloatScanCompound;

impl serde::ser::Serializer for FloatScan {
    type Ok = ();
    type Error = CanonicalJsonError;

    type SerializeSeq = FloatScanCompound;
    type SerializeTuple = FloatScanCompound;
    type SerializeTupleStruct = FloatScanCompound;
    type SerializeTupleVariant = FloatScanCompound;
    type SerializeMap = FloatScanCompound;
    type SerializeStruct = FloatScanCompound;
    type SerializeStructVariant = FloatScanCompound;

    fn serialize_bool(self, _v: bool) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i8(self, _v: i8) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i16(self, _v: i16) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i32(self, _v: i32) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i64(self, _v: i64) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_i128(self, _v: i128) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u8(self, _v: u8) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u16(self, _v: u16) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u32(self, _v: u32) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u64(self, _v: u64) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_u128(self, _v: u128) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_f32(self, v: f32) -> Result<Self::Ok, Self::Error> {
        if v.is_finite() {
            Err(CanonicalJsonError::FloatNotAllowed)
        } else {
            Err(CanonicalJsonError::NonFiniteNumber(v.to_string()))
        }
    }

    fn serialize_f64(self, v: f64) -> Result<Self::Ok, Self::Error> {
        if v.is_finite() {
            Err(CanonicalJsonError::FloatNotAllowed)
        } else {
            Err(CanonicalJsonError::NonFiniteNumber(v.to_string()))
        }
    }

    fn serialize_char(self, _v: char) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_str(self, _v: &str) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(FloatScanCompound)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(FloatScanCompound)
    }
}

impl serde::ser::SerializeSeq for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeTuple for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleStruct for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeTupleVariant for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeMap for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), Self::Error> {
        key.serialize(FloatScan)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeStruct for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl serde::ser::SerializeStructVariant for FloatScanCompound {
    type Ok = ();
    type Error = CanonicalJsonError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FloatScan)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

fn write_value(v: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalJsonError> {
    match v {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(n) => write_number(n, out)?,
        Value::String(s) => {
            // Writes JSON string with quotes + escaping, no whitespace.
            serde_json::to_writer(&mut *out, s)?;
        }
        Value::Array(arr) => {
            out.push(b'[');
            for (i, item) in arr.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => write_object(map, out)?,
    }
    Ok(())
}

fn write_object(map: &Map<String, Value>, out: &mut Vec<u8>) -> Result<(), CanonicalJsonError> {
    out.push(b'{');

    // Collect keys and sort deterministically by UTF-8 byte order.
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();

    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }

        serde_json::to_writer(&mut *out, *k)?;
        out.push(b':');

        // Key is guaranteed to exist since we got it from map.keys()
        if let Some(val) = map.get(*k) {
            write_value(val, out)?;
        }
    }

    out.push(b'}');
    Ok(())
}

fn write_number(n: &Number, out: &mut Vec<u8>) -> Result<(), CanonicalJsonError> {
    use std::io::Write;

    if let Some(i) = n.as_i64() {
        write!(out, "{i}")?;
        return Ok(());
    }
    if let Some(u) = n.as_u64() {
        write!(out, "{u}")?;
        return Ok(());
    }

    // serde_json::Number only stores a float when the value doesn't fit in
    // i64/u64, so reaching here means the input contained a float.
    Err(CanonicalJsonError::FloatNotAllowed)
}
