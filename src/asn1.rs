//! ASN.1 primitive coercions
//!
//! Type-safe extraction of integers, enumerated values, octet strings,
//! booleans, UTF-8 strings, sets, sequences, and tagged objects from a
//! decoded [`BerObject`]. Mismatches fail with an [`ExtensionParsingError`]
//! carrying the observed shape. UTF-8 decoding is strict; malformed bytes
//! are an error, never a replacement character.

use der_parser::ber::{BerObject, BerObjectContent};

use crate::error::{ExtensionParsingError, ExtensionParsingReason};

pub(crate) type ParseResult<T> = Result<T, ExtensionParsingError>;

pub(crate) fn parse_der(bytes: &[u8]) -> ParseResult<BerObject<'_>> {
    let (_, obj) = der_parser::parse_der(bytes).map_err(|e| {
        ExtensionParsingError::with_reason(
            format!("Malformed DER: {e:?}"),
            ExtensionParsingReason::MalformedDer,
        )
    })?;
    Ok(obj)
}

fn shape_error(expected: &str, got: &BerObjectContent) -> ExtensionParsingError {
    ExtensionParsingError::new(format!("Expected {expected}, got {got:?}"))
}

pub(crate) fn as_sequence<'a, 'b>(obj: &'a BerObject<'b>) -> ParseResult<&'a [BerObject<'b>]> {
    match &obj.content {
        BerObjectContent::Sequence(items) => Ok(items),
        other => Err(shape_error("SEQUENCE", other)),
    }
}

pub(crate) fn as_set<'a, 'b>(obj: &'a BerObject<'b>) -> ParseResult<&'a [BerObject<'b>]> {
    match &obj.content {
        BerObjectContent::Set(items) => Ok(items),
        other => Err(shape_error("SET", other)),
    }
}

/// Reads an INTEGER (or ENUMERATED) as a two's complement `i64`.
///
/// ASN.1 integers are sign-extended big-endian: a positive value whose high
/// bit would be set gets a leading 0x00, a negative value has the high bit
/// set in its first content byte.
pub(crate) fn as_integer(obj: &BerObject) -> ParseResult<i64> {
    match &obj.content {
        BerObjectContent::Integer(bytes) => {
            if bytes.is_empty() {
                return Ok(0);
            }
            if bytes.len() > 8 {
                return Err(ExtensionParsingError::new(format!(
                    "INTEGER of {} bytes exceeds the supported width",
                    bytes.len()
                )));
            }
            let negative = (bytes[0] & 0x80) != 0;
            let mut value: i64 = if negative { -1 } else { 0 };
            for &byte in *bytes {
                value = (value << 8) | i64::from(byte);
            }
            Ok(value)
        }
        BerObjectContent::Enum(value) => i64::try_from(*value).map_err(|_| {
            ExtensionParsingError::new(format!("ENUMERATED value {value} out of range"))
        }),
        other => Err(shape_error("INTEGER", other)),
    }
}

pub(crate) fn as_octet_string<'a>(obj: &'a BerObject) -> ParseResult<&'a [u8]> {
    match &obj.content {
        BerObjectContent::OctetString(bytes) => Ok(bytes),
        other => Err(shape_error("OCTET STRING", other)),
    }
}

pub(crate) fn as_boolean(obj: &BerObject) -> ParseResult<bool> {
    match &obj.content {
        BerObjectContent::Boolean(value) => Ok(*value),
        other => Err(shape_error("BOOLEAN", other)),
    }
}

pub(crate) fn as_utf8(obj: &BerObject) -> ParseResult<String> {
    let bytes = as_octet_string(obj)?;
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        ExtensionParsingError::with_reason(
            format!("Invalid UTF-8 in string value: {e}"),
            ExtensionParsingReason::MalformedUtf8,
        )
    })
}

/// Tag number of a (context-tagged) object.
pub(crate) fn tag_number(obj: &BerObject) -> u32 {
    obj.tag().0
}

/// Unwraps an explicitly tagged object, re-parsing the inner TLV.
///
/// `der-parser` leaves context-specific tags as `Unknown` with the raw inner
/// bytes; universal objects pass through unchanged.
pub(crate) fn unwrap_tagged<'b>(obj: &BerObject<'b>) -> ParseResult<BerObject<'b>> {
    match &obj.content {
        BerObjectContent::Unknown(any) => parse_der(any.data),
        _ => Ok(obj.clone()),
    }
}
