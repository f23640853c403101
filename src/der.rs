//! Minimal DER emitter for test fixtures
//!
//! Backs the X.509 certificate builders in the integration tests and the
//! malformed-input construction in unit tests, where byte-level control
//! over tags, lengths, and orderings is the point. Production encoding of
//! KeyDescription values goes through the `asn1` crate instead. Only the
//! shapes an X.509 certificate body and the KeyMint schema need are
//! covered; lengths use the definite form and integers the minimal two's
//! complement encoding DER requires.

/// Appends a definite-form length.
pub fn encode_len(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

/// A complete TLV with the given (single-byte) tag.
pub fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    encode_len(&mut out, content.len());
    out.extend_from_slice(content);
    out
}

fn signed_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let msb_next = bytes[start + 1] & 0x80;
        if (bytes[start] == 0x00 && msb_next == 0) || (bytes[start] == 0xff && msb_next != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

fn unsigned_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count().min(7);
    let mut content = bytes[skip..].to_vec();
    if content[0] & 0x80 != 0 {
        content.insert(0, 0x00);
    }
    content
}

pub fn integer(value: i64) -> Vec<u8> {
    tlv(0x02, &signed_content(value))
}

/// INTEGER from raw big-endian magnitude bytes (certificate serials).
pub fn integer_bytes(magnitude: &[u8]) -> Vec<u8> {
    let skip = magnitude.iter().take_while(|&&b| b == 0).count();
    let rest = &magnitude[skip..];
    let mut content = Vec::with_capacity(rest.len() + 1);
    if rest.first().is_none_or(|b| b & 0x80 != 0) {
        content.push(0x00);
    }
    content.extend_from_slice(rest);
    tlv(0x02, &content)
}

pub fn enumerated(value: u32) -> Vec<u8> {
    tlv(0x0a, &unsigned_content(u64::from(value)))
}

pub fn boolean(value: bool) -> Vec<u8> {
    tlv(0x01, &[if value { 0xff } else { 0x00 }])
}

pub fn null() -> Vec<u8> {
    tlv(0x05, &[])
}

pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    tlv(0x04, bytes)
}

pub fn utf8_string(value: &str) -> Vec<u8> {
    tlv(0x0c, value.as_bytes())
}

/// BIT STRING with no unused bits.
pub fn bit_string(bytes: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(bytes.len() + 1);
    content.push(0x00);
    content.extend_from_slice(bytes);
    tlv(0x03, &content)
}

pub fn utc_time(value: &str) -> Vec<u8> {
    tlv(0x17, value.as_bytes())
}

pub fn oid(arcs: &[u64]) -> Vec<u8> {
    let mut content = Vec::new();
    content.push((arcs[0] * 40 + arcs[1]) as u8);
    for &arc in &arcs[2..] {
        content.extend_from_slice(&base128(arc));
    }
    tlv(0x06, &content)
}

fn base128(mut value: u64) -> Vec<u8> {
    let mut groups = [0u8; 10];
    let mut count = 0;
    loop {
        groups[count] = (value & 0x7f) as u8;
        value >>= 7;
        count += 1;
        if value == 0 {
            break;
        }
    }
    let mut out = Vec::with_capacity(count);
    for i in (0..count).rev() {
        out.push(if i == 0 { groups[i] } else { groups[i] | 0x80 });
    }
    out
}

pub fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x30, &parts.concat())
}

/// SET OF with members sorted by their encoding, as DER requires.
pub fn set_of(parts: &[Vec<u8>]) -> Vec<u8> {
    let mut sorted = parts.to_vec();
    sorted.sort();
    tlv(0x31, &sorted.concat())
}

/// SET with members in the given order (single-member RDNs in fixtures).
pub fn set(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(0x31, &parts.concat())
}

/// Constructed context-specific tag, high-tag-number form when >= 31.
pub fn context(tag_number: u32, inner: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(inner.len() + 6);
    if tag_number < 31 {
        out.push(0xa0 | tag_number as u8);
    } else {
        out.push(0xbf);
        out.extend_from_slice(&base128(u64::from(tag_number)));
    }
    encode_len(&mut out, inner.len());
    out.extend_from_slice(inner);
    out
}
