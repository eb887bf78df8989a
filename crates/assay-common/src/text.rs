//! Fixed-width text field codec.
//!
//! Field layout: one length byte holding the number of meaningful bytes,
//! followed by exactly `width` bytes of UTF-8 data padded with zeros.
//! Decoding uses the stored length, so trailing NUL padding is never
//! interpreted as characters. Serialized field size is always `1 + width`.

use bytes::{Buf, BufMut};

/// Encodes `s` into `buf` as a length-prefixed fixed-width field.
///
/// Strings longer than `width` bytes are truncated at a character
/// boundary.
pub fn put_fixed_str(buf: &mut impl BufMut, s: &str, width: usize) {
    let truncated = truncate_to_width(s, width);
    let raw = truncated.as_bytes();

    buf.put_u8(raw.len() as u8);
    buf.put_slice(raw);
    buf.put_bytes(0, width - raw.len());
}

/// Decodes a length-prefixed fixed-width field from `buf`.
///
/// Always consumes exactly `1 + width` bytes. A stored length larger
/// than `width`, or bytes that are not valid UTF-8, yield an empty
/// string rather than an error (padding damage is not fatal).
pub fn get_fixed_str(buf: &mut impl Buf, width: usize) -> String {
    let len = buf.get_u8() as usize;
    let mut raw = vec![0u8; width];
    buf.copy_to_slice(&mut raw);

    if len > width {
        return String::new();
    }
    raw.truncate(len);
    String::from_utf8(raw).unwrap_or_default()
}

/// Truncates `s` to at most `width` bytes without splitting a character.
fn truncate_to_width(s: &str, width: usize) -> &str {
    if s.len() <= width {
        return s;
    }
    let mut end = width;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
