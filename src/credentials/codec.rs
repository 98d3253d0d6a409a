//! Store-native string framing and the hex wrapping applied to secret bytes.
//!
//! A string value on the wire is `i32 LE length || content || 0x00`, where the
//! length counts the content plus the terminator. Hash and salt bytes are
//! rendered as lowercase hex before framing, so the store only ever sees
//! printable strings and the schema can check them with a pattern.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::credentials::error::CodecError;

const LEN_PREFIX: usize = 4;

/// Framed bytes of one string value, exactly as the store reads and writes them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WireValue(Bytes);

impl WireValue {
    /// Wraps bytes received from the store. No checks happen until decoding.
    pub fn from_raw(raw: impl Into<Bytes>) -> Self {
        Self(raw.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The framed string content, if the framing is intact.
    pub fn as_str(&self) -> Result<&str, CodecError> {
        unframe(&self.0)
    }
}

/// Length prefix for `content_len` bytes of content plus the terminator.
///
/// # Panics
///
/// If the framed length does not fit the `i32` prefix, i.e. the content is
/// `i32::MAX` bytes or longer.
fn length_prefix(content_len: usize) -> i32 {
    match content_len.checked_add(1).map(i32::try_from) {
        Some(Ok(len)) => len,
        _ => panic!("{content_len} bytes of string content exceed the i32 length prefix"),
    }
}

/// Frames a string the way the store encodes its native string values.
///
/// # Panics
///
/// If `s` is `i32::MAX` bytes or longer, which no store string can hold.
pub fn frame(s: &str) -> WireValue {
    let len = length_prefix(s.len());
    let mut buf = BytesMut::with_capacity(LEN_PREFIX + s.len() + 1);
    buf.put_i32_le(len);
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
    WireValue(buf.freeze())
}

/// Reads a framed string back, rejecting anything whose framing is off.
pub fn unframe(buf: &[u8]) -> Result<&str, CodecError> {
    if buf.len() < LEN_PREFIX {
        return Err(CodecError::Truncated {
            available: buf.len(),
        });
    }
    let (mut prefix, rest) = buf.split_at(LEN_PREFIX);
    let declared = prefix.get_i32_le();
    if declared < 1 {
        return Err(CodecError::InvalidLength { declared });
    }
    if declared as usize != rest.len() {
        return Err(CodecError::LengthMismatch {
            declared,
            available: rest.len(),
        });
    }

    let (content, terminator) = rest.split_at(rest.len() - 1);
    if terminator[0] != 0 {
        return Err(CodecError::MissingTerminator {
            found: terminator[0],
        });
    }
    std::str::from_utf8(content).map_err(|_| CodecError::InvalidUtf8)
}

/// Encodes secret bytes (hash or salt) into their wire value. Never fails.
pub fn encode(secret: &[u8]) -> WireValue {
    frame(&hex::encode(secret))
}

/// Decodes a wire value produced by [`encode`].
pub fn decode(wire: &[u8]) -> Result<Vec<u8>, CodecError> {
    let content = unframe(wire)?;
    Ok(hex::decode(content)?)
}
