//! Exchange protocol wire format
//!
//! Two message kinds, each on its own ALPN:
//!
//! - **File Request** (bidirectional stream): the requester writes
//!   `<name>\n` and closes its half; the responder answers with the raw blob
//!   bytes and closes, or closes without writing when the name is unknown.
//!   End-of-stream terminates the response, so an empty response means
//!   not-found; a responder holding a genuinely empty blob is
//!   indistinguishable from a miss on the wire.
//! - **File Broadcast** (unidirectional stream): `<name>\n<decimal-len>\n`
//!   followed by exactly `len` raw bytes.
//!
//! Names are UTF-8, non-empty, at most [`MAX_NAME_LEN`] bytes, and must not
//! contain a newline.

/// ALPN for File Request streams.
pub const FILE_REQUEST_ALPN: &[u8] = b"skiff/file/0";

/// ALPN for File Broadcast streams.
pub const FILE_BROADCAST_ALPN: &[u8] = b"skiff/broadcast/0";

/// Maximum length of a content name in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum size of a single transferred blob (64 MB).
///
/// A per-stream sanity bound, independent of the cache capacity.
pub const MAX_TRANSFER_SIZE: usize = 64 * 1024 * 1024;

/// Errors when encoding or decoding exchange messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Name is empty, too long, or contains a newline.
    InvalidName,
    /// Broadcast header is not `<name>\n<decimal-len>\n`.
    BadHeader,
    /// Broadcast body length does not match the header.
    LengthMismatch,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::InvalidName => write!(f, "invalid content name"),
            WireError::BadHeader => write!(f, "malformed broadcast header"),
            WireError::LengthMismatch => write!(f, "broadcast body length mismatch"),
        }
    }
}

impl std::error::Error for WireError {}

/// Check that `name` is usable on the wire.
pub fn validate_name(name: &str) -> Result<(), WireError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('\n') {
        return Err(WireError::InvalidName);
    }
    Ok(())
}

/// Encode a File Request: `<name>\n`.
pub fn encode_request(name: &str) -> Result<Vec<u8>, WireError> {
    validate_name(name)?;
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a File Request into the requested name.
pub fn decode_request(bytes: &[u8]) -> Result<&str, WireError> {
    let line = match bytes.split_last() {
        Some((&b'\n', rest)) => rest,
        _ => return Err(WireError::BadHeader),
    };
    let name = std::str::from_utf8(line).map_err(|_| WireError::InvalidName)?;
    validate_name(name)?;
    Ok(name)
}

/// Encode a File Broadcast header: `<name>\n<decimal-len>\n`.
pub fn encode_broadcast_header(name: &str, len: usize) -> Result<Vec<u8>, WireError> {
    validate_name(name)?;
    Ok(format!("{}\n{}\n", name, len).into_bytes())
}

/// Decode a complete File Broadcast message into `(name, body)`.
///
/// The whole stream must have been read first; the body must be exactly as
/// long as the header claims.
pub fn decode_broadcast(bytes: &[u8]) -> Result<(&str, &[u8]), WireError> {
    let name_end = bytes
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(WireError::BadHeader)?;
    let name = std::str::from_utf8(&bytes[..name_end]).map_err(|_| WireError::InvalidName)?;
    validate_name(name)?;

    let rest = &bytes[name_end + 1..];
    let len_end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(WireError::BadHeader)?;
    let len: usize = std::str::from_utf8(&rest[..len_end])
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(WireError::BadHeader)?;
    if len > MAX_TRANSFER_SIZE {
        return Err(WireError::BadHeader);
    }

    let body = &rest[len_end + 1..];
    if body.len() != len {
        return Err(WireError::LengthMismatch);
    }
    Ok((name, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let encoded = encode_request("notes.txt").unwrap();
        assert_eq!(encoded, b"notes.txt\n");
        assert_eq!(decode_request(&encoded).unwrap(), "notes.txt");
    }

    #[test]
    fn test_request_rejects_bad_names() {
        assert_eq!(encode_request(""), Err(WireError::InvalidName));
        assert_eq!(encode_request("a\nb"), Err(WireError::InvalidName));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert_eq!(encode_request(&long), Err(WireError::InvalidName));
    }

    #[test]
    fn test_request_decode_requires_newline() {
        assert_eq!(decode_request(b"no-terminator"), Err(WireError::BadHeader));
        assert_eq!(decode_request(b""), Err(WireError::BadHeader));
    }

    #[test]
    fn test_request_decode_rejects_invalid_utf8() {
        assert_eq!(decode_request(&[0xff, 0xfe, b'\n']), Err(WireError::InvalidName));
    }

    #[test]
    fn test_broadcast_roundtrip() {
        let body = b"hello world";
        let mut msg = encode_broadcast_header("greeting", body.len()).unwrap();
        msg.extend_from_slice(body);

        let (name, decoded) = decode_broadcast(&msg).unwrap();
        assert_eq!(name, "greeting");
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_broadcast_empty_body() {
        let msg = encode_broadcast_header("empty", 0).unwrap();
        let (name, body) = decode_broadcast(&msg).unwrap();
        assert_eq!(name, "empty");
        assert!(body.is_empty());
    }

    #[test]
    fn test_broadcast_short_body() {
        let mut msg = encode_broadcast_header("f", 10).unwrap();
        msg.extend_from_slice(b"short");
        assert_eq!(decode_broadcast(&msg), Err(WireError::LengthMismatch));
    }

    #[test]
    fn test_broadcast_trailing_bytes() {
        let mut msg = encode_broadcast_header("f", 3).unwrap();
        msg.extend_from_slice(b"abcdef");
        assert_eq!(decode_broadcast(&msg), Err(WireError::LengthMismatch));
    }

    #[test]
    fn test_broadcast_bad_header() {
        assert_eq!(decode_broadcast(b"no newlines at all"), Err(WireError::BadHeader));
        assert_eq!(decode_broadcast(b"name\nnot-a-number\nxx"), Err(WireError::BadHeader));
        assert_eq!(decode_broadcast(b"\n3\nabc"), Err(WireError::InvalidName));
    }

    #[test]
    fn test_broadcast_rejects_huge_claimed_length() {
        let msg = format!("f\n{}\n", MAX_TRANSFER_SIZE + 1).into_bytes();
        assert_eq!(decode_broadcast(&msg), Err(WireError::BadHeader));
    }

    #[test]
    fn test_alpns_are_distinct() {
        assert_ne!(FILE_REQUEST_ALPN, FILE_BROADCAST_ALPN);
    }
}
