//! Source bytes as parser text
//!
//! Legacy PHP is often saved as Latin-1 or CP-1252. The parser works on
//! `&str`, while report offsets refer to the bytes on disk, so decoding must
//! not move any byte.

use std::borrow::Cow;

/// Stand-in for each byte of an invalid UTF-8 sequence; an identifier
/// character, so `$caf\xe9` still lexes as one variable
pub const INVALID_BYTE: char = '_';

/// Text with the same byte length as `bytes`. Valid UTF-8 is borrowed as is;
/// otherwise every byte of an invalid sequence becomes `INVALID_BYTE`.
pub fn decode_preserving_offsets(bytes: &[u8]) -> Cow<'_, str> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(bytes.len());
    let mut rest = bytes;
    while !rest.is_empty() {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                out.push_str(valid);
                break;
            }
            Err(error) => {
                let (valid, after) = rest.split_at(error.valid_up_to());
                out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                // a truncated sequence at the end has no error_len
                let invalid = error.error_len().unwrap_or(after.len());
                out.extend(std::iter::repeat(INVALID_BYTE).take(invalid));
                rest = &after[invalid..];
            }
        }
    }
    Cow::Owned(out)
}
