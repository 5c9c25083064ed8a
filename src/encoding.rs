//! Source-encoding detection and decoding to UTF-8.
//!
//! Samples must be valid UTF-8 regardless of what the upstream dataset ships.
//! Detection is deliberately simple: a BOM wins, otherwise strict UTF-8
//! validation, otherwise windows-1252.

use std::borrow::Cow;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::Result;

const SNIFF_BYTES: usize = 64 * 1024;

/// Inspects the first 64 KiB of `path` and picks an encoding.
///
/// # Errors
///
/// Returns an error when the file cannot be read.
pub fn sniff(path: &Path) -> Result<&'static Encoding> {
    let mut head = vec![0u8; SNIFF_BYTES];
    let mut file = File::open(path)?;
    let mut filled = 0;
    loop {
        let read = file.read(&mut head[filled..])?;
        if read == 0 {
            break;
        }
        filled += read;
        if filled == head.len() {
            break;
        }
    }
    head.truncate(filled);
    Ok(sniff_bytes(&head))
}

/// Picks an encoding for a byte prefix: BOM, then strict UTF-8 validation,
/// then windows-1252.
#[must_use]
pub fn sniff_bytes(head: &[u8]) -> &'static Encoding {
    if let Some((encoding, _bom_len)) = Encoding::for_bom(head) {
        return encoding;
    }
    // A sniff window may end mid-sequence; valid_up_to near the end still
    // counts as UTF-8.
    match simdutf8::compat::from_utf8(head) {
        Ok(_) => UTF_8,
        Err(err) if head.len() - err.valid_up_to() < 4 && err.error_len().is_none() => UTF_8,
        Err(_) => WINDOWS_1252,
    }
}

/// Resolves a user-supplied encoding label, tolerating case and underscore
/// variants. Returns `None` for unknown labels.
#[must_use]
pub fn resolve_label(name: &str) -> Option<&'static Encoding> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }
    Encoding::for_label(trimmed.as_bytes()).or_else(|| {
        let lower = trimmed.to_ascii_lowercase();
        Encoding::for_label(lower.as_bytes())
            .or_else(|| Encoding::for_label(lower.replace('_', "-").as_bytes()))
    })
}

/// Decodes `bytes` to UTF-8, borrowing when already valid. Never fails;
/// stray bytes become replacement characters.
#[must_use]
pub fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    if encoding == UTF_8 {
        return String::from_utf8_lossy(bytes);
    }
    let (decoded, _, _) = encoding.decode(bytes);
    decoded
}

#[cfg(test)]
mod tests {
    use super::{decode, resolve_label, sniff_bytes};
    use encoding_rs::{UTF_8, UTF_16LE, WINDOWS_1252};
    use std::borrow::Cow;

    #[test]
    fn bom_wins() {
        assert_eq!(sniff_bytes(b"\xff\xfea\x00"), UTF_16LE);
        assert_eq!(sniff_bytes(b"\xef\xbb\xbfabc"), UTF_8);
    }

    #[test]
    fn valid_utf8_is_utf8() {
        assert_eq!(sniff_bytes("id,n\u{e5}me\n".as_bytes()), UTF_8);
    }

    #[test]
    fn latin1_bytes_fall_back() {
        assert_eq!(sniff_bytes(b"id,n\xe5me\n"), WINDOWS_1252);
    }

    #[test]
    fn truncated_utf8_sequence_at_window_edge_is_utf8() {
        let mut bytes = b"abc".to_vec();
        bytes.extend_from_slice(&"\u{e5}".as_bytes()[..1]);
        assert_eq!(sniff_bytes(&bytes), UTF_8);
    }

    #[test]
    fn labels_tolerate_case_and_underscores() {
        assert_eq!(resolve_label("WINDOWS_1252"), Some(WINDOWS_1252));
        assert_eq!(resolve_label("latin1"), Some(WINDOWS_1252));
        assert_eq!(resolve_label(""), None);
        assert_eq!(resolve_label("no-such-encoding"), None);
    }

    #[test]
    fn decode_borrows_valid_utf8() {
        let decoded = decode(b"plain ascii", UTF_8);
        assert!(matches!(decoded, Cow::Borrowed("plain ascii")));
        let decoded = decode(b"caf\xe9", WINDOWS_1252);
        assert_eq!(decoded, "caf\u{e9}");
    }
}
