//! Object key policy shared by every backend.
//!
//! A submitted filename becomes its storage key by keeping only the last path
//! component (`/` and `\` both count as separators), dropping control
//! characters and trimming surrounding whitespace. Empty names, `.` and `..`
//! are rejected. Two uploads with the same name map to the same key.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left as-is when a key is placed in a URL path segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Turn a browser-supplied filename into an object key.
///
/// Returns `None` when nothing usable is left.
pub fn object_key_for(filename: &str) -> Option<String> {
    let last = filename.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    match cleaned {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Percent-encode a key for use as a single URL path segment
pub fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_SEGMENT).to_string()
}

/// Decode a URL path segment back to the key. Invalid UTF-8 yields `None`.
pub fn decode_key(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_is_kept() {
        assert_eq!(object_key_for("a.txt").as_deref(), Some("a.txt"));
        assert_eq!(object_key_for("report 2024.pdf").as_deref(), Some("report 2024.pdf"));
    }

    #[test]
    fn test_directories_are_stripped() {
        assert_eq!(object_key_for("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(object_key_for("C:\\Users\\me\\photo.png").as_deref(), Some("photo.png"));
    }

    #[test]
    fn test_rejects_empty_and_dot_names() {
        assert_eq!(object_key_for(""), None);
        assert_eq!(object_key_for("   "), None);
        assert_eq!(object_key_for(".."), None);
        assert_eq!(object_key_for("dir/"), None);
    }

    #[test]
    fn test_control_characters_removed() {
        assert_eq!(object_key_for("evil\r\nname.txt").as_deref(), Some("evilname.txt"));
    }

    #[test]
    fn test_encode_decode_key() {
        let key = "résumé final (2).pdf";
        let encoded = encode_key(key);
        assert!(!encoded.contains(' '));
        assert!(!encoded.contains('/'));
        assert_eq!(decode_key(&encoded).as_deref(), Some(key));
    }

    #[test]
    fn test_decode_rejects_invalid_utf8() {
        assert_eq!(decode_key("%FF%FE"), None);
    }
}
