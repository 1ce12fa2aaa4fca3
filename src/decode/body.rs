//! Best-effort text recovery from `attributedBody` blobs
//!
//! The column holds a typedstream-serialized NSAttributedString. We do not
//! deserialize the object graph; we scan for the string payload between a
//! start marker (`0x01 0x2B`) and an end marker (`0x86 0x84`) and keep the
//! longest decoded candidate.

const START_MARKER: [u8; 2] = [0x01, 0x2b];
const END_MARKER: [u8; 2] = [0x86, 0x84];

/// Header byte announcing a u16 little-endian length for strings over 127 bytes.
const LONG_LENGTH_HEADER: u8 = 0x81;

/// Decode an `attributedBody` blob into plain text. Never fails.
pub fn decode_attributed_body(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return String::new();
    }

    let mut best = String::new();
    let mut best_len = 0usize;

    let mut index = 0;
    while index + 1 < bytes.len() {
        if bytes[index..index + 2] == START_MARKER {
            let slice_start = index + 2;
            if let Some(slice_end) = find_sequence(&END_MARKER, bytes, slice_start) {
                let segment = strip_length_prefix(&bytes[slice_start..slice_end]);
                let candidate = decode_lossy_trimmed(segment);
                let candidate_len = candidate.chars().count();
                if candidate_len > best_len {
                    best = candidate;
                    best_len = candidate_len;
                }
            }
        }
        index += 1;
    }

    if !best.is_empty() {
        return best;
    }

    decode_lossy_trimmed(bytes)
}

/// Drop a length header when it agrees with the payload that follows it.
fn strip_length_prefix(segment: &[u8]) -> &[u8] {
    if segment.len() > 1 && usize::from(segment[0]) == segment.len() - 1 {
        return &segment[1..];
    }
    if segment.len() > 3 && segment[0] == LONG_LENGTH_HEADER {
        let declared = usize::from(u16::from_le_bytes([segment[1], segment[2]]));
        if declared == segment.len() - 3 {
            return &segment[3..];
        }
    }
    segment
}

fn find_sequence(needle: &[u8], haystack: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn decode_lossy_trimmed(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_start_matches(is_leading_junk).to_string()
}

/// Control (Cc) and invisible format (Cf) characters, CR/LF included.
fn is_leading_junk(c: char) -> bool {
    c.is_control()
        || matches!(
            c,
            '\u{00AD}'
                | '\u{061C}'
                | '\u{180E}'
                | '\u{200B}'..='\u{200F}'
                | '\u{202A}'..='\u{202E}'
                | '\u{2060}'..='\u{2064}'
                | '\u{2066}'..='\u{206F}'
                | '\u{FEFF}'
                | '\u{FFF9}'..='\u{FFFB}'
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let mut bytes = START_MARKER.to_vec();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&END_MARKER);
        bytes
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(decode_attributed_body(&[]), "");
    }

    #[test]
    fn test_plain_marker_pair() {
        assert_eq!(decode_attributed_body(&framed(b"fallback text")), "fallback text");
    }

    #[test]
    fn test_prefers_longest_segment() {
        let mut bytes = framed(b"short");
        bytes.extend_from_slice(b"\x00\x00junk");
        bytes.extend(framed(b"longer text"));
        bytes.extend(framed(b"mid"));
        assert_eq!(decode_attributed_body(&bytes), "longer text");
    }

    #[test]
    fn test_trims_control_characters() {
        assert_eq!(decode_attributed_body(&framed(b"\x00\x01\r\nhello")), "hello");
    }

    #[test]
    fn test_drops_matching_length_prefix() {
        let text = "length prefixed";
        let mut payload = vec![text.len() as u8];
        payload.extend_from_slice(text.as_bytes());
        assert_eq!(decode_attributed_body(&framed(&payload)), text);
    }

    #[test]
    fn test_keeps_first_byte_when_not_a_length() {
        // 'a' is 97, which is not the remaining length of this payload
        assert_eq!(decode_attributed_body(&framed(b"abc")), "abc");
    }

    #[test]
    fn test_long_repeated_pattern_is_not_truncated() {
        let long_text = "aaaaaaaaaaaa ".repeat(100);
        assert_eq!(long_text.len(), 1300);
        let decoded = decode_attributed_body(&framed(long_text.as_bytes()));
        assert_eq!(decoded, long_text);
        assert_eq!(decoded.chars().count(), long_text.chars().count());
    }

    #[test]
    fn test_long_length_header() {
        let text = "x".repeat(300);
        let mut payload = vec![LONG_LENGTH_HEADER];
        payload.extend_from_slice(&(text.len() as u16).to_le_bytes());
        payload.extend_from_slice(text.as_bytes());
        assert_eq!(decode_attributed_body(&framed(&payload)), text);
    }

    #[test]
    fn test_no_marker_falls_back_to_whole_buffer() {
        assert_eq!(decode_attributed_body(b"\x02\x03plain body"), "plain body");
    }

    #[test]
    fn test_invalid_utf8_is_lossy_not_fatal() {
        let decoded = decode_attributed_body(&framed(b"ok \xff\xfe done"));
        assert!(decoded.starts_with("ok "));
        assert!(decoded.ends_with(" done"));
    }

    #[test]
    fn test_unterminated_marker_falls_back() {
        let mut bytes = START_MARKER.to_vec();
        bytes.extend_from_slice(b"dangling");
        // Leading 0x01 is a control character; '+' survives the trim
        assert_eq!(decode_attributed_body(&bytes), "+dangling");
    }
}
