//! Custom emoji extraction from tapback text such as `Reacted 🎉 to "hello"`

const REACTED_PREFIX: &str = "Reacted ";
const REACTED_SUFFIX: &str = " to ";

/// Pull the emoji out of a custom tapback's text.
///
/// Uses the `Reacted <emoji> to ` shape first and falls back to the first
/// emoji found anywhere in the text.
pub fn extract_custom_emoji(text: &str) -> Option<String> {
    if let Some(start) = text.find(REACTED_PREFIX) {
        let rest = &text[start + REACTED_PREFIX.len()..];
        if let Some(end) = rest.find(REACTED_SUFFIX) {
            let emoji = &rest[..end];
            if !emoji.is_empty() {
                return Some(emoji.to_string());
            }
        }
    }
    first_emoji(text)
}

/// First emoji in `text`, including trailing modifiers, variation selectors and ZWJ joins.
///
/// Flags (regional indicator pairs) and keycaps (`1️⃣`, `#️⃣`) come back whole.
pub fn first_emoji(text: &str) -> Option<String> {
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        let keycap = is_keycap_base(c) && is_keycap_tail(&text[start + c.len_utf8()..]);
        if !is_emoji_scalar(c) && !keycap {
            continue;
        }
        let mut end = start + c.len_utf8();
        if is_regional_indicator(c) {
            if let Some(&(paired_at, paired)) = chars.peek() {
                if is_regional_indicator(paired) {
                    end = paired_at + paired.len_utf8();
                    chars.next();
                }
            }
        }
        while let Some(&(offset, next)) = chars.peek() {
            if is_emoji_modifier(next) {
                end = offset + next.len_utf8();
                chars.next();
            } else if next == '\u{200D}' {
                chars.next();
                match chars.peek() {
                    Some(&(joined_at, joined)) if is_emoji_scalar(joined) => {
                        end = joined_at + joined.len_utf8();
                        chars.next();
                    }
                    _ => break,
                }
            } else {
                break;
            }
        }
        return Some(text[start..end].to_string());
    }
    None
}

fn is_regional_indicator(c: char) -> bool {
    matches!(u32::from(c), 0x1F1E6..=0x1F1FF)
}

fn is_keycap_base(c: char) -> bool {
    c.is_ascii_digit() || c == '#' || c == '*'
}

/// `FE0F 20E3` or a bare `20E3` right after a keycap base
fn is_keycap_tail(rest: &str) -> bool {
    rest.starts_with("\u{FE0F}\u{20E3}") || rest.starts_with('\u{20E3}')
}

/// Whether `c` is a pictographic emoji scalar.
///
/// Covers the emoji blocks plus the scattered BMP symbols with emoji
/// presentation. Plain digits and `#`/`*` are excluded.
pub fn is_emoji_scalar(c: char) -> bool {
    matches!(
        u32::from(c),
        0x00A9
            | 0x00AE
            | 0x203C
            | 0x2049
            | 0x2122
            | 0x2139
            | 0x2194..=0x2199
            | 0x21A9..=0x21AA
            | 0x231A..=0x231B
            | 0x2328
            | 0x23CF
            | 0x23E9..=0x23F3
            | 0x23F8..=0x23FA
            | 0x24C2
            | 0x25AA..=0x25AB
            | 0x25B6
            | 0x25C0
            | 0x25FB..=0x25FE
            | 0x2600..=0x27BF
            | 0x2934..=0x2935
            | 0x2B05..=0x2B07
            | 0x2B1B..=0x2B1C
            | 0x2B50
            | 0x2B55
            | 0x3030
            | 0x303D
            | 0x3297
            | 0x3299
            | 0x1F000..=0x1F2FF
            | 0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F700..=0x1F77F
            | 0x1F780..=0x1F7FF
            | 0x1F900..=0x1F9FF
            | 0x1FA70..=0x1FAFF
    )
}

fn is_emoji_modifier(c: char) -> bool {
    matches!(
        u32::from(c),
        0xFE0F | 0x20E3 | 0x1F3FB..=0x1F3FF | 0xE0020..=0xE007F
    )
}
