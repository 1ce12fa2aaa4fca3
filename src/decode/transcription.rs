//! Audio message transcription lookup in attachment `user_info` property lists

use std::io::Cursor;

const TRANSCRIPTION_KEY: &str = "audio-transcription";

/// Extract the transcription string from a binary or XML property list.
///
/// Returns `None` for empty blobs, unparsable data, or a missing/empty value.
pub fn extract_transcription(data: &[u8]) -> Option<String> {
    if data.is_empty() {
        return None;
    }
    let value = plist::Value::from_reader(Cursor::new(data)).ok()?;
    value
        .as_dictionary()?
        .get(TRANSCRIPTION_KEY)?
        .as_string()
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
pub(crate) fn binary_plist(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut dict = plist::Dictionary::new();
    for (key, value) in entries {
        dict.insert(key.to_string(), plist::Value::String(value.to_string()));
    }
    let mut buf = Vec::new();
    plist::Value::Dictionary(dict)
        .to_writer_binary(&mut buf)
        .expect("serialize plist");
    buf
}
