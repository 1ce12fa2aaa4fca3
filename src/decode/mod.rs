//! Pure decoders for opaque column payloads

mod body;
mod transcription;

pub use body::decode_attributed_body;
pub use transcription::extract_transcription;

#[cfg(test)]
pub(crate) use transcription::binary_plist;
