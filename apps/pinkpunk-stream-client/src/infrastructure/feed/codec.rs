//! Frame Codec
//!
//! Decodes one inbound frame into a [`FeedEnvelope`], tolerating the feed's
//! two wire encodings:
//!
//! - plain UTF-8 JSON text, or
//! - a text frame whose characters each carry one byte (low 8 bits) of a
//!   gzip/zlib/deflate-compressed UTF-8 JSON document.
//!
//! The second form is the feed's single-byte-per-character transport
//! encoding: the compressed byte stream is shipped as ISO-8859-1-style
//! text, so reversing it means taking `char as u8` per character before
//! decompressing.
//!
//! An undecodable frame is an error for the caller to report and drop; it
//! must never tear down the connection.

use std::io::Read;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use super::messages::FeedEnvelope;

/// Frame decode errors.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// Payload parsed as neither direct nor decompressed JSON.
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Decompression of the byte-mapped payload failed.
    #[error("decompression error: {0}")]
    Decompress(#[from] std::io::Error),

    /// Decompressed bytes were not valid UTF-8.
    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decode a text frame.
///
/// # Errors
///
/// Returns an error if the payload is neither direct JSON nor a
/// byte-mapped compressed JSON document.
pub fn decode_text(raw: &str) -> Result<FeedEnvelope, DecodeError> {
    match serde_json::from_str(raw) {
        Ok(envelope) => Ok(envelope),
        Err(_) => {
            // Each character carries one raw byte in its low 8 bits.
            let bytes: Vec<u8> = raw.chars().map(|c| (c as u32 & 0xff) as u8).collect();
            decode_compressed(&bytes)
        }
    }
}

/// Decode a binary frame.
///
/// # Errors
///
/// Returns an error if the payload is neither direct JSON nor a
/// compressed JSON document.
pub fn decode_binary(raw: &[u8]) -> Result<FeedEnvelope, DecodeError> {
    match serde_json::from_slice(raw) {
        Ok(envelope) => Ok(envelope),
        Err(_) => decode_compressed(raw),
    }
}

fn decode_compressed(bytes: &[u8]) -> Result<FeedEnvelope, DecodeError> {
    let inflated = decompress(bytes)?;
    let text = String::from_utf8(inflated)?;
    Ok(serde_json::from_str(&text)?)
}

/// Inflate a compressed byte sequence, accepting gzip, zlib, or a raw
/// deflate stream.
fn decompress(bytes: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut out = Vec::new();

    if bytes.starts_with(&[0x1f, 0x8b]) {
        GzDecoder::new(bytes).read_to_end(&mut out)?;
        return Ok(out);
    }

    if ZlibDecoder::new(bytes).read_to_end(&mut out).is_ok() {
        return Ok(out);
    }

    out.clear();
    DeflateDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};

    use super::*;
    use crate::infrastructure::feed::messages::FeedMessage;

    const DATA_FRAME: &str =
        r#"{"topic":"trending","data":[{"baseSymbol":"ACM","priceUsd":0.122916}]}"#;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(text: &str) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    /// Ship compressed bytes the way the feed does: one char per byte.
    fn byte_mapped(bytes: &[u8]) -> String {
        bytes.iter().map(|&b| b as char).collect()
    }

    #[test]
    fn decodes_direct_json() {
        let envelope = decode_text(DATA_FRAME).unwrap();
        assert_eq!(envelope.topic.as_deref(), Some("trending"));
        let records = envelope.data.unwrap();
        assert_eq!(records[0].base_symbol, "ACM");
    }

    #[test]
    fn decodes_gzip_byte_mapped_frame() {
        let frame = byte_mapped(&gzip(DATA_FRAME));
        // The mapped string must not itself be valid JSON.
        assert!(serde_json::from_str::<FeedEnvelope>(&frame).is_err());

        let envelope = decode_text(&frame).unwrap();
        assert_eq!(envelope, decode_text(DATA_FRAME).unwrap());
    }

    #[test]
    fn decodes_zlib_byte_mapped_frame() {
        let frame = byte_mapped(&zlib(DATA_FRAME));
        let envelope = decode_text(&frame).unwrap();
        assert_eq!(envelope.data.unwrap().len(), 1);
    }

    #[test]
    fn decodes_binary_gzip_frame() {
        let envelope = decode_binary(&gzip(DATA_FRAME)).unwrap();
        assert_eq!(envelope.topic.as_deref(), Some("trending"));
    }

    #[test]
    fn decodes_binary_direct_json() {
        let envelope = decode_binary(DATA_FRAME.as_bytes()).unwrap();
        assert_eq!(envelope.topic.as_deref(), Some("trending"));
    }

    #[test]
    fn garbage_frame_is_an_error() {
        assert!(decode_text("not json, not compressed").is_err());
        assert!(decode_binary(&[0xde, 0xad, 0xbe, 0xef]).is_err());
    }

    #[test]
    fn truncated_gzip_is_an_error() {
        let mut bytes = gzip(DATA_FRAME);
        bytes.truncate(bytes.len() / 2);
        assert!(decode_text(&byte_mapped(&bytes)).is_err());
    }

    #[test]
    fn compressed_ping_classifies_like_plain_ping() {
        let ping = r#"{"topic":"ping","pong":"abc"}"#;
        let plain = FeedMessage::classify(decode_text(ping).unwrap());
        let mapped = FeedMessage::classify(decode_text(&byte_mapped(&gzip(ping))).unwrap());
        assert_eq!(plain, mapped);
    }
}
