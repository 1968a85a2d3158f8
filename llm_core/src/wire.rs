//! How a conversation turn travels between the voice endpoint and its
//! clients.
//!
//! The reply body is raw audio, so the text of both sides of the turn rides
//! along in response headers. Header values must be visible ASCII, but
//! transcripts and replies are mostly Chinese; both ends agree on the
//! JavaScript `encodeURIComponent` rules so a browser can use
//! `decodeURIComponent` directly.

/// What the server heard, percent-encoded.
pub const TRANSCRIPT_HEADER: &str = "x-transcript";
/// What the assistant answered, percent-encoded.
pub const RESPONSE_HEADER: &str = "x-response";
/// Bearer token the server forwards to the speech service.
pub const TTS_TOKEN_HEADER: &str = "tts-token";

const UNRESERVED_MARKS: &[u8] = b"-_.!~*'()";

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || UNRESERVED_MARKS.contains(&b)
}

pub fn encode_uri_component(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 3);
    for &b in text.as_bytes() {
        if is_unreserved(b) {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Inverse of [`encode_uri_component`]. Returns `None` for malformed escapes
/// or byte sequences that are not UTF-8.
pub fn decode_uri_component(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
