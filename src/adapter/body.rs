//! Article body synthesis
//!
//! Bodies are the rendered HTML markup, base64-encoded and hard-wrapped
//! at 76 characters per line (the MIME line limit), CRLF-joined.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Maximum base64 line length
pub const WRAP_WIDTH: usize = 76;

/// Encode rendered markup into the wire body payload
#[must_use]
pub fn build_body(html: &str) -> Vec<u8> {
    let encoded = STANDARD.encode(html.as_bytes());
    let lines: Vec<&[u8]> = encoded.as_bytes().chunks(WRAP_WIDTH).collect();
    lines.join("\r\n".as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(body: &[u8]) -> String {
        let joined: Vec<u8> = body
            .split(|&b| b == b'\r' || b == b'\n')
            .flatten()
            .copied()
            .collect();
        String::from_utf8(STANDARD.decode(joined).unwrap()).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let html = "<p>Hello, <b>world</b>! Some text that is long enough to span \
                    several base64 lines once encoded. Padding padding padding.</p>";
        let body = build_body(html);
        assert_eq!(decode(&body), html);
    }

    #[test]
    fn test_wrap_width() {
        let html = "x".repeat(500);
        let body = build_body(&html);
        let lines: Vec<&[u8]> = body.split(|&b| b == b'\n').collect();

        for (i, line) in lines.iter().enumerate() {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if i + 1 < lines.len() {
                assert_eq!(line.len(), WRAP_WIDTH);
            } else {
                assert!(line.len() <= WRAP_WIDTH);
            }
        }
    }

    #[test]
    fn test_empty_body() {
        assert!(build_body("").is_empty());
    }

    #[test]
    fn test_multibyte_content() {
        let html = "<p>Grüße aus Köln — ≤76 Zeichen pro Zeile</p>";
        assert_eq!(decode(&build_body(html)), html);
    }
}
