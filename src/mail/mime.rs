use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use chrono::{DateTime, Utc};

use super::OutboundMessage;

const LINE_WIDTH: usize = 76;

/// RFC 2047 encoded-word for non-ASCII header values.
pub fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value.as_bytes()))
    }
}

fn wrap_base64(bytes: &[u8]) -> String {
    let encoded = STANDARD.encode(bytes);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 2);
    for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}

/// Single-part `text/html` RFC 2822 message.
pub fn build_message(message: &OutboundMessage, date: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!("From: {}\r\n", message.from));
    out.push_str(&format!("To: {}\r\n", message.to.join(", ")));
    out.push_str(&format!("Subject: {}\r\n", encode_header(&message.subject)));
    out.push_str(&format!("Date: {}\r\n", date.to_rfc2822()));
    out.push_str("MIME-Version: 1.0\r\n");
    out.push_str("Content-Type: text/html; charset=\"utf-8\"\r\n");
    out.push_str("Content-Transfer-Encoding: base64\r\n");
    out.push_str("\r\n");
    out.push_str(&wrap_base64(message.html.as_bytes()));
    out
}

/// The `raw` field of a Gmail message resource.
pub fn encode_raw(message: &OutboundMessage, date: DateTime<Utc>) -> String {
    URL_SAFE.encode(build_message(message, date))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn message(subject: &str, html: &str) -> OutboundMessage {
        OutboundMessage {
            from: "me".to_string(),
            to: vec!["a@client.example".to_string(), "b@client.example".to_string()],
            subject: subject.to_string(),
            html: html.to_string(),
        }
    }

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_ascii_subject_unchanged() {
        assert_eq!(encode_header("Weekly SEO Update"), "Weekly SEO Update");
    }

    #[test]
    fn test_non_ascii_subject_encoded() {
        let encoded = encode_header("Café – Week 7");
        assert!(encoded.starts_with("=?UTF-8?B?"));
        assert!(encoded.ends_with("?="));
        let inner = &encoded[10..encoded.len() - 2];
        assert_eq!(STANDARD.decode(inner).unwrap(), "Café – Week 7".as_bytes());
    }

    #[test]
    fn test_build_message_headers_and_body() {
        let raw = build_message(&message("Report", "<p>Hello</p>"), date());
        assert!(raw.contains("To: a@client.example, b@client.example\r\n"));
        assert!(raw.contains("Subject: Report\r\n"));
        assert!(raw.contains("Content-Type: text/html; charset=\"utf-8\"\r\n"));
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        let decoded = STANDARD.decode(body.replace("\r\n", "")).unwrap();
        assert_eq!(decoded, b"<p>Hello</p>");
    }

    #[test]
    fn test_body_lines_wrapped() {
        let html = "x".repeat(500);
        let raw = build_message(&message("Report", &html), date());
        let (_, body) = raw.split_once("\r\n\r\n").unwrap();
        assert!(body.lines().all(|line| line.len() <= LINE_WIDTH));
    }

    #[test]
    fn test_raw_is_url_safe() {
        let raw = encode_raw(&message("Report??>>", &"ÿ".repeat(64)), date());
        assert!(!raw.contains('+'));
        assert!(!raw.contains('/'));
        let decoded = URL_SAFE.decode(&raw).unwrap();
        assert!(String::from_utf8(decoded).unwrap().starts_with("From: me\r\n"));
    }
}
