//! Message synthesis: header collection, sender/date extraction, and
//! emission of one `.eml` file per body block.
//!
//! Header lines are kept as raw bytes with their original terminators; only
//! the synthesized `Message-Id` line and the header/body separator use a
//! fixed CRLF.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::info;

use crate::buffer::SourceBuffer;
use crate::error::{Result, VmgError};

/// Mail address extraction: a bracketed `<local@domain>` form is preferred,
/// with a bare `local@domain` anywhere in the text as fallback.
pub struct AddressMatcher {
    bracketed: Regex,
    bare: Regex,
}

impl AddressMatcher {
    pub fn new() -> Self {
        Self {
            bracketed: Regex::new(
                r"<([a-zA-Z0-9][a-zA-Z0-9._-]*@[a-zA-Z0-9_-][a-zA-Z0-9._-]*)>",
            )
            .expect("valid address pattern"),
            bare: Regex::new(r"([a-zA-Z0-9][a-zA-Z0-9._-]*@[a-zA-Z0-9_-][a-zA-Z0-9._-]*)")
                .expect("valid address pattern"),
        }
    }

    /// First match wins, bracketed form first. Case is preserved.
    pub fn extract(&self, text: &str) -> Option<String> {
        self.bracketed
            .captures(text)
            .or_else(|| self.bare.captures(text))
            .map(|c| c[1].to_string())
    }
}

impl Default for AddressMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Accepted `Date:` header formats, tried in order after RFC 2822/3339.
/// Wall-clock time is kept as written; zone offsets are not applied.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_ONLY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Permissive parse of a human-readable date and time.
///
/// chrono rejects any `%a` weekday that disagrees with the calendar date
/// (RFC 2822 parsing included), and legacy handsets get the weekday wrong;
/// the weekday carries no information for the identifier, so when every
/// direct attempt fails the leading weekday token and any trailing zone
/// offset are dropped and the formats retried.
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = parse_date_formats(text) {
        return Some(dt);
    }
    let stripped = strip_zone_offset(strip_weekday(text));
    if stripped != text {
        return parse_date_formats(stripped);
    }
    None
}

fn parse_date_formats(text: &str) -> Option<NaiveDateTime> {
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    for format in DATE_ONLY_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Drop a leading `Mon, `-style weekday token.
fn strip_weekday(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() > 4 && bytes[..3].iter().all(u8::is_ascii_alphabetic) && bytes[3] == b',' {
        text[4..].trim_start()
    } else {
        text
    }
}

/// Drop a trailing `+0900`/`-0500`-style zone offset.
fn strip_zone_offset(text: &str) -> &str {
    if let Some(idx) = text.rfind(|c| c == '+' || c == '-') {
        let tail = &text[idx + 1..];
        if tail.len() == 4 && tail.bytes().all(|b| b.is_ascii_digit()) {
            return text[..idx].trim_end();
        }
    }
    text
}

/// Read the inside of a body block (opening marker already consumed) and
/// write one `.eml` file into `out_dir`. Stops with the closing marker
/// still unconsumed at the current position; returns the emitted path.
pub fn synthesize<R: Read>(
    buffer: &mut SourceBuffer<R>,
    matcher: &AddressMatcher,
    closing_marker: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    // Everything up to the first blank line is a header.
    let mut headers: Vec<Vec<u8>> = Vec::new();
    let mut separator_found = false;
    while !buffer.is_exhausted()? {
        let line = buffer.read_line()?;
        if String::from_utf8_lossy(&line).trim().is_empty() {
            separator_found = true;
            break;
        }
        headers.push(line);
    }
    if !separator_found {
        return Err(VmgError::MalformedBody {
            pos: buffer.position(),
        });
    }

    let address = headers
        .iter()
        .filter_map(|h| {
            let text = String::from_utf8_lossy(h);
            let rest = text.as_ref().strip_prefix("From:")?;
            matcher.extract(rest.trim())
        })
        .next()
        .ok_or_else(|| VmgError::MissingHeader("From".to_string()))?;
    let date = headers
        .iter()
        .filter_map(|h| {
            let text = String::from_utf8_lossy(h);
            let rest = text.as_ref().strip_prefix("Date:")?;
            parse_date(rest.trim())
        })
        .next()
        .ok_or_else(|| VmgError::MissingHeader("Date".to_string()))?;

    let message_id = format!("{}.{}", date.format("%Y%m%d%H%M%S"), address);

    let out_path = out_dir.join(format!("{}.eml", message_id));
    let file = File::create(&out_path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(format!("Message-Id: {}\r\n", message_id).as_bytes())?;
    for header in &headers {
        writer.write_all(header)?;
    }
    // The separator is normalized to CRLF; body content is copied verbatim.
    writer.write_all(b"\r\n")?;
    while !buffer.is_exhausted()? {
        if buffer.starts_with(closing_marker, 0)? {
            break;
        }
        let line = buffer.read_line()?;
        writer.write_all(&line)?;
    }
    writer.flush()?;

    info!("wrote {}", out_path.display());
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn buffer(data: &[u8]) -> SourceBuffer<Cursor<Vec<u8>>> {
        SourceBuffer::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_extract_bracketed_address() {
        let matcher = AddressMatcher::new();
        assert_eq!(
            matcher.extract("John Doe <john@example.com>").as_deref(),
            Some("john@example.com")
        );
    }

    #[test]
    fn test_extract_bare_address() {
        let matcher = AddressMatcher::new();
        assert_eq!(
            matcher.extract("John Doe john@example.com").as_deref(),
            Some("john@example.com")
        );
        assert_eq!(matcher.extract("no address here"), None);
    }

    #[test]
    fn test_bracketed_wins_over_bare() {
        let matcher = AddressMatcher::new();
        assert_eq!(
            matcher
                .extract("other@elsewhere.org <real@example.com>")
                .as_deref(),
            Some("real@example.com")
        );
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(parse_date("2020-01-02 03:04:05"), Some(expected));
        assert_eq!(parse_date("2020/01/02 03:04:05"), Some(expected));
        assert_eq!(parse_date("Mon, 02 Jan 2020 03:04:05"), Some(expected));
        assert_eq!(parse_date("02 Jan 2020 03:04:05"), Some(expected));
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_wrong_weekday_is_ignored() {
        // 2020-01-02 was a Thursday; handsets write whatever they like.
        let expected = NaiveDate::from_ymd_opt(2020, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(parse_date("Mon, 02 Jan 2020 03:04:05"), Some(expected));
        assert_eq!(parse_date("Thu, 02 Jan 2020 03:04:05"), Some(expected));
        assert_eq!(
            parse_date("Mon, 02 Jan 2020 03:04:05 +0900"),
            Some(expected)
        );
    }

    #[test]
    fn test_parse_date_keeps_wall_clock() {
        let dt = parse_date("Mon, 02 Jan 2020 03:04:05 +0900").unwrap();
        assert_eq!(dt.format("%Y%m%d%H%M%S").to_string(), "20200102030405");
    }

    #[test]
    fn test_synthesize_writes_eml() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(
            b"From: <x@y.com>\r\nDate: 2020-01-02 03:04:05\r\n\r\nHello\r\nEND:VBODY\r\n",
        );
        let matcher = AddressMatcher::new();
        let path = synthesize(&mut buf, &matcher, "END:VBODY", dir.path()).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "20200102030405.x@y.com.eml"
        );
        let written = std::fs::read(&path).unwrap();
        assert_eq!(
            written,
            b"Message-Id: 20200102030405.x@y.com\r\nFrom: <x@y.com>\r\nDate: 2020-01-02 03:04:05\r\n\r\nHello\r\n"
        );
        // The closing marker is left for the grammar rule to consume.
        assert!(buf.starts_with("END:VBODY", 0).unwrap());
    }

    #[test]
    fn test_synthesize_preserves_header_terminators() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf =
            buffer(b"From: <x@y.com>\nDate: 2020-01-02 03:04:05\n\nbody\nEND:VBODY\n");
        let matcher = AddressMatcher::new();
        let path = synthesize(&mut buf, &matcher, "END:VBODY", dir.path()).unwrap();
        let written = std::fs::read(&path).unwrap();
        // Original LF terminators survive; the separator is CRLF regardless.
        assert_eq!(
            written,
            b"Message-Id: 20200102030405.x@y.com\r\nFrom: <x@y.com>\nDate: 2020-01-02 03:04:05\n\r\nbody\n"
        );
    }

    #[test]
    fn test_missing_date_is_error_and_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(b"From: <x@y.com>\r\n\r\nHello\r\nEND:VBODY\r\n");
        let matcher = AddressMatcher::new();
        let result = synthesize(&mut buf, &matcher, "END:VBODY", dir.path());
        assert!(matches!(result, Err(VmgError::MissingHeader(ref h)) if h == "Date"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_blank_separator_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = buffer(b"From: <x@y.com>\r\nDate: 2020-01-02 03:04:05\r\n");
        let matcher = AddressMatcher::new();
        let result = synthesize(&mut buf, &matcher, "END:VBODY", dir.path());
        assert!(matches!(result, Err(VmgError::MalformedBody { .. })));
    }
}
