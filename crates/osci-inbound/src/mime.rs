#![forbid(unsafe_code)]

//! Minimal MIME multipart/related reader.
//!
//! Yields parts in stream order with their headers; part ordering matters
//! because the protocol guarantees the XML skeleton arrives before any
//! attachment it references.

use osci_core::{Error, Result};
use osci_stream::b64;

/// One MIME part.
#[derive(Debug, Clone)]
pub struct MimePart {
    pub content_id: Option<String>,
    pub content_type: Option<String>,
    pub transfer_encoding: Option<String>,
    pub body: Vec<u8>,
}

impl MimePart {
    /// Whether the part declares base64 transfer encoding.
    pub fn is_base64(&self) -> bool {
        self.transfer_encoding
            .as_deref()
            .is_some_and(|e| e.eq_ignore_ascii_case("base64"))
            || self
                .content_type
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().contains("text/base64"))
    }

    /// The body with any declared transfer encoding removed.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        if self.is_base64() {
            b64::decode(&self.body)
        } else {
            Ok(self.body.clone())
        }
    }
}

/// Read a MIME multipart stream into its parts.
///
/// Accepts both a full message with outer headers (boundary taken from the
/// `Content-Type` parameter) and a bare part sequence starting directly
/// with a boundary line.
pub fn read_mime(data: &[u8]) -> Result<Vec<MimePart>> {
    let boundary = detect_boundary(data)?;
    let delim = format!("--{boundary}");
    let close = format!("--{boundary}--");

    // Collect delimiter line positions: (line start, first byte after the
    // line's newline, is final delimiter).
    let mut delims: Vec<(usize, usize, bool)> = Vec::new();
    let mut pos = 0;
    while pos <= data.len() {
        let line_end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(data.len());
        let mut line = &data[pos..line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        if line == delim.as_bytes() {
            delims.push((pos, line_end + 1, false));
        } else if line == close.as_bytes() {
            delims.push((pos, line_end + 1, true));
            break;
        }
        if line_end >= data.len() {
            break;
        }
        pos = line_end + 1;
    }

    if delims.is_empty() {
        return Err(Error::Mime(format!("boundary {boundary} never appears")));
    }
    if !delims.last().is_some_and(|d| d.2) {
        return Err(Error::Mime("missing closing boundary".into()));
    }

    let mut parts = Vec::new();
    for window in delims.windows(2) {
        let (_, content_start, _) = window[0];
        let (next_start, _, _) = window[1];
        // Strip the newline that belongs to the following delimiter line.
        let mut content_end = next_start;
        if content_end > content_start && data[content_end - 1] == b'\n' {
            content_end -= 1;
            if content_end > content_start && data[content_end - 1] == b'\r' {
                content_end -= 1;
            }
        }
        parts.push(parse_part(&data[content_start..content_end.max(content_start)])?);
    }
    Ok(parts)
}

fn detect_boundary(data: &[u8]) -> Result<String> {
    if data.starts_with(b"--") {
        let line_end = data
            .iter()
            .position(|&b| b == b'\n')
            .unwrap_or(data.len());
        let mut line = &data[..line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        let line = std::str::from_utf8(line)
            .map_err(|_| Error::Mime("boundary line is not UTF-8".into()))?;
        return Ok(line.trim_start_matches('-').to_owned());
    }

    let (headers, _) = parse_headers(data)?;
    let content_type = header_value(&headers, "content-type")
        .ok_or_else(|| Error::Mime("missing Content-Type".into()))?;
    for param in content_type.split(';') {
        let param = param.trim();
        if let Some(value) = param.strip_prefix("boundary=") {
            return Ok(value.trim_matches('"').to_owned());
        }
    }
    Err(Error::Mime("Content-Type has no boundary parameter".into()))
}

/// Parse a header block; returns (headers, offset of the body).
fn parse_headers(data: &[u8]) -> Result<(Vec<(String, String)>, usize)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut pos = 0;
    loop {
        let line_end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i)
            .unwrap_or(data.len());
        let mut line = &data[pos..line_end];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        let next = (line_end + 1).min(data.len());
        if line.is_empty() {
            return Ok((headers, next));
        }
        let line = std::str::from_utf8(line)
            .map_err(|_| Error::Mime("header line is not UTF-8".into()))?;
        if line.starts_with(' ') || line.starts_with('\t') {
            // Folded continuation of the previous header.
            if let Some(last) = headers.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Mime(format!("malformed header: {line}")))?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }
        if line_end >= data.len() {
            return Err(Error::Mime("unterminated header block".into()));
        }
        pos = next;
    }
}

fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

fn parse_part(data: &[u8]) -> Result<MimePart> {
    let (headers, body_offset) = parse_headers(data)?;
    let content_id = header_value(&headers, "content-id")
        .map(|v| v.trim_matches(['<', '>']).to_owned());
    Ok(MimePart {
        content_id,
        content_type: header_value(&headers, "content-type").map(str::to_owned),
        transfer_encoding: header_value(&headers, "content-transfer-encoding").map(str::to_owned),
        body: data[body_offset..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"MIME-Version: 1.0\r\n");
        out.extend_from_slice(
            b"Content-Type: multipart/related; boundary=\"bnd\"; type=\"text/xml\"\r\n\r\n",
        );
        out.extend_from_slice(b"--bnd\r\n");
        out.extend_from_slice(b"Content-Type: text/xml; charset=UTF-8\r\n");
        out.extend_from_slice(b"Content-ID: <osci@message>\r\n\r\n");
        out.extend_from_slice(b"<Envelope/>\r\n");
        out.extend_from_slice(b"--bnd\r\n");
        out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n");
        out.extend_from_slice(b"Content-ID: <att-1>\r\n\r\n");
        out.extend_from_slice(osci_stream::b64::encode(b"payload bytes").as_bytes());
        out.extend_from_slice(b"\r\n--bnd--\r\n");
        out
    }

    #[test]
    fn parts_split_in_order() {
        let parts = read_mime(&sample()).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].content_id.as_deref(), Some("osci@message"));
        assert_eq!(parts[0].body, b"<Envelope/>");
        assert_eq!(parts[1].content_id.as_deref(), Some("att-1"));
        assert_eq!(parts[1].decoded_body().unwrap(), b"payload bytes");
    }

    #[test]
    fn bare_stream_without_outer_headers() {
        let data = b"--x\r\nContent-ID: <a>\r\n\r\nbody\r\n--x--\r\n";
        let parts = read_mime(data).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"body");
    }

    #[test]
    fn missing_closing_boundary_rejected() {
        let data = b"--x\r\nContent-ID: <a>\r\n\r\nbody\r\n";
        assert!(read_mime(data).is_err());
    }

    #[test]
    fn base64_detection_via_content_type() {
        let part = MimePart {
            content_id: None,
            content_type: Some("text/base64".into()),
            transfer_encoding: None,
            body: osci_stream::b64::encode(b"x").into_bytes(),
        };
        assert!(part.is_base64());
        assert_eq!(part.decoded_body().unwrap(), b"x");
    }
}
