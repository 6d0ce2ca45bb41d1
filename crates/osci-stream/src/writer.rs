#![forbid(unsafe_code)]

//! The protocol's canonical XML form.
//!
//! Signature digests are computed over one fixed serialized form, shared by
//! the compose path and the parse-side canonicalizer so both produce the
//! same bytes.  The convention is protocol-defined, not generic C14N:
//!
//! - namespace declarations come first, sorted by prefix (the default
//!   declaration before prefixed ones), then attributes sorted by
//!   qualified name;
//! - elements are never self-closed;
//! - markup-significant characters become entity references, and a carriage
//!   return always becomes a character reference so it survives a parser's
//!   line-ending normalization; attribute values additionally protect the
//!   quote delimiter, tab and line feed.

/// Append a value with the protocol's escaping applied.
fn push_escaped(out: &mut Vec<u8>, value: &str, attribute: bool) {
    for &b in value.as_bytes() {
        match b {
            b'&' => out.extend_from_slice(b"&amp;"),
            b'<' => out.extend_from_slice(b"&lt;"),
            b'>' if !attribute => out.extend_from_slice(b"&gt;"),
            b'"' if attribute => out.extend_from_slice(b"&quot;"),
            b'\t' if attribute => out.extend_from_slice(b"&#x9;"),
            b'\n' if attribute => out.extend_from_slice(b"&#xA;"),
            b'\r' => out.extend_from_slice(b"&#xD;"),
            _ => out.push(b),
        }
    }
}

/// Render a canonical start tag.
pub fn render_start(
    out: &mut Vec<u8>,
    qname: &str,
    decls: &[(&str, &str)],
    attrs: &[(&str, &str)],
) {
    out.push(b'<');
    out.extend_from_slice(qname.as_bytes());

    let mut decls: Vec<(&str, &str)> = decls.to_vec();
    decls.sort_by(|a, b| a.0.cmp(b.0));
    decls.dedup_by(|a, b| a.0 == b.0);
    for (prefix, uri) in decls {
        if prefix.is_empty() {
            out.extend_from_slice(b" xmlns=\"");
        } else {
            out.extend_from_slice(b" xmlns:");
            out.extend_from_slice(prefix.as_bytes());
            out.extend_from_slice(b"=\"");
        }
        push_escaped(out, uri, true);
        out.push(b'"');
    }

    let mut attrs: Vec<(&str, &str)> = attrs.to_vec();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    for (key, value) in attrs {
        out.push(b' ');
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(b"=\"");
        push_escaped(out, value, true);
        out.push(b'"');
    }

    out.push(b'>');
}

/// Render a canonical end tag.
pub fn render_end(out: &mut Vec<u8>, qname: &str) {
    out.extend_from_slice(b"</");
    out.extend_from_slice(qname.as_bytes());
    out.push(b'>');
}

/// Render escaped character data.
pub fn render_text(out: &mut Vec<u8>, text: &str) {
    push_escaped(out, text, false);
}

/// A canonical XML writer for building message fragments.
pub struct CanonicalWriter {
    buf: Vec<u8>,
    open: Vec<String>,
}

impl CanonicalWriter {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            open: Vec::new(),
        }
    }

    /// Open an element carrying namespace declarations.
    pub fn start_with_decls(&mut self, qname: &str, decls: &[(&str, &str)], attrs: &[(&str, &str)]) {
        render_start(&mut self.buf, qname, decls, attrs);
        self.open.push(qname.to_owned());
    }

    /// Open an element.
    pub fn start(&mut self, qname: &str, attrs: &[(&str, &str)]) {
        self.start_with_decls(qname, &[], attrs);
    }

    /// Write escaped character data.
    pub fn text(&mut self, text: &str) {
        render_text(&mut self.buf, text);
    }

    /// Close the innermost open element.
    pub fn end(&mut self) {
        if let Some(qname) = self.open.pop() {
            render_end(&mut self.buf, &qname);
        }
    }

    /// Write `<qname attrs>text</qname>` in one step.
    pub fn element(&mut self, qname: &str, attrs: &[(&str, &str)], text: &str) {
        self.start(qname, attrs);
        self.text(text);
        self.end();
    }

    /// Append an already-canonical fragment verbatim.
    pub fn raw(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        while !self.open.is_empty() {
            self.end();
        }
        self.buf
    }
}

impl Default for CanonicalWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_are_sorted() {
        let mut out = Vec::new();
        render_start(&mut out, "osci:ControlBlock", &[], &[("SequenceNumber", "0"), ("ConversationId", "c1")]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<osci:ControlBlock ConversationId=\"c1\" SequenceNumber=\"0\">"
        );
    }

    #[test]
    fn decls_precede_attrs_and_sort_by_prefix() {
        let mut out = Vec::new();
        render_start(
            &mut out,
            "soap:Body",
            &[("soap", "urn:s"), ("", "urn:default"), ("ds", "urn:d")],
            &[("Id", "body")],
        );
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<soap:Body xmlns=\"urn:default\" xmlns:ds=\"urn:d\" xmlns:soap=\"urn:s\" Id=\"body\">"
        );
    }

    #[test]
    fn text_escaping() {
        let mut out = Vec::new();
        render_text(&mut out, "a&b<c>d\re");
        assert_eq!(out, b"a&amp;b&lt;c&gt;d&#xD;e");
    }

    #[test]
    fn attribute_escaping_protects_delimiters_and_whitespace() {
        let mut out = Vec::new();
        render_start(&mut out, "x", &[], &[("k", "a\"b\tc\nd\re")]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<x k=\"a&quot;b&#x9;c&#xA;d&#xD;e\">"
        );
    }

    #[test]
    fn multibyte_text_passes_through() {
        let mut out = Vec::new();
        render_text(&mut out, "Größe & Maß");
        assert_eq!(String::from_utf8(out).unwrap(), "Größe &amp; Maß");
    }

    #[test]
    fn writer_nests_and_escapes() {
        let mut w = CanonicalWriter::new();
        w.start("a", &[]);
        w.element("b", &[("k", "v\"w")], "x<y");
        w.end();
        assert_eq!(
            String::from_utf8(w.into_bytes()).unwrap(),
            "<a><b k=\"v&quot;w\">x&lt;y</b></a>"
        );
    }

    #[test]
    fn never_self_closes() {
        let mut w = CanonicalWriter::new();
        w.start("empty", &[]);
        w.end();
        assert_eq!(String::from_utf8(w.into_bytes()).unwrap(), "<empty></empty>");
    }
}
