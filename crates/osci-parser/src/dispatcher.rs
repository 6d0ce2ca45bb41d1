#![forbid(unsafe_code)]

//! The streaming XML dispatcher.
//!
//! A pull loop over the tokenizer feeds events to the top frame of an
//! explicit handler stack.  A handler recognizing the start of a schema
//! fragment pushes a child frame; when the fragment's end tag arrives the
//! child pops itself and delivers its built part to the parent.  Character
//! data is only accepted where a handler has opened a text capture.
//!
//! The canonizer observes the same event stream: handlers run first on
//! start events (so subtree tracking they request covers the opening tag),
//! and the canonizer runs first on end events (so digests finalize with the
//! closing tag included).

use crate::handlers::{BuiltPart, ElementHandler, Transition};
use crate::tracker::UniqueElementTracker;
use osci_core::{Error, OsciConfig, Result};
use osci_stream::Canonizer;
use quick_xml::events::{BytesStart, Event};

/// One parsed attribute (namespace declarations excluded).
#[derive(Debug, Clone)]
pub struct Attr {
    pub qname: String,
    pub local: String,
    pub prefix: Option<String>,
    pub value: String,
}

/// A start-element event as seen by handlers.
pub struct StartEvent<'a> {
    pub qname: &'a str,
    pub ns: &'a str,
    pub local: &'a str,
    pub attrs: &'a [Attr],
    pub decls: &'a [(String, String)],
}

impl StartEvent<'_> {
    /// Attribute value by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.local == local)
            .map(|a| a.value.as_str())
    }

    pub fn required_attr(&self, local: &str) -> Result<&str> {
        self.attr(local).ok_or_else(|| {
            Error::MissingAttribute(format!("{} on {}", local, self.qname))
        })
    }

    /// The `Id` attribute, if present.
    pub fn id(&self) -> Option<&str> {
        self.attr(osci_core::ns::attr::ID)
    }

    /// Canonical attribute signature for duplicate detection.
    pub fn attrs_signature(&self) -> String {
        let mut pairs: Vec<String> = self
            .attrs
            .iter()
            .map(|a| format!("{}={}", a.qname, a.value))
            .collect();
        pairs.sort();
        pairs.join(";")
    }
}

/// Shared state the handler chain works against during one parse pass.
pub struct ParseContext<'a> {
    pub cfg: &'a OsciConfig,
    pub canonizer: Canonizer,
    pub tracker: UniqueElementTracker,
    scopes: Vec<Vec<(String, String)>>,
}

impl<'a> ParseContext<'a> {
    /// Build the context for one parse pass.  The configured digest URI is
    /// resolved to a suite once, here; an unknown algorithm fails before
    /// any byte is read.
    pub fn new(cfg: &'a OsciConfig) -> Result<Self> {
        let suite = osci_crypto::digest::DigestSuite::from_uri(&cfg.digest_uri)?;
        Ok(Self {
            cfg,
            canonizer: Canonizer::new(suite),
            tracker: UniqueElementTracker::new(cfg.check_duplicate_ids),
            scopes: Vec::new(),
        })
    }

    fn push_scope(&mut self, decls: Vec<(String, String)>) {
        self.scopes.push(decls);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn resolve(&self, prefix: &str) -> Option<&str> {
        for scope in self.scopes.iter().rev() {
            for (p, uri) in scope {
                if p == prefix {
                    return Some(uri);
                }
            }
        }
        if prefix == "xml" {
            return Some(osci_core::ns::XML);
        }
        None
    }

    /// The merged namespace bindings currently in scope, innermost binding
    /// per prefix, sorted by prefix.
    pub fn in_scope(&self) -> Vec<(String, String)> {
        let mut merged: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();
        for scope in &self.scopes {
            for (prefix, uri) in scope {
                merged.insert(prefix.clone(), uri.clone());
            }
        }
        merged.into_iter().collect()
    }

    /// Register an element as signature-relevant and begin digesting it.
    ///
    /// Called by handlers from `start_element`, before the canonizer sees
    /// the opening tag.
    pub fn track_element(&mut self, ev: &StartEvent<'_>, ref_id: &str) -> Result<()> {
        self.tracker
            .register(ev.local, ev.ns, &ev.attrs_signature(), ref_id)?;
        self.canonizer.begin_tracking(ref_id)
    }
}

fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

fn parse_start(e: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>, Vec<Attr>)> {
    let qname = String::from_utf8(e.name().as_ref().to_vec())
        .map_err(|e| Error::XmlParse(format!("element name not UTF-8: {e}")))?;
    let mut decls = Vec::new();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::XmlParse(format!("bad attribute: {e}")))?;
        let key = String::from_utf8(attr.key.as_ref().to_vec())
            .map_err(|e| Error::XmlParse(format!("attribute name not UTF-8: {e}")))?;
        let value = attr
            .unescape_value()
            .map_err(|e| Error::XmlParse(format!("attribute value: {e}")))?
            .into_owned();
        if key == "xmlns" {
            decls.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            decls.push((prefix.to_owned(), value));
        } else {
            let (prefix, local) = split_qname(&key);
            attrs.push(Attr {
                local: local.to_owned(),
                prefix: prefix.map(str::to_owned),
                qname: key,
                value,
            });
        }
    }
    Ok((qname, decls, attrs))
}

struct Frames {
    stack: Vec<Box<dyn ElementHandler>>,
    result: Option<BuiltPart>,
}

/// Run the dispatcher over an input, starting from a root handler, and
/// return the part the root produces.
pub fn run_dispatcher<R: std::io::BufRead>(
    input: R,
    root: Box<dyn ElementHandler>,
    ctx: &mut ParseContext<'_>,
) -> Result<BuiltPart> {
    let mut reader = quick_xml::Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut frames = Frames {
        stack: vec![root],
        result: None,
    };

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        match event {
            Event::Start(ref e) => {
                handle_start(e, ctx, &mut frames)?;
            }
            Event::Empty(ref e) => {
                let qname = handle_start(e, ctx, &mut frames)?;
                handle_end(&qname, ctx, &mut frames)?;
            }
            Event::End(ref e) => {
                let qname = String::from_utf8(e.name().as_ref().to_vec())
                    .map_err(|e| Error::XmlParse(format!("element name not UTF-8: {e}")))?;
                handle_end(&qname, ctx, &mut frames)?;
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::XmlParse(e.to_string()))?
                    .into_owned();
                handle_text(&text, ctx, &mut frames)?;
            }
            Event::CData(ref t) => {
                let text = std::str::from_utf8(t)
                    .map_err(|e| Error::XmlParse(format!("CDATA not UTF-8: {e}")))?
                    .to_owned();
                handle_text(&text, ctx, &mut frames)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !frames.stack.is_empty() {
        return Err(Error::XmlStructure("unexpected end of document".into()));
    }
    frames
        .result
        .ok_or_else(|| Error::XmlStructure("document produced no result".into()))
}

fn handle_start(
    e: &BytesStart<'_>,
    ctx: &mut ParseContext<'_>,
    frames: &mut Frames,
) -> Result<String> {
    let (qname, decls, attrs) = parse_start(e)?;
    ctx.push_scope(decls.clone());

    let (prefix, local) = split_qname(&qname);
    let ns_uri = ctx
        .resolve(prefix.unwrap_or(""))
        .unwrap_or("")
        .to_owned();

    let Some(handler) = frames.stack.last_mut() else {
        return Err(Error::UnexpectedElement(qname));
    };

    let transition = {
        let ev = StartEvent {
            qname: &qname,
            ns: &ns_uri,
            local,
            attrs: &attrs,
            decls: &decls,
        };
        handler.start_element(&ev, ctx)?
    };

    // Canonical rendering happens after the handler so that a tracking
    // request made for this element covers its opening tag.
    let in_scope = ctx.in_scope();
    let in_scope_refs: Vec<(&str, &str)> = in_scope
        .iter()
        .map(|(p, u)| (p.as_str(), u.as_str()))
        .collect();
    let decl_refs: Vec<(&str, &str)> = decls
        .iter()
        .map(|(p, u)| (p.as_str(), u.as_str()))
        .collect();
    let attr_refs: Vec<(&str, &str)> = attrs
        .iter()
        .map(|a| (a.qname.as_str(), a.value.as_str()))
        .collect();
    ctx.canonizer
        .start_element(&qname, &decl_refs, &attr_refs, &in_scope_refs);

    match transition {
        Transition::Stay => {}
        Transition::Push(child) => frames.stack.push(child),
        Transition::Pop(_) => {
            return Err(Error::XmlStructure(format!(
                "handler popped on start of {qname}"
            )));
        }
    }
    Ok(qname)
}

fn handle_end(qname: &str, ctx: &mut ParseContext<'_>, frames: &mut Frames) -> Result<()> {
    ctx.canonizer.end_element(qname);

    let (_, local) = split_qname(qname);
    let Some(handler) = frames.stack.last_mut() else {
        return Err(Error::UnexpectedEndTag(qname.to_owned()));
    };
    match handler.end_element(qname, local, ctx)? {
        Transition::Stay => {}
        Transition::Push(_) => {
            return Err(Error::XmlStructure(format!(
                "handler pushed on end of {qname}"
            )));
        }
        Transition::Pop(part) => {
            frames.stack.pop();
            match frames.stack.last_mut() {
                Some(parent) => parent.child_complete(part, ctx)?,
                None => frames.result = Some(part),
            }
        }
    }
    ctx.pop_scope();
    Ok(())
}

fn handle_text(text: &str, ctx: &mut ParseContext<'_>, frames: &mut Frames) -> Result<()> {
    ctx.canonizer.text(text);
    match frames.stack.last_mut() {
        Some(handler) => handler.characters(text, ctx),
        None if text.trim().is_empty() => Ok(()),
        None => Err(Error::StrayText(text.trim().to_owned())),
    }
}
