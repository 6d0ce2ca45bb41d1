#![forbid(unsafe_code)]

use super::{BuiltPart, ElementHandler, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::Result;
use osci_message::parts::CustomHeader;
use osci_stream::writer::{render_end, render_start, render_text};

/// Verbatim capture of an unrecognized SOAP header.
///
/// Re-serializes the subtree in canonical form so the block can participate
/// in the signature scope as opaque bytes.  The root element gets the
/// in-scope namespace declarations hoisted, matching the canonizer.
pub struct CustomHeaderBuilder {
    qname: String,
    id: Option<String>,
    depth: usize,
    buf: Vec<u8>,
}

impl CustomHeaderBuilder {
    pub fn new(ev: &StartEvent<'_>, ctx: &ParseContext<'_>) -> Self {
        let in_scope = ctx.in_scope();
        let decls: Vec<(&str, &str)> = in_scope
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
            .collect();
        let attrs: Vec<(&str, &str)> = ev
            .attrs
            .iter()
            .map(|a| (a.qname.as_str(), a.value.as_str()))
            .collect();
        let mut buf = Vec::new();
        render_start(&mut buf, ev.qname, &decls, &attrs);
        Self {
            qname: ev.qname.to_owned(),
            id: ev.id().map(str::to_owned),
            depth: 1,
            buf,
        }
    }
}

impl ElementHandler for CustomHeaderBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        let decls: Vec<(&str, &str)> = ev
            .decls
            .iter()
            .map(|(p, u)| (p.as_str(), u.as_str()))
            .collect();
        let attrs: Vec<(&str, &str)> = ev
            .attrs
            .iter()
            .map(|a| (a.qname.as_str(), a.value.as_str()))
            .collect();
        render_start(&mut self.buf, ev.qname, &decls, &attrs);
        self.depth += 1;
        Ok(Transition::Stay)
    }

    fn end_element(
        &mut self,
        qname: &str,
        _local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        render_end(&mut self.buf, qname);
        self.depth -= 1;
        if self.depth == 0 {
            return Ok(Transition::Pop(BuiltPart::CustomHeader(CustomHeader {
                qname: std::mem::take(&mut self.qname),
                id: self.id.take(),
                xml: std::mem::take(&mut self.buf),
            })));
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        render_text(&mut self.buf, text);
        Ok(())
    }
}
