#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::FeedbackEntry;

enum Field {
    Code,
    Text,
}

/// Builder for the `Feedback` header: a list of (language, code, text)
/// entries reporting the outcome of an operation.
pub struct FeedbackBuilder {
    entries: Vec<FeedbackEntry>,
    language: String,
    code: Option<String>,
    text: Option<String>,
    capture: TextCapture,
    field: Option<Field>,
}

impl FeedbackBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            language: String::new(),
            code: None,
            text: None,
            capture: TextCapture::default(),
            field: None,
        }
    }
}

impl ElementHandler for FeedbackBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::OSCI {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match ev.local {
            ns::node::ENTRY => {
                self.language = ev.attr(ns::attr::LANG).unwrap_or("de").to_owned();
                self.code = None;
                self.text = None;
            }
            ns::node::CODE => {
                self.capture.open();
                self.field = Some(Field::Code);
            }
            ns::node::TEXT => {
                self.capture.open();
                self.field = Some(Field::Text);
            }
            _ => return Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match local {
            ns::node::CODE | ns::node::TEXT => {
                let text = self.capture.take().unwrap_or_default();
                match self.field.take() {
                    Some(Field::Code) => self.code = Some(text),
                    Some(Field::Text) => self.text = Some(text),
                    None => return Err(Error::UnexpectedEndTag(local.to_owned())),
                }
            }
            ns::node::ENTRY => {
                let code = self
                    .code
                    .take()
                    .ok_or_else(|| Error::MissingElement("Code in Feedback Entry".into()))?;
                self.entries.push(FeedbackEntry {
                    language: std::mem::take(&mut self.language),
                    code,
                    text: self.text.take().unwrap_or_default(),
                });
            }
            ns::node::FEEDBACK => {
                return Ok(Transition::Pop(BuiltPart::Feedback(std::mem::take(
                    &mut self.entries,
                ))));
            }
            _ => return Err(Error::UnexpectedEndTag(local.to_owned())),
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}
