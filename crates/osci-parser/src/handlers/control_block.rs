#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::ControlBlock;

enum Field {
    Response,
    Challenge,
}

/// Builder for the `ControlBlock` header.
pub struct ControlBlockBuilder {
    cb: ControlBlock,
    capture: TextCapture,
    field: Option<Field>,
}

impl ControlBlockBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Result<Self> {
        let mut cb = ControlBlock {
            conversation_id: ev.attr(ns::attr::CONVERSATION_ID).map(str::to_owned),
            ..Default::default()
        };
        if let Some(seq) = ev.attr(ns::attr::SEQUENCE_NUMBER) {
            cb.sequence_number = Some(seq.parse().map_err(|_| {
                Error::XmlStructure(format!("invalid SequenceNumber: {seq}"))
            })?);
        }
        Ok(Self {
            cb,
            capture: TextCapture::default(),
            field: None,
        })
    }
}

impl ElementHandler for ControlBlockBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::OSCI {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match ev.local {
            ns::node::RESPONSE => self.field = Some(Field::Response),
            ns::node::CHALLENGE => self.field = Some(Field::Challenge),
            _ => return Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
        self.capture.open();
        Ok(Transition::Stay)
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match local {
            ns::node::RESPONSE | ns::node::CHALLENGE => {
                let text = self.capture.take().unwrap_or_default();
                match self.field.take() {
                    Some(Field::Response) => self.cb.response = Some(text),
                    Some(Field::Challenge) => self.cb.challenge = Some(text),
                    None => return Err(Error::UnexpectedEndTag(local.to_owned())),
                }
                Ok(Transition::Stay)
            }
            ns::node::CONTROL_BLOCK => Ok(Transition::Pop(BuiltPart::ControlBlock(
                std::mem::take(&mut self.cb),
            ))),
            _ => Err(Error::UnexpectedEndTag(local.to_owned())),
        }
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}
