#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, ProcessCardBuilder, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::{DeliveryHeader, ProcessCardBundle};

enum Field {
    MessageId,
    Subject,
    SelectionRule,
}

/// Builder for the message-specific header element (`storeDelivery`,
/// `fetchProcessCard`, `responseToFetchProcessCard`, ...).
///
/// Collects the common children plus the process-card bundles and the
/// declared quantity limit of process-card responses.  All bundles present
/// are collected regardless of the limit; enforcement is the server's job.
pub struct DeliveryBuilder {
    header: DeliveryHeader,
    process_cards: Vec<ProcessCardBundle>,
    quantity_limit: Option<u64>,
    capture: TextCapture,
    field: Option<Field>,
}

impl DeliveryBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        let mut header = DeliveryHeader::for_type(ev.local);
        if let Some(id) = ev.id() {
            header.id = id.to_owned();
        }
        Self {
            header,
            process_cards: Vec::new(),
            quantity_limit: None,
            capture: TextCapture::default(),
            field: None,
        }
    }
}

impl ElementHandler for DeliveryBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::OSCI {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match ev.local {
            ns::node::MESSAGE_ID => {
                self.capture.open();
                self.field = Some(Field::MessageId);
            }
            ns::node::SUBJECT => {
                self.capture.open();
                self.field = Some(Field::Subject);
            }
            ns::node::SELECTION_RULE => {
                self.capture.open();
                self.field = Some(Field::SelectionRule);
            }
            ns::node::QUANTITY => {
                let limit = ev.required_attr(ns::attr::LIMIT)?;
                self.quantity_limit = Some(limit.parse().map_err(|_| {
                    Error::XmlStructure(format!("invalid Quantity Limit: {limit}"))
                })?);
            }
            ns::node::PROCESS_CARD_BUNDLE => {
                return Ok(Transition::Push(Box::new(ProcessCardBuilder::new())));
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
        if self.capture.is_open() {
            let text = self.capture.take().unwrap_or_default();
            match self.field.take() {
                Some(Field::MessageId) => self.header.message_id = Some(text),
                Some(Field::Subject) => self.header.subject = Some(text),
                Some(Field::SelectionRule) => self.header.selection_rule = Some(text),
                None => return Err(Error::UnexpectedEndTag(local.to_owned())),
            }
            return Ok(Transition::Stay);
        }
        if local == ns::node::QUANTITY {
            return Ok(Transition::Stay);
        }
        if local == self.header.name {
            return Ok(Transition::Pop(BuiltPart::Delivery {
                header: std::mem::take(&mut self.header),
                process_cards: std::mem::take(&mut self.process_cards),
                quantity_limit: self.quantity_limit.take(),
            }));
        }
        Err(Error::UnexpectedEndTag(local.to_owned()))
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }

    fn child_complete(&mut self, part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        match part {
            BuiltPart::ProcessCard(card) => {
                self.process_cards.push(*card);
                Ok(())
            }
            _ => Err(Error::XmlStructure("unexpected child in delivery header".into())),
        }
    }
}
