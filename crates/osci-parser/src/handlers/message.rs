#![forbid(unsafe_code)]

use super::{
    BodyBuilder, BuiltPart, CertificatesBuilder, ControlBlockBuilder, CustomHeaderBuilder,
    DeliveryBuilder, ElementHandler, FeatureDescriptionBuilder, FeedbackBuilder,
    ProcessCardBuilder, SignatureBuilder, Transition,
};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::msg::{OsciMessage, OsciMessageType};
use osci_message::parts::{ChunkInformation, DesiredLanguages, QualityOfTimestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitEnvelope,
    InEnvelope,
    InHeader,
    Done,
}

/// The known header children, dispatched by (namespace, local name).
enum HeaderKind {
    ControlBlock,
    Signature,
    DesiredLanguages,
    QualityOfTimestamp,
    Feedback,
    ProcessCardBundle,
    ChunkInformation,
    FeatureDescription,
    IntermediaryCertificates,
    NonIntermediaryCertificates,
    MessageSpecific,
    Custom,
}

/// The message-builder archetype: recognizes the SOAP envelope, dispatches
/// known header children to their builders, treats unknown headers as
/// opaque custom blocks and hands the body to the body builder.
///
/// Every signature-relevant header child (anything carrying an `Id`, except
/// the signature header itself) is registered with the unique-element
/// tracker and the canonizer before its builder takes over.
pub struct MessageBuilder {
    state: State,
    msg: Option<Box<OsciMessage>>,
    /// Whether the envelope carried a recognizable schema location.
    explicit_type: bool,
    saw_header: bool,
    saw_body: bool,
    /// End tag the builder consumes itself for inline-parsed parts.
    pending_inline: Option<&'static str>,
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self {
            state: State::AwaitEnvelope,
            msg: None,
            explicit_type: false,
            saw_header: false,
            saw_body: false,
            pending_inline: None,
        }
    }

    fn msg(&mut self) -> &mut OsciMessage {
        self.msg.as_mut().expect("message allocated at envelope")
    }

    fn classify(&mut self, ev: &StartEvent<'_>) -> HeaderKind {
        if ev.ns != ns::OSCI {
            return HeaderKind::Custom;
        }
        match ev.local {
            ns::node::CONTROL_BLOCK => HeaderKind::ControlBlock,
            ns::node::CLIENT_SIGNATURE | ns::node::SUPPLIER_SIGNATURE => HeaderKind::Signature,
            ns::node::DESIRED_LANGUAGES => HeaderKind::DesiredLanguages,
            ns::node::QUALITY_OF_TIMESTAMP => HeaderKind::QualityOfTimestamp,
            ns::node::FEEDBACK => HeaderKind::Feedback,
            ns::node::PROCESS_CARD_BUNDLE => HeaderKind::ProcessCardBundle,
            ns::node::CHUNK_INFORMATION => HeaderKind::ChunkInformation,
            ns::node::FEATURE_DESCRIPTION => HeaderKind::FeatureDescription,
            ns::node::INTERMEDIARY_CERTIFICATES => HeaderKind::IntermediaryCertificates,
            ns::node::NON_INTERMEDIARY_CERTIFICATES => HeaderKind::NonIntermediaryCertificates,
            local => {
                let expected = self.msg().message_type.header_element();
                if expected == Some(local) {
                    HeaderKind::MessageSpecific
                } else {
                    HeaderKind::Custom
                }
            }
        }
    }

    /// Register a header child as signature-relevant when it declares an Id.
    fn track(&self, ev: &StartEvent<'_>, ctx: &mut ParseContext<'_>) -> Result<()> {
        if let Some(id) = ev.id() {
            let id = id.to_owned();
            ctx.track_element(ev, &id)?;
        }
        Ok(())
    }

    fn header_end_checks(&mut self) -> Result<()> {
        let msg = self.msg();
        if !self.explicit_type {
            // A fault envelope is only recognized once the body is parsed;
            // required-part checks do not apply to it.
            return Ok(());
        }
        let t = msg.message_type;
        if t.requires_control_block() && msg.control_block.is_none() {
            return Err(Error::MissingRequiredPart {
                message_type: t.name().to_owned(),
                part: "ControlBlock",
            });
        }
        if t.requires_feedback() && msg.feedback.is_empty() {
            return Err(Error::MissingRequiredPart {
                message_type: t.name().to_owned(),
                part: "Feedback",
            });
        }
        if t.requires_process_card() && msg.process_cards.is_empty() {
            return Err(Error::MissingRequiredPart {
                message_type: t.name().to_owned(),
                part: "ProcessCardBundle",
            });
        }
        Ok(())
    }
}

impl ElementHandler for MessageBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        match self.state {
            State::AwaitEnvelope => {
                if ev.ns != ns::SOAP || ev.local != ns::node::ENVELOPE {
                    return Err(Error::UnexpectedElement(ev.qname.to_owned()));
                }
                let schema = ev
                    .attrs
                    .iter()
                    .find(|a| a.local == ns::attr::SCHEMA_LOCATION)
                    .map(|a| a.value.as_str());
                let message_type = schema
                    .and_then(|s| s.split_whitespace().last())
                    .and_then(OsciMessageType::from_schema_file);
                self.explicit_type = message_type.is_some();
                if schema.is_some() && !self.explicit_type {
                    return Err(Error::XmlStructure(format!(
                        "unrecognized schema location: {}",
                        schema.unwrap_or_default()
                    )));
                }
                let mut msg = Box::new(OsciMessage::new(
                    message_type.unwrap_or(OsciMessageType::SoapFault),
                ));
                msg.ns_prefixes = ev.decls.to_vec();
                self.msg = Some(msg);
                self.state = State::InEnvelope;
                Ok(Transition::Stay)
            }
            State::InEnvelope => match (ev.ns, ev.local) {
                (ns::SOAP, ns::node::HEADER) => {
                    if self.saw_header {
                        return Err(Error::DuplicateElement("Header".into()));
                    }
                    self.saw_header = true;
                    self.state = State::InHeader;
                    Ok(Transition::Stay)
                }
                (ns::SOAP, ns::node::BODY) => {
                    if self.saw_body {
                        return Err(Error::DuplicateElement("Body".into()));
                    }
                    self.saw_body = true;
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(BodyBuilder::new(ev))))
                }
                _ => Err(Error::UnexpectedElement(ev.qname.to_owned())),
            },
            State::InHeader => match self.classify(ev) {
                HeaderKind::ControlBlock => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(ControlBlockBuilder::new(ev)?)))
                }
                HeaderKind::Signature => {
                    if self.msg().signature.is_some() {
                        return Err(Error::DuplicateElement(ev.local.to_owned()));
                    }
                    Ok(Transition::Push(Box::new(SignatureBuilder::new(ev))))
                }
                HeaderKind::DesiredLanguages => {
                    self.track(ev, ctx)?;
                    let languages = ev
                        .attr(ns::attr::LANGUAGES_LIST)
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(str::to_owned)
                        .collect();
                    let part = DesiredLanguages {
                        id: ev.id().unwrap_or(DesiredLanguages::ID).to_owned(),
                        languages,
                    };
                    if self.msg().desired_languages.replace(part).is_some() {
                        return Err(Error::DuplicateElement(ev.local.to_owned()));
                    }
                    self.pending_inline = Some(ns::node::DESIRED_LANGUAGES);
                    Ok(Transition::Stay)
                }
                HeaderKind::QualityOfTimestamp => {
                    self.track(ev, ctx)?;
                    let reception = ev.attr(ns::attr::SERVICE) == Some("reception");
                    let cryptographic = ev.attr(ns::attr::QUALITY) == Some("cryptographic");
                    let part = QualityOfTimestamp {
                        reception,
                        cryptographic,
                    };
                    let slot = if reception {
                        &mut self.msg().quality_of_timestamp_reception
                    } else {
                        &mut self.msg().quality_of_timestamp_creation
                    };
                    if slot.replace(part).is_some() {
                        return Err(Error::DuplicateElement(ev.local.to_owned()));
                    }
                    self.pending_inline = Some(ns::node::QUALITY_OF_TIMESTAMP);
                    Ok(Transition::Stay)
                }
                HeaderKind::Feedback => {
                    self.track(ev, ctx)?;
                    if !self.msg().feedback.is_empty() {
                        return Err(Error::DuplicateElement(ev.local.to_owned()));
                    }
                    Ok(Transition::Push(Box::new(FeedbackBuilder::new())))
                }
                HeaderKind::ProcessCardBundle => {
                    Ok(Transition::Push(Box::new(ProcessCardBuilder::new())))
                }
                HeaderKind::ChunkInformation => {
                    self.track(ev, ctx)?;
                    let part = ChunkInformation {
                        chunk_number: parse_num(ev.attr(ns::attr::CHUNK_NUMBER))?,
                        total_chunk_numbers: parse_num(ev.attr(ns::attr::TOTAL_CHUNK_NUMBERS))?,
                        total_message_size: parse_num(ev.attr(ns::attr::TOTAL_MESSAGE_SIZE))?,
                        chunk_size: parse_num(ev.attr(ns::attr::CHUNK_SIZE))?,
                    };
                    if self.msg().chunk_information.replace(part).is_some() {
                        return Err(Error::DuplicateElement(ev.local.to_owned()));
                    }
                    self.pending_inline = Some(ns::node::CHUNK_INFORMATION);
                    Ok(Transition::Stay)
                }
                HeaderKind::FeatureDescription => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(FeatureDescriptionBuilder::new(ev))))
                }
                HeaderKind::IntermediaryCertificates => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(CertificatesBuilder::new(ev, true))))
                }
                HeaderKind::NonIntermediaryCertificates => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(CertificatesBuilder::new(
                        ev, false,
                    ))))
                }
                HeaderKind::MessageSpecific => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(DeliveryBuilder::new(ev))))
                }
                HeaderKind::Custom => {
                    self.track(ev, ctx)?;
                    Ok(Transition::Push(Box::new(CustomHeaderBuilder::new(ev, ctx))))
                }
            },
            State::Done => Err(Error::UnexpectedElement(ev.qname.to_owned())),
        }
    }

    fn end_element(
        &mut self,
        _qname: &str,
        local: &str,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if let Some(expected) = self.pending_inline {
            if expected == local {
                self.pending_inline = None;
                return Ok(Transition::Stay);
            }
        }
        match (self.state, local) {
            (State::InHeader, ns::node::HEADER) => {
                self.header_end_checks()?;
                self.state = State::InEnvelope;
                Ok(Transition::Stay)
            }
            (State::InEnvelope, ns::node::ENVELOPE) => {
                if !self.saw_body {
                    return Err(Error::MissingElement("Body".into()));
                }
                let msg = self.msg.take().expect("message allocated at envelope");
                if !self.explicit_type && msg.body.fault.is_none() {
                    return Err(Error::MissingAttribute(
                        "xsi:schemaLocation on Envelope".into(),
                    ));
                }
                self.state = State::Done;
                Ok(Transition::Pop(BuiltPart::Message(msg)))
            }
            _ => Err(Error::UnexpectedEndTag(local.to_owned())),
        }
    }

    fn child_complete(&mut self, part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        match part {
            BuiltPart::ControlBlock(cb) => {
                if self.msg().control_block.replace(cb).is_some() {
                    return Err(Error::DuplicateElement("ControlBlock".into()));
                }
            }
            BuiltPart::Signature(sig) => {
                if self.msg().signature.replace(*sig).is_some() {
                    return Err(Error::DuplicateElement("Signature".into()));
                }
            }
            BuiltPart::Feedback(entries) => self.msg().feedback = entries,
            BuiltPart::ProcessCard(card) => self.msg().process_cards.push(*card),
            BuiltPart::FeatureDescription(fd) => {
                if self.msg().feature_description.replace(fd).is_some() {
                    return Err(Error::DuplicateElement("FeatureDescription".into()));
                }
            }
            BuiltPart::Certificates {
                intermediary,
                header,
            } => {
                let slot = if intermediary {
                    &mut self.msg().intermediary_certificates
                } else {
                    &mut self.msg().non_intermediary_certificates
                };
                if slot.replace(header).is_some() {
                    return Err(Error::DuplicateElement("certificates header".into()));
                }
            }
            BuiltPart::Delivery {
                header,
                process_cards,
                quantity_limit,
            } => {
                let msg = self.msg();
                if msg.delivery_header.replace(header).is_some() {
                    return Err(Error::DuplicateElement("delivery header".into()));
                }
                msg.process_cards.extend(process_cards);
                msg.quantity_limit = quantity_limit;
            }
            BuiltPart::Body(body) => self.msg().body = *body,
            BuiltPart::CustomHeader(header) => self.msg().custom_headers.push(header),
            _ => return Err(Error::XmlStructure("unexpected child part".into())),
        }
        Ok(())
    }
}

fn parse_num(value: Option<&str>) -> Result<Option<u64>> {
    match value {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::XmlStructure(format!("invalid numeric attribute: {v}"))),
    }
}
