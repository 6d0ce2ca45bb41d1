#![forbid(unsafe_code)]

use super::{capture_or_whitespace, BuiltPart, ElementHandler, TextCapture, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::{Inspection, ProcessCardBundle, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TsSlot {
    Creation,
    Forwarding,
    Reception,
}

enum Field {
    MessageId,
    Subject,
    TimestampValue,
    InspectionSubject,
    InspectionCertType,
    InspectionMathResult,
    InspectionOfflineResult,
}

/// Builder for a `ProcessCardBundle` audit record.
pub struct ProcessCardBuilder {
    bundle: ProcessCardBundle,
    capture: TextCapture,
    field: Option<Field>,
    ts_slot: Option<TsSlot>,
    ts_cryptographic: bool,
    inspection: Option<Inspection>,
}

impl ProcessCardBuilder {
    pub fn new() -> Self {
        Self {
            bundle: ProcessCardBundle::default(),
            capture: TextCapture::default(),
            field: None,
            ts_slot: None,
            ts_cryptographic: false,
            inspection: None,
        }
    }

    fn open(&mut self, field: Field) {
        self.capture.open();
        self.field = Some(field);
    }
}

impl ElementHandler for ProcessCardBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::OSCI {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match ev.local {
            ns::node::MESSAGE_ID => self.open(Field::MessageId),
            ns::node::PROCESS_CARD => {
                self.bundle.recent_modification = ev
                    .attr(ns::attr::RECENT_MODIFICATION)
                    .map(str::to_owned);
            }
            ns::node::CREATION => self.ts_slot = Some(TsSlot::Creation),
            ns::node::FORWARDING => self.ts_slot = Some(TsSlot::Forwarding),
            ns::node::RECEPTION => self.ts_slot = Some(TsSlot::Reception),
            ns::node::TIMESTAMP => {}
            ns::node::PLAIN => {
                self.ts_cryptographic = false;
                self.open(Field::TimestampValue);
            }
            "Cryptographic" => {
                self.ts_cryptographic = true;
                self.open(Field::TimestampValue);
            }
            ns::node::SUBJECT => {
                if self.inspection.is_some() {
                    self.open(Field::InspectionSubject);
                } else {
                    self.open(Field::Subject);
                }
            }
            ns::node::INSPECTION_REPORT => {}
            ns::node::INSPECTION => self.inspection = Some(Inspection::default()),
            ns::node::X509_SUBJECT_NAME => self.open(Field::InspectionSubject),
            ns::node::CERT_TYPE => self.open(Field::InspectionCertType),
            ns::node::MATH_RESULT => self.open(Field::InspectionMathResult),
            ns::node::OFFLINE_RESULT => self.open(Field::InspectionOfflineResult),
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
                Some(Field::MessageId) => self.bundle.message_id = Some(text),
                Some(Field::Subject) => self.bundle.subject = Some(text),
                Some(Field::TimestampValue) => {
                    let ts = Timestamp {
                        cryptographic: self.ts_cryptographic,
                        value: text,
                    };
                    match self.ts_slot {
                        Some(TsSlot::Creation) => self.bundle.creation = Some(ts),
                        Some(TsSlot::Forwarding) => self.bundle.forwarding = Some(ts),
                        Some(TsSlot::Reception) => self.bundle.reception = Some(ts),
                        None => {
                            return Err(Error::XmlStructure(
                                "Timestamp outside Creation/Forwarding/Reception".into(),
                            ));
                        }
                    }
                }
                Some(Field::InspectionSubject) => {
                    if let Some(inspection) = &mut self.inspection {
                        inspection.subject = Some(text);
                    }
                }
                Some(Field::InspectionCertType) => {
                    if let Some(inspection) = &mut self.inspection {
                        inspection.cert_type = Some(text);
                    }
                }
                Some(Field::InspectionMathResult) => {
                    if let Some(inspection) = &mut self.inspection {
                        inspection.math_result = Some(text);
                    }
                }
                Some(Field::InspectionOfflineResult) => {
                    if let Some(inspection) = &mut self.inspection {
                        inspection.offline_result = Some(text);
                    }
                }
                None => {}
            }
            return Ok(Transition::Stay);
        }

        match local {
            ns::node::CREATION | ns::node::FORWARDING | ns::node::RECEPTION => {
                self.ts_slot = None;
            }
            ns::node::INSPECTION => {
                if let Some(inspection) = self.inspection.take() {
                    self.bundle.inspections.push(inspection);
                }
            }
            ns::node::PROCESS_CARD_BUNDLE => {
                return Ok(Transition::Pop(BuiltPart::ProcessCard(Box::new(
                    std::mem::take(&mut self.bundle),
                ))));
            }
            _ => {}
        }
        Ok(Transition::Stay)
    }

    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        capture_or_whitespace(&mut self.capture, text)
    }
}
