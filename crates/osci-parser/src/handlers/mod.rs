#![forbid(unsafe_code)]

//! The element handler chain.
//!
//! Each builder is a small state machine recognizing one schema fragment.
//! Builders are stacked by the dispatcher: a parent recognizing a child
//! fragment pushes the child's builder, and the child pops itself with its
//! finished part when its end tag arrives.

use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{Error, Result};
use osci_message::msg::MessageBody;
use osci_message::parts::{
    CertificatesHeader, ChunkInformation, ControlBlock, CustomHeader, DeliveryHeader,
    FeatureDescription, FeedbackEntry, ProcessCardBundle, SoapFaultInfo,
};
use osci_message::signature::SignatureHeader;
use osci_message::{EncryptedDataOsci, OsciMessage};

mod body;
mod certificates;
mod chunk_info;
mod control_block;
mod custom;
mod delivery;
mod feature_desc;
mod feedback;
mod message;
mod process_card;
mod signature;

pub use body::BodyBuilder;
pub use certificates::CertificatesBuilder;
pub use control_block::ControlBlockBuilder;
pub use custom::CustomHeaderBuilder;
pub use delivery::DeliveryBuilder;
pub use feature_desc::FeatureDescriptionBuilder;
pub use feedback::FeedbackBuilder;
pub use message::MessageBuilder;
pub use process_card::ProcessCardBuilder;
pub use signature::SignatureBuilder;

/// What a completed builder hands back to its parent.
pub enum BuiltPart {
    Message(Box<OsciMessage>),
    ControlBlock(ControlBlock),
    Signature(Box<SignatureHeader>),
    ProcessCard(Box<ProcessCardBundle>),
    Feedback(Vec<FeedbackEntry>),
    ChunkInformation(ChunkInformation),
    FeatureDescription(FeatureDescription),
    Certificates {
        intermediary: bool,
        header: CertificatesHeader,
    },
    Delivery {
        header: DeliveryHeader,
        process_cards: Vec<ProcessCardBundle>,
        quantity_limit: Option<u64>,
    },
    Body(Box<MessageBody>),
    EncryptedData(Box<EncryptedDataOsci>),
    Container(Box<osci_message::ContentContainer>),
    Fault(SoapFaultInfo),
    CustomHeader(CustomHeader),
}

/// What a handler wants the dispatcher to do next.
pub enum Transition {
    Stay,
    Push(Box<dyn ElementHandler>),
    Pop(BuiltPart),
}

/// One frame of the handler stack.
pub trait ElementHandler {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Transition>;

    fn end_element(
        &mut self,
        qname: &str,
        local: &str,
        ctx: &mut ParseContext<'_>,
    ) -> Result<Transition>;

    /// Character data.  Without an open capture, only whitespace is legal.
    fn characters(&mut self, text: &str, _ctx: &mut ParseContext<'_>) -> Result<()> {
        if text.trim().is_empty() {
            Ok(())
        } else {
            Err(Error::StrayText(text.trim().to_owned()))
        }
    }

    /// A pushed child finished and delivers its part.
    fn child_complete(&mut self, _part: BuiltPart, _ctx: &mut ParseContext<'_>) -> Result<()> {
        Err(Error::XmlStructure("unexpected child part".into()))
    }
}

/// A text buffer a builder opens when it expects character data.
#[derive(Default)]
pub struct TextCapture(Option<String>);

impl TextCapture {
    pub fn open(&mut self) {
        self.0 = Some(String::new());
    }

    pub fn is_open(&self) -> bool {
        self.0.is_some()
    }

    /// Append text if a capture is open; returns whether it was consumed.
    pub fn push(&mut self, text: &str) -> bool {
        match &mut self.0 {
            Some(buf) => {
                buf.push_str(text);
                true
            }
            None => false,
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }
}

/// Shared characters implementation for builders with one capture buffer.
pub(crate) fn capture_or_whitespace(capture: &mut TextCapture, text: &str) -> Result<()> {
    if capture.push(text) || text.trim().is_empty() {
        Ok(())
    } else {
        Err(Error::StrayText(text.trim().to_owned()))
    }
}
