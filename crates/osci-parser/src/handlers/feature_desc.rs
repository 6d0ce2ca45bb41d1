#![forbid(unsafe_code)]

use super::{BuiltPart, ElementHandler, Transition};
use crate::dispatcher::{ParseContext, StartEvent};
use osci_core::{ns, Error, Result};
use osci_message::parts::{Feature, FeatureDescription};

/// Builder for the `FeatureDescription` header.
pub struct FeatureDescriptionBuilder {
    fd: FeatureDescription,
}

impl FeatureDescriptionBuilder {
    pub fn new(ev: &StartEvent<'_>) -> Self {
        let mut fd = FeatureDescription::default();
        if let Some(id) = ev.id() {
            fd.id = id.to_owned();
        }
        Self { fd }
    }
}

impl ElementHandler for FeatureDescriptionBuilder {
    fn start_element(
        &mut self,
        ev: &StartEvent<'_>,
        _ctx: &mut ParseContext<'_>,
    ) -> Result<Transition> {
        if ev.ns != ns::OSCI {
            return Err(Error::UnexpectedElement(ev.qname.to_owned()));
        }
        match ev.local {
            ns::node::SUPPORTED_FEATURES => {}
            ns::node::FEATURE => {
                self.fd.features.push(Feature {
                    key: ev.required_attr(ns::attr::KEY)?.to_owned(),
                    version: ev.attr(ns::attr::VERSION).map(str::to_owned),
                });
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
            ns::node::FEATURE | ns::node::SUPPORTED_FEATURES => Ok(Transition::Stay),
            ns::node::FEATURE_DESCRIPTION => Ok(Transition::Pop(
                BuiltPart::FeatureDescription(std::mem::replace(
                    &mut self.fd,
                    FeatureDescription::default(),
                )),
            )),
            _ => Err(Error::UnexpectedEndTag(local.to_owned())),
        }
    }
}
