#![forbid(unsafe_code)]

//! The canonicalizing hash stream.
//!
//! The canonizer observes the event stream of a single parse pass.  When the
//! handler chain marks an element id as signature-relevant, it accumulates
//! the canonical serialized form of that subtree into a running digest and
//! files the finished hash under the declared reference id.  `SignedInfo`
//! blocks are captured verbatim (in canonical form) into a FIFO queue, since
//! signature verification needs their exact bytes.
//!
//! Tracking is a plain stack: the innermost close pairs with the innermost
//! open.  A tracked subtree's root element is rendered with all in-scope
//! namespace declarations hoisted onto it, so a subtree digests identically
//! whether it is serialized standalone or embedded in an envelope.

use crate::writer::{render_end, render_start, render_text};
use osci_core::{Error, Result};
use osci_crypto::digest::{DigestSuite, PartDigest};
use std::collections::{HashMap, VecDeque};

struct TrackedFrame {
    ref_id: String,
    depth: usize,
    hasher: PartDigest,
}

struct SignedInfoCapture {
    depth: usize,
    buf: Vec<u8>,
}

pub struct Canonizer {
    suite: DigestSuite,
    depth: usize,
    pending_track: Option<(String, PartDigest)>,
    tracked: Vec<TrackedFrame>,
    digests: HashMap<String, Vec<u8>>,
    pending_signed_info: bool,
    signed_info: Option<SignedInfoCapture>,
    signed_infos: VecDeque<Vec<u8>>,
}

impl Canonizer {
    pub fn new(suite: DigestSuite) -> Self {
        Self {
            suite,
            depth: 0,
            pending_track: None,
            tracked: Vec::new(),
            digests: HashMap::new(),
            pending_signed_info: false,
            signed_info: None,
            signed_infos: VecDeque::new(),
        }
    }

    /// Mark the next opened element as signature-relevant under `ref_id`.
    pub fn begin_tracking(&mut self, ref_id: &str) -> Result<()> {
        if self.pending_track.is_some() {
            return Err(Error::XmlStructure(format!(
                "tracking for {ref_id} requested while another request is pending"
            )));
        }
        self.pending_track = Some((ref_id.to_owned(), self.suite.start()));
        Ok(())
    }

    /// Capture the next opened element (and its subtree) as a `SignedInfo`
    /// block.
    pub fn begin_signed_info(&mut self) -> Result<()> {
        if self.pending_signed_info || self.signed_info.is_some() {
            return Err(Error::XmlStructure(
                "SignedInfo capture already active".into(),
            ));
        }
        self.pending_signed_info = true;
        Ok(())
    }

    /// Observe an element start.  `in_scope` is the full namespace binding
    /// set at this element (outer scopes merged with the element's own
    /// declarations); it is hoisted onto the roots of freshly tracked
    /// subtrees and captures.
    pub fn start_element(
        &mut self,
        qname: &str,
        decls: &[(&str, &str)],
        attrs: &[(&str, &str)],
        in_scope: &[(&str, &str)],
    ) {
        self.depth += 1;

        let mut plain = Vec::new();
        render_start(&mut plain, qname, decls, attrs);
        self.feed(&plain);
        if let Some(capture) = &mut self.signed_info {
            capture.buf.extend_from_slice(&plain);
        }

        if self.pending_track.is_some() || self.pending_signed_info {
            let mut hoisted = Vec::new();
            render_start(&mut hoisted, qname, in_scope, attrs);

            if let Some((ref_id, mut hasher)) = self.pending_track.take() {
                hasher.update(&hoisted);
                self.tracked.push(TrackedFrame {
                    ref_id,
                    depth: self.depth,
                    hasher,
                });
            }
            if std::mem::take(&mut self.pending_signed_info) {
                self.signed_info = Some(SignedInfoCapture {
                    depth: self.depth,
                    buf: hoisted,
                });
            }
        }
    }

    /// Observe character data.
    pub fn text(&mut self, text: &str) {
        let mut bytes = Vec::new();
        render_text(&mut bytes, text);
        self.feed(&bytes);
        if let Some(capture) = &mut self.signed_info {
            capture.buf.extend_from_slice(&bytes);
        }
    }

    /// Observe an element end.  Finalizes any tracked subtree or capture
    /// closing at this depth.
    pub fn end_element(&mut self, qname: &str) {
        let mut bytes = Vec::new();
        render_end(&mut bytes, qname);
        self.feed(&bytes);
        if let Some(capture) = &mut self.signed_info {
            capture.buf.extend_from_slice(&bytes);
        }

        if self
            .tracked
            .last()
            .is_some_and(|frame| frame.depth == self.depth)
        {
            let frame = self.tracked.pop().expect("frame present");
            self.digests.insert(frame.ref_id, frame.hasher.finish());
        }
        if self
            .signed_info
            .as_ref()
            .is_some_and(|capture| capture.depth == self.depth)
        {
            let capture = self.signed_info.take().expect("capture present");
            self.signed_infos.push_back(capture.buf);
        }

        self.depth = self.depth.saturating_sub(1);
    }

    fn feed(&mut self, bytes: &[u8]) {
        for frame in &mut self.tracked {
            frame.hasher.update(bytes);
        }
        // SignedInfo bytes are appended by the callers above; only digests
        // are fed here.
    }

    /// Digest suite in effect.
    pub fn suite(&self) -> DigestSuite {
        self.suite
    }

    /// Take the completed per-reference digest map.
    pub fn take_digests(&mut self) -> HashMap<String, Vec<u8>> {
        std::mem::take(&mut self.digests)
    }

    /// Pop the oldest captured `SignedInfo` block.
    pub fn next_signed_info(&mut self) -> Option<Vec<u8>> {
        self.signed_infos.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &[(&str, &str)] = &[("osci", "http://www.osci.de/2002/04/osci")];

    #[test]
    fn tracked_subtree_digest_matches_standalone_bytes() {
        let mut c = Canonizer::new(DigestSuite::Sha256);
        c.start_element("soap:Envelope", SCOPE, &[], SCOPE);
        c.begin_tracking("controlblock").unwrap();
        c.start_element("osci:ControlBlock", &[], &[("Id", "controlblock")], SCOPE);
        c.text("x");
        c.end_element("osci:ControlBlock");
        c.end_element("soap:Envelope");

        let digests = c.take_digests();
        let expected_bytes = "<osci:ControlBlock xmlns:osci=\"http://www.osci.de/2002/04/osci\" \
             Id=\"controlblock\">x</osci:ControlBlock>";
        let expected = DigestSuite::Sha256.hash(expected_bytes.as_bytes());
        assert_eq!(digests.get("controlblock"), Some(&expected));
    }

    #[test]
    fn digest_computed_exactly_once_per_subtree() {
        let mut c = Canonizer::new(DigestSuite::Sha256);
        c.begin_tracking("a").unwrap();
        c.start_element("a", &[], &[], &[]);
        c.end_element("a");
        c.begin_tracking("b").unwrap();
        c.start_element("b", &[], &[], &[]);
        c.end_element("b");
        let digests = c.take_digests();
        assert_eq!(digests.len(), 2);
    }

    #[test]
    fn signed_info_fifo_order() {
        let mut c = Canonizer::new(DigestSuite::Sha256);
        for tag in ["ds:SignedInfo", "ds:SignedInfo"] {
            c.begin_signed_info().unwrap();
            c.start_element(tag, &[], &[], &[("ds", "urn:ds")]);
            c.text(if c.signed_infos.is_empty() { "first" } else { "second" });
            c.end_element(tag);
        }
        let first = c.next_signed_info().unwrap();
        let second = c.next_signed_info().unwrap();
        assert!(String::from_utf8(first).unwrap().contains("first"));
        assert!(String::from_utf8(second).unwrap().contains("second"));
        assert!(c.next_signed_info().is_none());
    }

    #[test]
    fn pending_tracking_is_exclusive() {
        let mut c = Canonizer::new(DigestSuite::Sha256);
        c.begin_tracking("a").unwrap();
        assert!(c.begin_tracking("b").is_err());
    }
}
