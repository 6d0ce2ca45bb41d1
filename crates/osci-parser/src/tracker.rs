#![forbid(unsafe_code)]

//! Duplicate detection for signature-relevant elements.

use osci_core::{Error, Result};
use std::collections::HashSet;

/// Tracks which parsed elements are signature-relevant.
///
/// Each relevant element, identified by (local name, namespace URI,
/// canonical attribute signature), may appear at most once.  The duplicate
/// check is globally toggleable; reference-id collection is not.
pub struct UniqueElementTracker {
    check_duplicates: bool,
    seen: HashSet<(String, String, String)>,
    ids: Vec<String>,
}

impl UniqueElementTracker {
    pub fn new(check_duplicates: bool) -> Self {
        Self {
            check_duplicates,
            seen: HashSet::new(),
            ids: Vec::new(),
        }
    }

    /// Register an element as signature-relevant under `ref_id`.
    pub fn register(
        &mut self,
        local: &str,
        ns_uri: &str,
        attrs_signature: &str,
        ref_id: &str,
    ) -> Result<()> {
        if self.check_duplicates {
            let key = (
                local.to_owned(),
                ns_uri.to_owned(),
                attrs_signature.to_owned(),
            );
            if !self.seen.insert(key) {
                return Err(Error::DuplicateElement(local.to_owned()));
            }
        }
        self.ids.push(ref_id.to_owned());
        Ok(())
    }

    /// Reference ids registered so far, in document order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_rejected_when_enabled() {
        let mut tracker = UniqueElementTracker::new(true);
        tracker
            .register("ControlBlock", "urn:osci", "Id=controlblock", "controlblock")
            .unwrap();
        assert!(tracker
            .register("ControlBlock", "urn:osci", "Id=controlblock", "controlblock")
            .is_err());
    }

    #[test]
    fn duplicate_tolerated_when_disabled() {
        let mut tracker = UniqueElementTracker::new(false);
        tracker.register("A", "urn:x", "", "a").unwrap();
        tracker.register("A", "urn:x", "", "a").unwrap();
        assert_eq!(tracker.ids().len(), 2);
    }

    #[test]
    fn differing_attribute_signatures_are_distinct() {
        let mut tracker = UniqueElementTracker::new(true);
        tracker.register("QualityOfTimestamp", "urn:osci", "Service=creation", "q1").unwrap();
        tracker.register("QualityOfTimestamp", "urn:osci", "Service=reception", "q2").unwrap();
        assert_eq!(tracker.ids(), &["q1".to_owned(), "q2".to_owned()]);
    }
}
