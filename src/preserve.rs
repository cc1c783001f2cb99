//! Document preservation
//!
//! When a descriptor opts in, the unmarshaller retains the whole parsed
//! tree next to the object it produced. Marshalling that object later
//! starts from the retained tree instead of building a fresh one, so
//! comments, processing instructions, sibling order and unmapped content
//! survive a read-modify-write cycle.
//!
//! Entries are keyed by the object's instance key. Cloning an object
//! assigns a fresh key, so a clone marshals without the retained tree.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::tree::{Document, NodeId};

/// A parsed tree retained for one unmarshalled object
#[derive(Debug, Clone)]
pub struct PreservedDocument {
    /// The whole document as parsed
    pub document: Document,
    /// Element the object was read from
    pub node: NodeId,
}

/// Shared store of retained trees, keyed by object instance key
#[derive(Debug, Default)]
pub struct DocumentPreservationStore {
    inner: Mutex<HashMap<u64, Arc<PreservedDocument>>>,
}

impl DocumentPreservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retain a parsed tree for the object with `key`
    pub fn retain(&self, key: u64, document: Document, node: NodeId) {
        debug!(key, node, "retaining document for preservation");
        self.lock()
            .insert(key, Arc::new(PreservedDocument { document, node }));
    }

    /// Look up the retained tree for `key`
    pub fn lookup(&self, key: u64) -> Option<Arc<PreservedDocument>> {
        self.lock().get(&key).cloned()
    }

    /// Drop the entry for `key`; returns whether one was present
    pub fn release(&self, key: u64) -> bool {
        self.lock().remove(&key).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<PreservedDocument>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retain_and_lookup() {
        let store = DocumentPreservationStore::new();
        let doc = Document::parse_str("<a><b/></a>").unwrap();
        let root = doc.root_element().unwrap();

        store.retain(7, doc, root);
        assert_eq!(store.len(), 1);

        let entry = store.lookup(7).unwrap();
        assert_eq!(entry.node, root);
        assert_eq!(entry.document.local_name(entry.node), "a");
        assert!(store.lookup(8).is_none());
    }

    #[test]
    fn test_release() {
        let store = DocumentPreservationStore::new();
        let doc = Document::parse_str("<a/>").unwrap();
        let root = doc.root_element().unwrap();
        store.retain(1, doc, root);

        assert!(store.release(1));
        assert!(!store.release(1));
        assert!(store.is_empty());
    }
}
