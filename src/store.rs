//! Session-scoped result store.
//!
//! One [`ResultStore`] lives for one user session. Batches add to it; the
//! archiver and the presentation layer read from it. Keys are output names
//! (`{stem}_OCR.docx`) and iterate in insertion order. Putting a key that
//! already exists replaces the value in place, so two uploads sharing a
//! stem leave exactly one entry, holding the later result.

use crate::output::{truncate_preview, DOCX_MIME};
use indexmap::IndexMap;
use serde::Serialize;

/// One assembled output plus the text it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    /// Original upload filename.
    pub original_name: String,
    /// Assembled DOCX bytes.
    pub bytes: Vec<u8>,
    /// Page-marked plain text (see [`crate::output::ExtractedDocument::plain_text`]).
    pub extracted_text: String,
}

impl StoredResult {
    pub fn new(
        original_name: impl Into<String>,
        bytes: Vec<u8>,
        extracted_text: impl Into<String>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            bytes,
            extracted_text: extracted_text.into(),
        }
    }

    pub fn mime(&self) -> &'static str {
        DOCX_MIME
    }

    /// First `limit` characters of the extracted text, `...` when cut.
    pub fn preview(&self, limit: usize) -> String {
        truncate_preview(&self.extracted_text, limit)
    }
}

/// Listing row: everything but the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreEntry {
    pub key: String,
    pub original_name: String,
    pub size: usize,
}

/// Insertion-ordered map of output name → [`StoredResult`].
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    entries: IndexMap<String, StoredResult>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace. A replaced key keeps its original position; the
    /// previous value is returned.
    pub fn put(&mut self, key: impl Into<String>, value: StoredResult) -> Option<StoredResult> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&StoredResult> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StoredResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keys in insertion order, collected.
    pub fn list(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Key, original name and size of every entry, in insertion order.
    pub fn entries(&self) -> Vec<StoreEntry> {
        self.iter()
            .map(|(key, v)| StoreEntry {
                key: key.to_string(),
                original_name: v.original_name.clone(),
                size: v.bytes.len(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Same as [`Self::len`].
    pub fn size(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total payload bytes held.
    pub fn total_bytes(&self) -> usize {
        self.entries.values().map(|v| v.bytes.len()).sum()
    }

    /// Owned `(filename, bytes)` pairs as they stand right now. Later puts
    /// do not affect a snapshot already taken.
    pub fn snapshot(&self) -> Vec<(String, Vec<u8>)> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.bytes.clone()))
            .collect()
    }

    /// Drop every entry, ending the session's results.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, bytes: &[u8]) -> StoredResult {
        StoredResult::new(name, bytes.to_vec(), format!("text of {name}"))
    }

    #[test]
    fn keys_iterate_in_insertion_order() {
        let mut store = ResultStore::new();
        store.put("b_OCR.docx", result("b.pdf", b"2"));
        store.put("a_OCR.docx", result("a.pdf", b"1"));
        store.put("c_OCR.docx", result("c.pdf", b"3"));
        let keys: Vec<&str> = store.keys().collect();
        assert_eq!(keys, vec!["b_OCR.docx", "a_OCR.docx", "c_OCR.docx"]);
    }

    #[test]
    fn put_replaces_in_place() {
        let mut store = ResultStore::new();
        assert!(store.put("report_OCR.docx", result("report.pdf", b"first")).is_none());
        store.put("other_OCR.docx", result("other.pdf", b"x"));
        let old = store
            .put("report_OCR.docx", result("dir/report.pdf", b"second"))
            .expect("previous value returned");

        assert_eq!(old.bytes, b"first");
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("report_OCR.docx").unwrap().bytes, b"second");
        assert_eq!(store.keys().next(), Some("report_OCR.docx"));
    }

    #[test]
    fn list_and_totals() {
        let mut store = ResultStore::new();
        store.put("a_OCR.docx", result("a.pdf", b"12345"));
        store.put("b_OCR.docx", result("b.pdf", b"678"));
        assert_eq!(store.total_bytes(), 8);
        assert_eq!(store.size(), 2);
        assert_eq!(store.list(), vec!["a_OCR.docx", "b_OCR.docx"]);
        assert_eq!(
            store.entries()[1],
            StoreEntry {
                key: "b_OCR.docx".into(),
                original_name: "b.pdf".into(),
                size: 3,
            }
        );
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = ResultStore::new();
        store.put("a_OCR.docx", result("a.pdf", b"1"));
        let snap = store.snapshot();
        store.put("b_OCR.docx", result("b.pdf", b"2"));
        assert_eq!(snap, vec![("a_OCR.docx".to_string(), b"1".to_vec())]);
    }

    #[test]
    fn clear_empties() {
        let mut store = ResultStore::new();
        store.put("a_OCR.docx", result("a.pdf", b"1"));
        assert!(store.contains("a_OCR.docx"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.get("a_OCR.docx").is_none());
    }

    #[test]
    fn stored_result_preview() {
        let r = StoredResult::new("a.pdf", vec![], "abcdef");
        assert_eq!(r.preview(3), "abc...");
        assert_eq!(r.preview(6), "abcdef");
        assert_eq!(r.mime(), DOCX_MIME);
    }
}
