//! Registry of ingested documents.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::index::VectorIndex;

/// Length of a document id, in hex characters.
const DOC_ID_LEN: usize = 12;

/// An ingested document and its fully built index.
#[derive(Debug)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub page_count: usize,
    pub index: VectorIndex,
}

/// Shared map from document id to document.
///
/// Cloning is cheap and every clone sees the same documents. A document is
/// only inserted once its index is complete, so a lookup either misses or
/// returns something that can be queried. Entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    documents: Arc<RwLock<HashMap<String, Arc<Document>>>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document under a fresh id and return the id.
    pub async fn register(
        &self,
        filename: impl Into<String>,
        page_count: usize,
        index: VectorIndex,
    ) -> String {
        let mut documents = self.documents.write().await;

        let mut id = new_doc_id();
        while documents.contains_key(&id) {
            id = new_doc_id();
        }

        let document = Document {
            id: id.clone(),
            filename: filename.into(),
            page_count,
            index,
        };
        debug!(
            "Registered document {id} ({}, {} chunks)",
            document.filename,
            document.index.len()
        );
        documents.insert(id.clone(), Arc::new(document));
        id
    }

    /// Get a document by id.
    pub async fn lookup(&self, id: &str) -> Option<Arc<Document>> {
        self.documents.read().await.get(id).cloned()
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

fn new_doc_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(DOC_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn index() -> VectorIndex {
        VectorIndex::build(vec![Chunk::new(1, 1, "hello")], vec![vec![1.0, 0.0]]).unwrap()
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let store = DocumentStore::new();
        assert!(store.is_empty().await);

        let id = store.register("manual.pdf", 3, index()).await;

        assert_eq!(id.len(), 12);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));

        let doc = store.lookup(&id).await.unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.filename, "manual.pdf");
        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.index.len(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_misses() {
        let store = DocumentStore::new();
        store.register("a.pdf", 1, index()).await;
        assert!(store.lookup("000000000000").await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_documents() {
        let store = DocumentStore::new();
        let other = store.clone();

        let id = store.register("a.pdf", 1, index()).await;

        assert!(other.lookup(&id).await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registration_yields_distinct_ids() {
        let store = DocumentStore::new();

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.register(format!("{i}.pdf"), 1, index()).await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }

        assert_eq!(ids.len(), 32);
        assert_eq!(store.len().await, 32);
        for id in &ids {
            assert!(store.lookup(id).await.is_some());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lookups_during_registration_see_whole_documents() {
        const DOCUMENTS: usize = 16;
        const CHUNKS: usize = 64;

        fn large_index() -> VectorIndex {
            let chunks = (1..=CHUNKS).map(|i| Chunk::new(1, i, format!("c{i}"))).collect();
            let embeddings = (0..CHUNKS).map(|_| vec![0.6, 0.8]).collect();
            VectorIndex::build(chunks, embeddings).unwrap()
        }

        let store = DocumentStore::new();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    let mut seen = 0;
                    while seen < DOCUMENTS {
                        let ids: Vec<String> =
                            store.documents.read().await.keys().cloned().collect();
                        for id in &ids {
                            let doc = store.lookup(id).await.unwrap();
                            assert_eq!(doc.index.len(), CHUNKS);
                            assert_eq!(doc.index.dimension(), 2);
                        }
                        assert!(store.lookup("000000000000").await.is_none());
                        seen = ids.len();
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        let writers: Vec<_> = (0..DOCUMENTS)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(
                    async move { store.register(format!("{i}.pdf"), 1, large_index()).await },
                )
            })
            .collect();

        for writer in writers {
            writer.await.unwrap();
        }
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(store.len().await, DOCUMENTS);
    }
}
