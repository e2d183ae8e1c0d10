//! Dense retrieval using HNSW
//!
//! Approximate nearest neighbor search via hnsw_rs, with candidates re-scored
//! by exact cosine similarity. Document vectors persist in an
//! [`EmbeddingStore`] so a reopened index never calls the embedding service.

use crate::data::Corpus;
use crate::embedding::{cosine_similarity, l2_norm, Embedder, Embedding, EmbeddingStore};
use crate::retrieval::{assign_ranks, clamp_top_k, IndexMetadata, Retriever, SearchResult};
use crate::utils::is_non_empty_dir;
use anyhow::{Context, Result};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const STORE_FILE: &str = "embeddings.db";
const METADATA_FILE: &str = "metadata.json";
const CREATED_AT_KEY: &str = "created_at";

/// Configuration for HNSW index
#[derive(Debug, Clone)]
pub struct HnswConfig {
    /// Maximum number of connections per layer (default: 16)
    pub max_connections: usize,
    /// Size of the dynamic candidate list (default: 200)
    pub ef_construction: usize,
    /// Maximum number of layers (default: 16)
    pub max_layers: u8,
    /// Lower bound of the search candidate list (default: 32)
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            max_connections: 16,
            ef_construction: 200,
            max_layers: 16,
            ef_search: 32,
        }
    }
}

/// Dense retriever using HNSW for approximate nearest neighbor search
pub struct HnswRetriever {
    /// HNSW graph, absent for an empty corpus
    hnsw: Option<Hnsw<'static, f32, DistCosine>>,
    /// Document vectors sorted by document id
    entries: Vec<(usize, Embedding)>,
    /// Corpus shared with the lexical index
    corpus: Arc<Corpus>,
    /// Embedder for query encoding
    embedder: Arc<dyn Embedder>,
    config: HnswConfig,
    /// Index metadata
    metadata: IndexMetadata,
}

impl HnswRetriever {
    /// Embed every corpus document and build a fresh index
    pub fn build(corpus: Arc<Corpus>, embedder: Arc<dyn Embedder>, config: HnswConfig) -> Result<Self> {
        tracing::info!(
            "Embedding {} documents with {}",
            corpus.len(),
            embedder.model_name()
        );

        let embeddings = if corpus.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<&str> = corpus.iter().map(|d| d.content.as_str()).collect();
            embedder
                .embed_batch(&texts)
                .context("Failed to embed corpus documents")?
        };

        if embeddings.len() != corpus.len() {
            anyhow::bail!(
                "Document count ({}) doesn't match embedding count ({})",
                corpus.len(),
                embeddings.len()
            );
        }

        let entries = corpus.iter().map(|d| d.id).zip(embeddings).collect();
        let metadata = IndexMetadata {
            model_name: embedder.model_name().to_string(),
            dimension: 0,
            num_documents: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        Self::from_entries(entries, corpus, embedder, config, metadata)
    }

    /// Assemble the index from stored vectors
    fn from_entries(
        mut entries: Vec<(usize, Embedding)>,
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        config: HnswConfig,
        mut metadata: IndexMetadata,
    ) -> Result<Self> {
        let before = entries.len();
        entries.retain(|(doc_id, _)| corpus.get(*doc_id).is_some());
        if entries.len() < before {
            tracing::warn!(
                "Dropped {} stored vectors with no matching corpus document",
                before - entries.len()
            );
        }
        entries.sort_by_key(|(doc_id, _)| *doc_id);
        entries.dedup_by_key(|(doc_id, _)| *doc_id);

        let dimension = entries.first().map(|(_, e)| e.len()).unwrap_or(0);
        if entries.iter().any(|(_, e)| e.len() != dimension) {
            anyhow::bail!("Stored vectors have inconsistent dimensions");
        }

        let hnsw = if entries.is_empty() {
            None
        } else {
            tracing::debug!(
                "Building HNSW index: {} documents, {} dimensions",
                entries.len(),
                dimension
            );

            let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
                config.max_connections,
                entries.len(),
                config.max_layers as usize,
                config.ef_construction,
                DistCosine,
            );
            for (doc_id, embedding) in &entries {
                hnsw.insert((embedding.as_slice(), *doc_id));
            }
            hnsw.set_searching_mode(true);
            Some(hnsw)
        };

        metadata.dimension = dimension;
        metadata.num_documents = entries.len();

        Ok(Self {
            hnsw,
            entries,
            corpus,
            embedder,
            config,
            metadata,
        })
    }

    /// Save vectors and metadata to `index_dir`.
    ///
    /// Both files are written into a staging directory that is renamed into
    /// place, so `index_dir` is either complete or absent.
    pub fn save(&self, index_dir: &Path) -> Result<()> {
        let staging = staging_dir(index_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging)
                .with_context(|| format!("Failed to clear staging directory {:?}", staging))?;
        }
        fs::create_dir_all(&staging).context("Failed to create index directory")?;

        {
            let mut store = EmbeddingStore::open(&staging.join(STORE_FILE), &self.metadata.model_name)?;
            store.put_all(&self.entries)?;
            store.set_metadata(CREATED_AT_KEY, &self.metadata.created_at)?;
        }

        let metadata_json = serde_json::to_string_pretty(&self.metadata)?;
        fs::write(staging.join(METADATA_FILE), metadata_json)?;

        if index_dir.exists() {
            fs::remove_dir_all(index_dir)
                .with_context(|| format!("Failed to replace {:?}", index_dir))?;
        }
        fs::rename(&staging, index_dir)
            .with_context(|| format!("Failed to move index into {:?}", index_dir))?;

        tracing::info!("Dense index saved to {:?} ({} vectors)", index_dir, self.entries.len());
        Ok(())
    }

    /// Open a persisted index. The embedder is only used for queries.
    pub fn load(
        index_dir: &Path,
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        config: HnswConfig,
    ) -> Result<Self> {
        tracing::info!("Loading dense index from {:?}", index_dir);

        let metadata_json = fs::read_to_string(index_dir.join(METADATA_FILE))
            .context("Failed to read metadata.json")?;
        let metadata: IndexMetadata = serde_json::from_str(&metadata_json)?;

        if embedder.model_name() != metadata.model_name {
            tracing::warn!(
                "Embedder model mismatch: index={}, embedder={}",
                metadata.model_name,
                embedder.model_name()
            );
        }

        let store = EmbeddingStore::open(&index_dir.join(STORE_FILE), &metadata.model_name)?;

        if store.get_metadata(CREATED_AT_KEY)?.as_deref() != Some(metadata.created_at.as_str()) {
            anyhow::bail!(
                "{:?} holds vectors and metadata from different builds; rebuild the index",
                index_dir
            );
        }
        let stored = store.count()?;
        if stored != metadata.num_documents {
            anyhow::bail!(
                "{:?} is incomplete ({} of {} vectors); rebuild the index",
                index_dir,
                stored,
                metadata.num_documents
            );
        }

        let entries = store.load_all()?;

        tracing::info!("Dense index loaded: {} vectors", entries.len());
        Self::from_entries(entries, corpus, embedder, config, metadata)
    }

    /// Open the persisted index when `index_dir` is non-empty, otherwise build and save it.
    ///
    /// A non-empty directory is trusted as-is; use [`HnswRetriever::rebuild`]
    /// after the corpus changes.
    pub fn build_or_load(
        index_dir: &Path,
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        config: HnswConfig,
    ) -> Result<Self> {
        if is_non_empty_dir(index_dir) {
            return Self::load(index_dir, corpus, embedder, config);
        }

        let retriever = Self::build(corpus, embedder, config)?;
        retriever.save(index_dir)?;
        Ok(retriever)
    }

    /// Discard any persisted index and build a fresh one
    pub fn rebuild(
        index_dir: &Path,
        corpus: Arc<Corpus>,
        embedder: Arc<dyn Embedder>,
        config: HnswConfig,
    ) -> Result<Self> {
        if index_dir.exists() {
            tracing::info!("Removing persisted dense index at {:?}", index_dir);
            fs::remove_dir_all(index_dir)
                .with_context(|| format!("Failed to remove {:?}", index_dir))?;
        }

        let retriever = Self::build(corpus, embedder, config)?;
        retriever.save(index_dir)?;
        Ok(retriever)
    }

    /// Get index metadata
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn vector(&self, doc_id: usize) -> Option<&Embedding> {
        self.entries
            .binary_search_by_key(&doc_id, |(id, _)| *id)
            .ok()
            .map(|idx| &self.entries[idx].1)
    }
}

/// Sibling directory an index is written into before it is moved into place
fn staging_dir(index_dir: &Path) -> PathBuf {
    let name = index_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index".to_string());
    index_dir.with_file_name(format!(".{}.partial", name))
}

impl Retriever for HnswRetriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let limit = clamp_top_k(top_k, self.len());
        let Some(hnsw) = self.hnsw.as_ref().filter(|_| limit > 0) else {
            return Ok(Vec::new());
        };

        let query_embedding = self.embedder.embed(query).context("Failed to embed query")?;
        if query_embedding.len() != self.metadata.dimension {
            anyhow::bail!(
                "Query embedding has {} dimensions, index has {}",
                query_embedding.len(),
                self.metadata.dimension
            );
        }
        if l2_norm(&query_embedding) == 0.0 {
            return Ok(Vec::new());
        }

        let neighbors: Vec<Neighbour> = hnsw.search(
            query_embedding.as_slice(),
            limit,
            self.config.ef_search.max(limit),
        );

        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in &neighbors {
            let doc_id = neighbor.d_id;
            let (Some(document), Some(vector)) = (self.corpus.get(doc_id), self.vector(doc_id)) else {
                continue;
            };

            results.push(SearchResult {
                doc_id,
                document: document.clone(),
                score: cosine_similarity(&query_embedding, vector),
                rank: 0,
            });
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        results.truncate(limit);
        assign_ranks(&mut results);

        Ok(results)
    }

    fn name(&self) -> &str {
        "hnsw"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawRecipe;
    use crate::embedding::{EmbeddingConfig, TokenEmbedder, DEFAULT_TOKEN_DIMENSION};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Token embedder that counts how often it is called
    struct CountingEmbedder {
        inner: TokenEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: TokenEmbedder::new(EmbeddingConfig::default(), DEFAULT_TOKEN_DIMENSION),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn model_name(&self) -> &str {
            self.inner.model_name()
        }
    }

    fn corpus() -> Arc<Corpus> {
        let records = ["Tomato Soup", "Chicken Pilaf", "Lentil Soup"]
            .iter()
            .map(|name| RawRecipe {
                name: Some(name.to_string()),
                ..Default::default()
            })
            .collect();
        Arc::new(Corpus::from_records(records, None))
    }

    #[test]
    fn test_hnsw_build_and_search() {
        let embedder = Arc::new(CountingEmbedder::new());
        let retriever = HnswRetriever::build(corpus(), embedder.clone(), HnswConfig::default()).unwrap();

        let results = retriever.retrieve("chicken pilaf", 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.title, "Chicken Pilaf");
        assert!(results[0].score >= results[1].score);
        assert_eq!(retriever.metadata().dimension, DEFAULT_TOKEN_DIMENSION);
    }

    #[test]
    fn test_hnsw_clamps_top_k() {
        let retriever =
            HnswRetriever::build(corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default()).unwrap();

        assert_eq!(retriever.retrieve("soup", 50).unwrap().len(), 3);
        assert_eq!(retriever.retrieve("soup", 0).unwrap().len(), 1);
    }

    #[test]
    fn test_hnsw_empty_corpus() {
        let embedder = Arc::new(CountingEmbedder::new());
        let retriever =
            HnswRetriever::build(Arc::new(Corpus::default()), embedder.clone(), HnswConfig::default()).unwrap();

        assert!(retriever.is_empty());
        assert!(retriever.retrieve("soup", 4).unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_hnsw_save_load_skips_embedding() {
        let temp_dir = tempdir().unwrap();
        let index_dir = temp_dir.path().join("dense");

        let first = Arc::new(CountingEmbedder::new());
        HnswRetriever::build_or_load(&index_dir, corpus(), first.clone(), HnswConfig::default()).unwrap();
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);

        let second = Arc::new(CountingEmbedder::new());
        let loaded =
            HnswRetriever::build_or_load(&index_dir, corpus(), second.clone(), HnswConfig::default()).unwrap();

        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        assert_eq!(loaded.metadata().num_documents, 3);
        assert_eq!(loaded.len(), 3);
    }

    #[test]
    fn test_rebuild_recomputes() {
        let temp_dir = tempdir().unwrap();
        let index_dir = temp_dir.path().join("dense");

        HnswRetriever::build_or_load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
            .unwrap();

        let embedder = Arc::new(CountingEmbedder::new());
        HnswRetriever::rebuild(&index_dir, corpus(), embedder.clone(), HnswConfig::default()).unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_drops_vectors_outside_corpus() {
        let temp_dir = tempdir().unwrap();
        let index_dir = temp_dir.path().join("dense");
        HnswRetriever::build_or_load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
            .unwrap();

        let smaller = Arc::new(Corpus::from_records(
            vec![RawRecipe {
                name: Some("Tomato Soup".to_string()),
                ..Default::default()
            }],
            None,
        ));
        let loaded =
            HnswRetriever::load(&index_dir, smaller, Arc::new(CountingEmbedder::new()), HnswConfig::default()).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.retrieve("soup", 5).unwrap().len(), 1);
    }

    #[test]
    fn test_save_leaves_no_staging_directory() {
        let temp_dir = tempdir().unwrap();
        let index_dir = temp_dir.path().join("dense");

        // Left over from an interrupted save
        let staging = staging_dir(&index_dir);
        fs::create_dir_all(&staging).unwrap();
        fs::write(staging.join(STORE_FILE), b"junk").unwrap();

        HnswRetriever::build_or_load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
            .unwrap();

        assert!(!staging.exists());
        assert!(index_dir.join(STORE_FILE).exists());
        assert!(index_dir.join(METADATA_FILE).exists());
    }

    #[test]
    fn test_load_rejects_mismatched_metadata() {
        let temp_dir = tempdir().unwrap();
        let index_dir = temp_dir.path().join("dense");
        let built =
            HnswRetriever::build_or_load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
                .unwrap();

        let mut metadata = built.metadata().clone();
        metadata.num_documents = 5;
        fs::write(index_dir.join(METADATA_FILE), serde_json::to_string(&metadata).unwrap()).unwrap();

        let err = HnswRetriever::load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("incomplete"));

        metadata.num_documents = 3;
        metadata.created_at = "2000-01-01T00:00:00+00:00".to_string();
        fs::write(index_dir.join(METADATA_FILE), serde_json::to_string(&metadata).unwrap()).unwrap();

        let err = HnswRetriever::load(&index_dir, corpus(), Arc::new(CountingEmbedder::new()), HnswConfig::default())
            .err()
            .unwrap();
        assert!(err.to_string().contains("different builds"));
    }
}
