//! Sparse retrieval using BM25
//!
//! Full-text search via an in-memory tantivy index over recipe content.

use crate::data::Corpus;
use crate::retrieval::{assign_ranks, clamp_top_k, IndexMetadata, Retriever, SearchResult};
use anyhow::Result;
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy};

/// Writer heap for the one-shot corpus build
const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Sparse retriever using BM25 for keyword search
pub struct Bm25Retriever {
    /// Tantivy index
    index: Index,
    /// Tantivy reader
    reader: IndexReader,
    /// Content field
    content_field: Field,
    /// Document ID field
    doc_id_field: Field,
    /// Corpus shared with the dense index
    corpus: Arc<Corpus>,
    /// Index metadata
    metadata: IndexMetadata,
}

impl Bm25Retriever {
    /// Build a BM25 index over the corpus. An empty corpus yields an empty index.
    pub fn build(corpus: Arc<Corpus>) -> Result<Self> {
        tracing::info!("Building BM25 index: {} documents", corpus.len());

        let mut schema_builder = Schema::builder();
        let doc_id_field = schema_builder.add_u64_field("doc_id", STORED);
        let content_field = schema_builder.add_text_field("content", TEXT);
        let schema = schema_builder.build();

        let index = Index::create_in_ram(schema);

        // A single indexing thread keeps one segment in corpus order
        let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        for document in corpus.iter() {
            index_writer.add_document(doc!(
                doc_id_field => document.id as u64,
                content_field => document.content.clone(),
            ))?;
        }
        index_writer.commit()?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        let metadata = IndexMetadata {
            model_name: "bm25".to_string(),
            dimension: 0, // N/A for sparse retrieval
            num_documents: corpus.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!("BM25 index built successfully");

        Ok(Self {
            index,
            reader,
            content_field,
            doc_id_field,
            corpus,
            metadata,
        })
    }

    /// Get index metadata
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }
}

/// Reduce free text to plain lower-case terms so no query syntax reaches the parser
fn query_terms(query: &str) -> String {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl Retriever for Bm25Retriever {
    fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        let limit = clamp_top_k(top_k, self.corpus.len());
        let terms = query_terms(query);
        if limit == 0 || terms.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser = QueryParser::for_index(&self.index, vec![self.content_field]);

        let (parsed, errors) = query_parser.parse_query_lenient(&terms);
        if !errors.is_empty() {
            tracing::debug!("Lenient BM25 parse dropped {} fragments of {:?}", errors.len(), query);
        }

        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let retrieved_doc: TantivyDocument = searcher.doc(doc_address)?;

            let doc_id = retrieved_doc
                .get_first(self.doc_id_field)
                .and_then(|value| value.as_u64());

            if let Some(document) = doc_id.and_then(|id| self.corpus.get(id as usize)) {
                results.push(SearchResult {
                    doc_id: document.id,
                    document: document.clone(),
                    score,
                    rank: 0,
                });
            }
        }

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        assign_ranks(&mut results);

        Ok(results)
    }

    fn name(&self) -> &str {
        "bm25"
    }
}
