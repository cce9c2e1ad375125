//! Counseling corpus ingestion.
//!
//! Rows of a CSV corpus become documents, documents are chunked, and chunks
//! are embedded and written in fixed-size batches. Each batch commits on its
//! own, so an interrupted run resumes after the last complete batch: the number
//! of chunks already stored for the source, divided by the batch size, is the
//! number of batches to skip. Resuming therefore assumes the same corpus file
//! and batch size as the interrupted run.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use counsel_core::{
    defaults, CounselIndex, EmbeddingBackend, Error, NewCounselChunk, Result,
};
use counsel_db::chunking::{Chunker, ChunkerConfig, RecursiveChunker};

/// Column holding the counselor's reply.
pub const OUTPUT_COLUMN: &str = "output";

/// One corpus row.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusDocument {
    pub row: i64,
    /// `"column: value"` lines for every column.
    pub content: String,
    pub output: Option<String>,
    /// Every column plus `source` and `row`.
    pub metadata: JsonValue,
}

/// Reads a CSV corpus into [`CorpusDocument`]s.
pub struct CsvCorpusLoader {
    source: String,
}

impl CsvCorpusLoader {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<CorpusDocument>> {
        let file = std::fs::File::open(path)?;
        self.load_reader(file)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<Vec<CorpusDocument>> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers = csv
            .headers()
            .map_err(|e| Error::InvalidInput(format!("Unreadable corpus header: {e}")))?
            .clone();

        let mut docs = Vec::new();
        for (row, record) in csv.records().enumerate() {
            let record =
                record.map_err(|e| Error::InvalidInput(format!("Malformed corpus row {row}: {e}")))?;

            let mut lines = Vec::with_capacity(headers.len());
            let mut metadata = Map::new();
            let mut output = None;

            for (column, value) in headers.iter().zip(record.iter()) {
                let value = value.trim();
                lines.push(format!("{column}: {value}"));
                metadata.insert(column.to_string(), JsonValue::String(value.to_string()));
                if column == OUTPUT_COLUMN && !value.is_empty() {
                    output = Some(value.to_string());
                }
            }
            metadata.insert("source".to_string(), JsonValue::String(self.source.clone()));
            metadata.insert("row".to_string(), JsonValue::from(row as i64));

            docs.push(CorpusDocument {
                row: row as i64,
                content: lines.join("\n"),
                output,
                metadata: JsonValue::Object(metadata),
            });
        }
        Ok(docs)
    }
}

/// A chunk waiting for its embedding.
#[derive(Debug, Clone)]
pub struct PendingChunk {
    pub row: i64,
    pub chunk_index: i32,
    pub content: String,
    pub output: Option<String>,
    pub metadata: JsonValue,
}

/// Totals for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub batches_total: usize,
    pub batches_skipped: usize,
    pub chunks_written: usize,
}

/// Chunk, embed and store a corpus in resumable batches.
pub struct IngestPipeline {
    embedder: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn CounselIndex>,
    chunker: RecursiveChunker,
    batch_size: usize,
    source: String,
}

impl IngestPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingBackend>, index: Arc<dyn CounselIndex>) -> Self {
        Self {
            embedder,
            index,
            chunker: RecursiveChunker::new(ChunkerConfig::default()),
            batch_size: defaults::INGEST_BATCH_SIZE,
            source: defaults::INGEST_SOURCE.to_string(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_chunker(mut self, config: ChunkerConfig) -> Self {
        self.chunker = RecursiveChunker::new(config);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Split every document into chunks, in corpus order.
    pub fn chunk_documents(&self, docs: &[CorpusDocument]) -> Vec<PendingChunk> {
        docs.iter()
            .flat_map(|doc| {
                self.chunker
                    .chunk(&doc.content)
                    .into_iter()
                    .map(move |chunk| PendingChunk {
                        row: doc.row,
                        chunk_index: chunk.index as i32,
                        content: chunk.text,
                        output: doc.output.clone(),
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }

    /// Dimension every embedding must have. Fails before any embedding call
    /// when the index accepts a different length than the backend produces.
    pub async fn check_dimension(&self) -> Result<usize> {
        let produced = self.embedder.dimension();
        match self.index.index_dimension().await? {
            Some(accepted) if accepted != produced => Err(Error::Config(format!(
                "Index accepts {accepted}-dimensional vectors but {} produces {produced}",
                self.embedder.model_name()
            ))),
            Some(accepted) => Ok(accepted),
            None => Ok(produced),
        }
    }

    pub async fn run(&self, docs: &[CorpusDocument]) -> Result<IngestReport> {
        let start = Instant::now();
        let dimension = self.check_dimension().await?;

        let chunks = self.chunk_documents(docs);
        let batches_total = chunks.len().div_ceil(self.batch_size);
        let stored = self.index.count_for_source(&self.source).await?.max(0) as usize;
        let batches_skipped = (stored / self.batch_size).min(batches_total);

        info!(
            subsystem = "rag",
            component = "ingest",
            source = %self.source,
            input_count = docs.len(),
            chunk_count = chunks.len(),
            batches_total,
            batches_skipped,
            "Starting ingestion"
        );

        let mut report = IngestReport {
            documents: docs.len(),
            chunks: chunks.len(),
            batches_total,
            batches_skipped,
            chunks_written: 0,
        };

        for (batch_no, batch) in chunks
            .chunks(self.batch_size)
            .enumerate()
            .skip(batches_skipped)
        {
            let batch_start = Instant::now();
            let written = self.ingest_batch(batch, dimension).await?;
            report.chunks_written += written;
            info!(
                batch = batch_no + 1,
                batches_total,
                chunk_count = written,
                duration_ms = batch_start.elapsed().as_millis() as u64,
                "Committed batch"
            );
        }

        info!(
            chunks_written = report.chunks_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "Ingestion complete"
        );
        Ok(report)
    }

    async fn ingest_batch(&self, batch: &[PendingChunk], dimension: usize) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let rows = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, embedding)| {
                let actual = embedding.as_slice().len();
                if actual != dimension {
                    return Err(Error::Embedding(format!(
                        "Embedding dimension {actual} does not match index dimension {dimension}"
                    )));
                }
                Ok(NewCounselChunk {
                    source: self.source.clone(),
                    row: chunk.row,
                    chunk_index: chunk.chunk_index,
                    content: chunk.content.clone(),
                    output: chunk.output.clone(),
                    metadata: chunk.metadata.clone(),
                    embedding,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(chunk_count = rows.len(), "Embedded batch");
        self.index.insert_chunks(rows).await
    }
}
