//! Corpus ingestion: batching, resume and the dimension guard.

mod common;

use std::sync::Arc;

use common::InMemoryIndex;
use counsel_core::Error;
use counsel_db::chunking::ChunkerConfig;
use counsel_inference::mock::MockInferenceBackend;
use counsel_rag::{CorpusDocument, CsvCorpusLoader, IngestPipeline};

const DIM: usize = 16;

fn corpus(rows: usize) -> Vec<CorpusDocument> {
    let mut csv = String::from("input,output\n");
    for i in 0..rows {
        csv.push_str(&format!("\"고민 {i}\",\"답변 {i}\"\n"));
    }
    CsvCorpusLoader::new("test_corpus")
        .load_reader(csv.as_bytes())
        .unwrap()
}

fn pipeline(backend: &MockInferenceBackend, index: &Arc<InMemoryIndex>) -> IngestPipeline {
    IngestPipeline::new(Arc::new(backend.clone()), index.clone())
        .with_source("test_corpus")
        .with_batch_size(2)
}

#[tokio::test]
async fn test_ingest_writes_every_chunk_in_batches() {
    let backend = MockInferenceBackend::new().with_dimension(DIM);
    let index = Arc::new(InMemoryIndex::new());

    let report = pipeline(&backend, &index).run(&corpus(5)).await.unwrap();

    assert_eq!(report.documents, 5);
    assert_eq!(report.chunks, 5);
    assert_eq!(report.batches_total, 3);
    assert_eq!(report.batches_skipped, 0);
    assert_eq!(report.chunks_written, 5);
    assert_eq!(index.len(), 5);
    assert_eq!(backend.embed_call_count(), 5);
}

#[tokio::test]
async fn test_long_rows_split_into_indexed_chunks() {
    let backend = MockInferenceBackend::new().with_dimension(DIM);
    let index = Arc::new(InMemoryIndex::new());
    let long = "마음이 답답해요 ".repeat(20);
    let docs = CsvCorpusLoader::new("test_corpus")
        .load_reader(format!("input,output\n\"{long}\",짧은 답변\n").as_bytes())
        .unwrap();

    let report = pipeline(&backend, &index)
        .with_chunker(ChunkerConfig {
            max_chunk_size: 60,
            min_chunk_size: 10,
            overlap: 0,
        })
        .run(&docs)
        .await
        .unwrap();

    assert!(report.chunks > 1);
    let rows = index.rows();
    assert!(rows.iter().all(|(row, _)| *row == 0));
    let indices: Vec<i32> = rows.iter().map(|(_, i)| *i).collect();
    assert_eq!(indices, (0..report.chunks as i32).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_interrupted_run_resumes_after_last_batch() {
    let backend = MockInferenceBackend::new().with_dimension(DIM);
    let index = Arc::new(InMemoryIndex::new());
    let docs = corpus(5);

    index.fail_on_insert_call(2);
    let err = pipeline(&backend, &index).run(&docs).await.unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
    assert_eq!(index.len(), 2);

    index.clear_failure();
    backend.clear_calls();
    let report = pipeline(&backend, &index).run(&docs).await.unwrap();

    assert_eq!(report.batches_skipped, 1);
    assert_eq!(report.chunks_written, 3);
    assert_eq!(index.len(), 5);
    // Only the remaining batches were embedded.
    assert_eq!(backend.embed_call_count(), 3);
}

#[tokio::test]
async fn test_completed_run_is_a_no_op() {
    let backend = MockInferenceBackend::new().with_dimension(DIM);
    let index = Arc::new(InMemoryIndex::new());
    let docs = corpus(4);

    pipeline(&backend, &index).run(&docs).await.unwrap();
    backend.clear_calls();
    let report = pipeline(&backend, &index).run(&docs).await.unwrap();

    assert_eq!(report.batches_skipped, report.batches_total);
    assert_eq!(report.chunks_written, 0);
    assert_eq!(backend.embed_call_count(), 0);
}

#[tokio::test]
async fn test_dimension_guard() {
    let index = Arc::new(InMemoryIndex::new());
    index.seed("existing", None, 0, 8);

    let backend = MockInferenceBackend::new().with_dimension(DIM);
    let err = pipeline(&backend, &index).run(&corpus(1)).await.unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("8-dimensional")));
    assert_eq!(backend.embed_call_count(), 0);
}

#[tokio::test]
async fn test_dimension_guard_on_empty_declared_index() {
    let index = Arc::new(InMemoryIndex::with_declared_dimension(1536));
    let backend = MockInferenceBackend::new().with_dimension(DIM);

    let err = pipeline(&backend, &index).run(&corpus(3)).await.unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("1536-dimensional")));
    assert_eq!(backend.embed_call_count(), 0);
    assert_eq!(index.len(), 0);
}

#[tokio::test]
async fn test_matching_declared_dimension_ingests() {
    let index = Arc::new(InMemoryIndex::with_declared_dimension(DIM));
    let backend = MockInferenceBackend::new().with_dimension(DIM);

    let report = pipeline(&backend, &index).run(&corpus(3)).await.unwrap();
    assert_eq!(report.chunks_written, 3);
    assert_eq!(index.len(), 3);
}

#[tokio::test]
async fn test_embedding_failure_propagates() {
    let backend = MockInferenceBackend::new()
        .with_dimension(DIM)
        .with_embedding_failure();
    let index = Arc::new(InMemoryIndex::new());

    let err = pipeline(&backend, &index).run(&corpus(2)).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert_eq!(index.len(), 0);
}
