use super::*;
use crate::corpus::Corpus;
use crate::embeddings::{EmbeddingProvider, HashEmbedder};
use tempfile::TempDir;

const CORPUS: &str = r#"{"sites": [
    {"id": "a", "name": "Castle", "category": "Cultural", "search_text": "castle fortress medieval"},
    {"id": "b", "name": "Reef", "category": "Natural", "search_text": "coral reef marine"}
]}"#;

fn populated_cache(temp_dir: &TempDir) -> (CacheManager, Corpus, HashEmbedder) {
    let corpus = Corpus::from_json_str(CORPUS, None).expect("should parse corpus");
    let embedder = HashEmbedder::new(32, 1);
    let cache = CacheManager::new(temp_dir.path(), "sites");

    cache.store_records(&corpus).expect("should store records");
    let (matrix, _) = cache
        .load_or_build_embeddings(&corpus, &embedder, false)
        .expect("should build embeddings");
    cache
        .load_or_build_index(&matrix, true)
        .expect("should build index");

    (cache, corpus, embedder)
}

#[test]
fn empty_cache_reports_missing_artifacts() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let cache = CacheManager::new(temp_dir.path(), "sites");

    let report = cache.check_consistency(2, None);
    assert!(!report.is_consistent);
    assert_eq!(report.missing_artifacts(), 3);
    assert_eq!(report.total_issues(), 3);
    assert!(report.cached_records.is_none());
    assert!(report.summary().contains("3 artifacts missing"));
}

#[test]
fn populated_cache_is_consistent() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (cache, corpus, embedder) = populated_cache(&temp_dir);

    let report = cache.check_consistency(corpus.len(), Some(embedder.model_id()));
    assert!(report.is_consistent, "unexpected issues: {:?}", report.issues);
    assert_eq!(report.cached_records, Some(2));
    assert_eq!(report.embedding_rows, Some(2));
    assert_eq!(report.embedding_dimension, Some(32));
    assert_eq!(report.embedding_model.as_deref(), Some("hash-32-1"));
    assert_eq!(report.index_vectors, Some(2));
    assert_eq!(report.index_dimension, Some(32));
    assert_eq!(
        report.summary(),
        "Cache is consistent: 2 records, 2 embeddings, 2 indexed vectors"
    );
}

#[test]
fn grown_corpus_is_flagged() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (cache, _, _) = populated_cache(&temp_dir);

    let report = cache.check_consistency(3, None);
    assert!(!report.is_consistent);
    assert!(report.issues.contains(&ConsistencyIssue::RecordCountMismatch {
        cached: 2,
        current: 3
    }));
    assert!(report.issues.contains(&ConsistencyIssue::EmbeddingCountMismatch {
        rows: 2,
        records: 3
    }));
}

#[test]
fn model_change_is_flagged() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (cache, corpus, _) = populated_cache(&temp_dir);

    let report = cache.check_consistency(corpus.len(), Some("ollama:nomic-embed-text"));
    assert_eq!(
        report.issues,
        vec![ConsistencyIssue::ModelMismatch {
            cached: "hash-32-1".to_string(),
            expected: "ollama:nomic-embed-text".to_string(),
        }]
    );
}

#[test]
fn corrupt_index_is_unreadable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let (cache, corpus, _) = populated_cache(&temp_dir);
    std::fs::write(cache.index_path(), b"garbage").expect("should overwrite index");

    let report = cache.check_consistency(corpus.len(), None);
    assert_eq!(report.total_issues(), 1);
    assert!(matches!(
        report.issues.first(),
        Some(ConsistencyIssue::UnreadableArtifact { artifact: "index", .. })
    ));
    assert!(report.index_vectors.is_none());
}

#[test]
fn issue_display_is_readable() {
    let issue = ConsistencyIssue::IndexCountMismatch {
        vectors: 4,
        rows: 5,
    };
    assert_eq!(issue.to_string(), "index has 4 vectors for 5 embedding rows");
    assert_eq!(
        ConsistencyIssue::MissingArtifact("embeddings").to_string(),
        "embeddings is missing"
    );
}
