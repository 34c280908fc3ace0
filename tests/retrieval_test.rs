//! Retrieval-layer integration tests: index build round trips and the
//! candidate-set contracts shared by both strategies.

mod common;

use common::{record, StubEmbedder};
use toolrec::index::{load_vector_index, save_vector_index, VectorIndex};
use toolrec::retrieval::{lexical_candidates, vector_candidates};
use toolrec::Catalog;
use toolrec::TextEmbedder;

fn sample_catalog() -> Catalog {
    Catalog::from_records(vec![
        record(
            "NoteApp",
            "productivity",
            "note taking app",
            "https://noteapp.example",
            &["notes", "writing"],
        ),
        record(
            "ClipCut",
            "video",
            "simple video editor",
            "https://clipcut.example",
            &["video", "editing"],
        ),
        record(
            "SheetWise",
            "spreadsheets",
            "collaborative spreadsheets",
            "https://sheetwise.example",
            &["tables", "finance"],
        ),
    ])
    .unwrap()
}

// ============================================================================
// Index build + round-trip recall
// ============================================================================

#[test]
fn test_build_mapping_length_equals_catalog_size() {
    let catalog = sample_catalog();
    let embedder = StubEmbedder::new(16);

    let first = VectorIndex::build(&catalog, &embedder).unwrap();
    let second = VectorIndex::build(&catalog, &embedder).unwrap();

    assert_eq!(first.names.len(), catalog.len());
    assert_eq!(second.names.len(), catalog.len());
    assert_eq!(first.names, second.names);
}

#[test]
fn test_own_canonical_text_is_nearest_neighbor() {
    let catalog = sample_catalog();
    let embedder = StubEmbedder::new(16);
    let vector_index = VectorIndex::build(&catalog, &embedder).unwrap();

    for (row, tool) in catalog.all().iter().enumerate() {
        let query = embedder
            .embed(&[tool.canonical_text()])
            .unwrap();
        let query_vec: Vec<f32> = query.row(0).iter().copied().collect();

        let hits = vector_index.index.search(&query_vec, 1).unwrap();
        assert_eq!(hits[0].0, row, "record {} should be its own nearest", tool.name);
        assert!(hits[0].1 < 1e-6, "self-distance should be ~0");
    }
}

#[test]
fn test_artifacts_round_trip_through_disk() {
    let catalog = sample_catalog();
    let embedder = StubEmbedder::new(8);
    let built = VectorIndex::build(&catalog, &embedder).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let index_path = dir.path().join("tools.index");
    let mapping_path = dir.path().join("index_to_name.json");

    save_vector_index(&built, &index_path, &mapping_path).unwrap();
    let loaded = load_vector_index(&index_path, &mapping_path).unwrap();

    assert_eq!(loaded.names, built.names);
    assert_eq!(loaded.index.rows(), built.index.rows());
    assert_eq!(loaded.index.dim(), built.index.dim());

    // The reloaded pair answers queries identically.
    let query = embedder.embed(&["note taking".to_string()]).unwrap();
    let query_vec: Vec<f32> = query.row(0).iter().copied().collect();
    assert_eq!(
        built.index.search(&query_vec, 3).unwrap(),
        loaded.index.search(&query_vec, 3).unwrap()
    );
}

// ============================================================================
// Candidate-set bounds
// ============================================================================

#[test]
fn test_vector_retrieval_never_exceeds_k_or_catalog_size() {
    let catalog = sample_catalog();
    let embedder = StubEmbedder::new(16);
    let vector_index = VectorIndex::build(&catalog, &embedder).unwrap();

    let two = vector_candidates(&catalog, &vector_index, &embedder, "video editing", 2).unwrap();
    assert!(two.len() <= 2);

    let many = vector_candidates(&catalog, &vector_index, &embedder, "video editing", 50).unwrap();
    assert_eq!(many.len(), catalog.len());
}

#[test]
fn test_vector_retrieval_drops_rows_missing_from_catalog() {
    let full = sample_catalog();
    let embedder = StubEmbedder::new(16);
    let vector_index = VectorIndex::build(&full, &embedder).unwrap();

    // Catalog drifted: one tool was removed after the index was built.
    let drifted = Catalog::from_records(vec![
        record("NoteApp", "productivity", "note taking app", "", &[]),
        record("ClipCut", "video", "simple video editor", "", &[]),
    ])
    .unwrap();

    let candidates =
        vector_candidates(&drifted, &vector_index, &embedder, "anything", 10).unwrap();
    assert_eq!(candidates.len(), 2);
    assert!(candidates.iter().all(|c| c.name != "SheetWise"));
}

#[test]
fn test_lexical_retrieval_never_exceeds_three() {
    let records = (0..10)
        .map(|i| record(&format!("Tool{}", i), "video", "", "", &[]))
        .collect();
    let catalog = Catalog::from_records(records).unwrap();

    assert_eq!(lexical_candidates(&catalog, "video").len(), 3);
}
