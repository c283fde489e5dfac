mod helpers;

use helpers::{insert_memory, is_deleted, test_db, test_embedding, HashEmbedder};
use hippocampus::memory::forget::{forget, forget_matching, hard_delete};
use hippocampus::memory::search::{get_memory, recall};
use hippocampus::memory::stats::memory_stats;
use hippocampus::memory::store::remember;
use hippocampus::memory::types::{MemoryType, NewMemory, RecallStrategy};

#[test]
fn hybrid_recall_finds_stored_preference() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let new = NewMemory::new(
        "Oscar prefers wired home automation",
        MemoryType::Semantic,
        "user",
        0.8,
    )
    .unwrap();
    let stored = remember(&mut conn, &embedder, &new).unwrap();
    assert_eq!(stored.memory_type, "semantic");

    let results = recall(
        &conn,
        &embedder,
        "home automation preferences",
        RecallStrategy::Hybrid,
        10,
        0.7,
    )
    .unwrap();

    assert_eq!(results[0].memory.id, stored.id);
    assert!(results[0].score > 0.0);
    assert_eq!(results[0].memory.importance, 0.8);
}

#[test]
fn keyword_recall_uses_stemming() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let id = insert_memory(
        &mut conn,
        "The user prefers dark mode in every editor",
        MemoryType::Semantic,
        0.5,
        &test_embedding(3),
    );
    insert_memory(
        &mut conn,
        "Backups run nightly at two",
        MemoryType::Procedural,
        0.5,
        &test_embedding(4),
    );

    let results = recall(&conn, &embedder, "preferences", RecallStrategy::Keyword, 5, 0.7).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].memory.id, id);
    assert_eq!(results[0].score, 1.0);
}

#[test]
fn recall_records_access() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let new = NewMemory::new("The garden hose is in the shed", MemoryType::Semantic, "user", 0.5).unwrap();
    let id = remember(&mut conn, &embedder, &new).unwrap().id;

    let results = recall(&conn, &embedder, "garden hose", RecallStrategy::Hybrid, 5, 0.7).unwrap();
    assert_eq!(results[0].memory.access_count, 1);

    let memory = get_memory(&conn, &id).unwrap().unwrap();
    assert_eq!(memory.access_count, 1);
    assert!(memory.last_accessed.is_some());
}

#[test]
fn vector_recall_orders_by_similarity() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let near = remember(
        &mut conn,
        &embedder,
        &NewMemory::new("tomato seedlings in the greenhouse", MemoryType::Episodic, "user", 0.5).unwrap(),
    )
    .unwrap()
    .id;
    remember(
        &mut conn,
        &embedder,
        &NewMemory::new("quarterly tax filing reminder", MemoryType::Procedural, "user", 0.5).unwrap(),
    )
    .unwrap();

    let results = recall(
        &conn,
        &embedder,
        "greenhouse tomato seedlings",
        RecallStrategy::Vector,
        2,
        0.7,
    )
    .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].memory.id, near);
    assert!(results[0].score > results[1].score);
}

#[test]
fn forgotten_memories_leave_recall() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let id = remember(
        &mut conn,
        &embedder,
        &NewMemory::new("Parking spot is B12 on level two", MemoryType::Semantic, "user", 0.5).unwrap(),
    )
    .unwrap()
    .id;

    let result = forget(&mut conn, &id).unwrap();
    assert!(!result.hard_deleted);
    assert!(is_deleted(&conn, &id));

    let results = recall(&conn, &embedder, "parking spot", RecallStrategy::Hybrid, 5, 0.7).unwrap();
    assert!(results.iter().all(|r| r.memory.id != id));

    assert!(forget(&mut conn, "no-such-id").is_err());
}

#[test]
fn forget_by_query_hits_the_best_match() {
    let mut conn = test_db();
    let embedder = HashEmbedder::default();
    let tomato = remember(
        &mut conn,
        &embedder,
        &NewMemory::new("garden tomatoes need watering daily", MemoryType::Procedural, "user", 0.5).unwrap(),
    )
    .unwrap()
    .id;
    let backups = remember(
        &mut conn,
        &embedder,
        &NewMemory::new("database backups run nightly", MemoryType::Procedural, "user", 0.5).unwrap(),
    )
    .unwrap()
    .id;

    let forgotten = forget_matching(&mut conn, &embedder, "tomatoes watering", 1, 0.7).unwrap();
    assert_eq!(forgotten.len(), 1);
    assert_eq!(forgotten[0].id, tomato);
    assert!(is_deleted(&conn, &tomato));
    assert!(!is_deleted(&conn, &backups));
}

#[test]
fn hard_delete_removes_row_and_vector() {
    let mut conn = test_db();
    let id = insert_memory(&mut conn, "temporary note", MemoryType::Episodic, 0.2, &test_embedding(9));

    assert!(hard_delete(&mut conn, &id).unwrap());
    assert!(get_memory(&conn, &id).unwrap().is_none());
    let vectors: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories_vec WHERE id = ?1", [&id], |row| row.get(0))
        .unwrap();
    assert_eq!(vectors, 0);
    let fts: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories_fts WHERE memories_fts MATCH 'temporary'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(fts, 0);

    assert!(!hard_delete(&mut conn, &id).unwrap());
}

#[test]
fn stats_count_every_type() {
    let mut conn = test_db();
    insert_memory(&mut conn, "went hiking", MemoryType::Episodic, 0.5, &test_embedding(1));
    insert_memory(&mut conn, "water boils at 100C", MemoryType::Semantic, 0.5, &test_embedding(2));
    let gone = insert_memory(&mut conn, "old fact", MemoryType::Semantic, 0.5, &test_embedding(3));
    forget(&mut conn, &gone).unwrap();

    let stats = memory_stats(&conn, None).unwrap();
    assert_eq!(stats.total_active, 2);
    assert_eq!(stats.total_deleted, 1);
    assert_eq!(stats.with_embeddings, 2);
    assert_eq!(stats.by_type["episodic"], 1);
    assert_eq!(stats.by_type["semantic"], 1);
    assert_eq!(stats.by_type["procedural"], 0);
    assert_eq!(stats.db_size_bytes, 0);
}

#[test]
fn invalid_input_is_rejected_before_storage() {
    assert!(NewMemory::new("   ", MemoryType::Semantic, "user", 0.5).is_err());
    assert!(NewMemory::new("fine", MemoryType::Semantic, "user", 1.5).is_err());

    let mut conn = test_db();
    let new = NewMemory::new("short vector", MemoryType::Semantic, "user", 0.5).unwrap();
    let result = hippocampus::memory::store::store_memory(&mut conn, &new, &[1.0, 0.0]);
    assert!(result.is_err());
}
