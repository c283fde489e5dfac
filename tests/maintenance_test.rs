mod helpers;

use helpers::{
    backdate, insert_memory, is_deleted, similar_embedding, strength_of, test_db, test_embedding,
    HashEmbedder,
};
use hippocampus::config::HippocampusConfig;
use hippocampus::memory::associations::{association_stats, get_associations};
use hippocampus::memory::hierarchy::{build_hierarchy, hierarchy_stats, nodes_at_level, recall_adaptive};
use hippocampus::memory::maintenance::{apply_decay, cluster_memories, consolidate};
use hippocampus::memory::search::get_memory;
use hippocampus::memory::types::{DetailLevel, EdgeType, MemoryType};
use rusqlite::Connection;

fn count_by_source(conn: &Connection, source: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM memories WHERE source = ?1 AND is_deleted = 0",
        [source],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn consolidation_summarizes_a_cluster() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    let base = test_embedding(10);
    let members = vec![
        insert_memory(&mut conn, "watered the tomatoes", MemoryType::Episodic, 0.4, &base),
        insert_memory(
            &mut conn,
            "tomatoes need water every morning",
            MemoryType::Semantic,
            0.6,
            &similar_embedding(&base, 11),
        ),
        insert_memory(
            &mut conn,
            "tomato leaves curl when dry",
            MemoryType::Semantic,
            0.5,
            &similar_embedding(&base, 12),
        ),
    ];
    let outlier = insert_memory(&mut conn, "renewed the passport", MemoryType::Episodic, 0.5, &test_embedding(50));

    let result = consolidate(&mut conn, &HashEmbedder::default(), &config.maintenance, 1.0).unwrap();
    assert_eq!(result.clusters_found, 1);
    assert_eq!(result.summaries_created, 1);
    // every ordered pair of the three members
    assert_eq!(result.associations_created, 6);
    assert_eq!(result.decay.decayed + result.decay.deleted, 0);

    let summary_id: String = conn
        .query_row(
            "SELECT id FROM memories WHERE source = 'consolidation'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    let summary = get_memory(&conn, &summary_id).unwrap().unwrap();
    assert_eq!(summary.memory_type, MemoryType::Semantic);
    assert!(summary.content.starts_with("Consolidated from 3 memories"));
    assert!((summary.importance - 0.7).abs() < 1e-9);
    let summary_of = summary.metadata.unwrap()["summary_of"].as_array().unwrap().len();
    assert_eq!(summary_of, 3);

    assert!(get_associations(&conn, &outlier).unwrap().is_empty());
    for id in &members {
        let edges = get_associations(&conn, id).unwrap();
        assert_eq!(edges.len(), 4);
        assert!(edges.iter().all(|e| e.edge_type == EdgeType::Semantic && e.weight >= 0.1));
    }
}

#[test]
fn summaries_are_not_reclustered() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    let base = test_embedding(10);
    insert_memory(&mut conn, "first", MemoryType::Semantic, 0.5, &base);
    insert_memory(&mut conn, "second", MemoryType::Semantic, 0.5, &similar_embedding(&base, 11));

    let embedder = HashEmbedder::default();
    consolidate(&mut conn, &embedder, &config.maintenance, 1.0).unwrap();
    let again = consolidate(&mut conn, &embedder, &config.maintenance, 1.0).unwrap();

    // the pair clusters again, but the summary never joins it
    assert_eq!(again.clusters_found, 1);
    assert_eq!(again.associations_created, 0);
    let clusters = cluster_memories(&conn, 1.0, config.maintenance.cluster_threshold).unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].member_ids.len(), 2);
}

#[test]
fn decay_follows_memory_type() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    let episodic = insert_memory(&mut conn, "a concert", MemoryType::Episodic, 0.5, &test_embedding(1));
    let procedural = insert_memory(&mut conn, "how to bleed radiators", MemoryType::Procedural, 0.5, &test_embedding(2));
    let ancient = insert_memory(&mut conn, "a forgotten lunch", MemoryType::Episodic, 0.5, &test_embedding(3));
    backdate(&conn, &episodic, 10.0);
    backdate(&conn, &procedural, 10.0);
    backdate(&conn, &ancient, 40.0);

    let result = apply_decay(&mut conn, &config.maintenance).unwrap();
    assert_eq!(result.decayed, 2);
    assert_eq!(result.deleted, 1);

    assert!((strength_of(&conn, &episodic) - 0.92f64.powi(10)).abs() < 1e-3);
    assert!((strength_of(&conn, &procedural) - 0.99f64.powi(10)).abs() < 1e-3);
    assert!(is_deleted(&conn, &ancient));
    assert!(!is_deleted(&conn, &episodic));
}

fn seed_two_topics(conn: &mut Connection) {
    let garden = test_embedding(1);
    let travel = test_embedding(100);
    insert_memory(conn, "planted garlic", MemoryType::Episodic, 0.5, &garden);
    insert_memory(conn, "garlic needs a cold winter", MemoryType::Semantic, 0.5, &similar_embedding(&garden, 2));
    insert_memory(conn, "booked the ferry", MemoryType::Episodic, 0.5, &travel);
    insert_memory(conn, "ferries sell out in july", MemoryType::Semantic, 0.5, &similar_embedding(&travel, 101));
}

#[test]
fn hierarchy_groups_related_memories() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    seed_two_topics(&mut conn);

    let result = build_hierarchy(&mut conn, &config.hierarchy).unwrap();
    assert_eq!(result.by_level[&0], 4);
    assert_eq!(result.by_level[&1], 2);
    assert!(!result.by_level.contains_key(&2));
    assert_eq!(result.total_nodes, 6);

    let parents = nodes_at_level(&conn, 1).unwrap();
    let leaves = nodes_at_level(&conn, 0).unwrap();
    assert!(leaves.iter().all(|n| n.parent_id.is_some()));
    for parent in &parents {
        let children = leaves.iter().filter(|n| n.parent_id == Some(parent.id)).count();
        assert_eq!(children, 2);
        let summary = get_memory(&conn, &parent.memory_id).unwrap().unwrap();
        assert_eq!(summary.source, "hierarchy");
        assert!(summary.content.starts_with("[topic]"));
    }

    let stats = hierarchy_stats(&conn).unwrap();
    assert_eq!(stats.total_nodes, 6);
    assert_eq!(stats.root_summaries, 2);
}

#[test]
fn hierarchy_rebuild_replaces_old_summaries() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    seed_two_topics(&mut conn);

    let first = build_hierarchy(&mut conn, &config.hierarchy).unwrap();
    let second = build_hierarchy(&mut conn, &config.hierarchy).unwrap();
    assert_eq!(first.by_level, second.by_level);
    assert_eq!(count_by_source(&conn, "hierarchy"), 2);

    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))
        .unwrap();
    assert_eq!(total, 6);
}

#[test]
fn adaptive_recall_falls_back_on_empty_levels() {
    let mut conn = test_db();
    let config = HippocampusConfig::default();
    seed_two_topics(&mut conn);
    build_hierarchy(&mut conn, &config.hierarchy).unwrap();
    let embedder = HashEmbedder::default();

    let topics = recall_adaptive(&conn, &embedder, "garlic", DetailLevel::Level(1), 5, 0.7).unwrap();
    assert_eq!(topics.level, 1);
    assert!(!topics.fell_back);
    assert_eq!(topics.results.len(), 2);
    assert!(topics.results.iter().all(|r| r.memory.source == "hierarchy"));

    let broad = recall_adaptive(&conn, &embedder, "garlic", DetailLevel::Broad, 5, 0.7).unwrap();
    assert_eq!(broad.level, 2);
    assert!(broad.fell_back);
    assert!(broad.results.iter().any(|r| r.memory.content.contains("garlic")));
}

#[test]
fn stats_survive_an_empty_store() {
    let conn = test_db();
    let stats = hierarchy_stats(&conn).unwrap();
    assert_eq!(stats.total_nodes, 0);
    assert_eq!(association_stats(&conn).unwrap().total_edges, 0);
}
