mod helpers;

use helpers::{insert_memory, test_db, test_embedding};
use hippocampus::config::SharingConfig;
use hippocampus::memory::forget::forget;
use hippocampus::memory::sharing::{
    approve_share, get_shared, revoke_share, share_memory, sharing_stats, RevokeTarget,
    ShareDirection,
};
use hippocampus::memory::types::MemoryType;

#[test]
fn share_approve_revoke_lifecycle() {
    let mut conn = test_db();
    let config = SharingConfig::default();
    let id = insert_memory(
        &mut conn,
        "restart the router by holding reset for ten seconds",
        MemoryType::Procedural,
        0.0,
        &test_embedding(1),
    );

    let share_id = share_memory(&conn, &id, "scout", "planner", config.threshold, &config)
        .unwrap()
        .expect("procedural memory with no importance passes the gate");

    let pending = get_shared(&conn, Some("planner"), ShareDirection::To).unwrap();
    assert_eq!(pending.len(), 1);
    assert!(!pending[0].fully_consented);
    assert_eq!(pending[0].share.shared_by, "scout");
    assert!(pending[0].content.contains("router"));
    assert_eq!(sharing_stats(&conn).unwrap().pending, 1);

    assert!(approve_share(&conn, &share_id).unwrap());
    let approved = get_shared(&conn, Some("scout"), ShareDirection::From).unwrap();
    assert!(approved[0].fully_consented);
    assert!(get_shared(&conn, Some("scout"), ShareDirection::To).unwrap().is_empty());

    assert_eq!(revoke_share(&conn, &RevokeTarget::Memory(id.clone())).unwrap(), 1);
    assert!(get_shared(&conn, None, ShareDirection::Both).unwrap().is_empty());
    assert!(!approve_share(&conn, &share_id).unwrap());

    let stats = sharing_stats(&conn).unwrap();
    assert_eq!(stats.active, 0);
    assert_eq!(stats.revoked, 1);
}

#[test]
fn private_and_sensitive_memories_stay_home() {
    let mut conn = test_db();
    let config = SharingConfig::default();
    let episodic = insert_memory(&mut conn, "dinner with my sister", MemoryType::Episodic, 0.1, &test_embedding(1));
    let important = insert_memory(&mut conn, "the home network password rotates monthly", MemoryType::Semantic, 1.0, &test_embedding(2));

    assert!(share_memory(&conn, &episodic, "scout", "planner", 1.0, &config)
        .unwrap()
        .is_none());
    // 0.3 * (0.5 + 1.0 * 0.5) = 0.3
    assert!(share_memory(&conn, &important, "scout", "planner", 0.3, &config)
        .unwrap()
        .is_none());
    assert!(share_memory(&conn, &important, "scout", "planner", 0.5, &config)
        .unwrap()
        .is_some());

    assert!(share_memory(&conn, "missing", "scout", "planner", 0.5, &config).is_err());
}

#[test]
fn forgotten_memories_drop_out_of_shares() {
    let mut conn = test_db();
    let config = SharingConfig::default();
    let id = insert_memory(&mut conn, "the shed key hangs by the door", MemoryType::Semantic, 0.2, &test_embedding(1));
    share_memory(&conn, &id, "scout", "planner", 0.5, &config)
        .unwrap()
        .unwrap();

    forget(&mut conn, &id).unwrap();
    assert!(get_shared(&conn, Some("planner"), ShareDirection::Both).unwrap().is_empty());
    assert!(share_memory(&conn, &id, "scout", "planner", 0.5, &config).is_err());
}
