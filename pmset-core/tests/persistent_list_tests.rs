use std::sync::Arc;

use pmset_core::common_tests::persistent_set_core_tests::*;
use pmset_core::{ListConfig, PersistMode, PersistentList};
use rstest::rstest;
use tempfile::TempDir;

// Helper function to create a fresh list backed by its own temporary file
fn create_test_list(mode: PersistMode, capacity: usize) -> (TempDir, PersistentList) {
    let dir = tempfile::tempdir().unwrap();
    let config = ListConfig {
        capacity,
        max_threads: 8,
        persist_mode: mode,
        ..ListConfig::new(dir.path().join("set.pm"))
    };
    let list = PersistentList::create(config).unwrap();
    (dir, list)
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_basic(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 1024);
    test_basic_operations(&list);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_extreme(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 1024);
    test_extreme_keys(&list);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_reuse(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 256);
    test_slots_are_reused(&list);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_concurrent(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 1024);
    test_concurrent_inserts(Arc::new(list));
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_same_key_insert(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 1024);
    test_concurrent_same_key_insert(Arc::new(list));
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_same_key_remove(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 1024);
    test_concurrent_same_key_remove(Arc::new(list));
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_concurrent_mixed(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 8 * 1024);
    test_concurrent_mixed_operations(Arc::new(list));
}

#[test]
fn test_empty_list() {
    let (_dir, list) = create_test_list(PersistMode::Adr, 64);
    let mut ctx = list.register(3).unwrap();

    assert_eq!(list.size(), 0);
    assert!(!ctx.contains(1));
    assert!(!ctx.remove(1).is_removed());
    assert!(ctx.to_vec().is_empty());
}

#[test]
#[should_panic(expected = "reserved for a sentinel")]
fn test_min_sentinel_key_is_rejected() {
    let (_dir, list) = create_test_list(PersistMode::Adr, 64);
    list.register(0).unwrap().insert(i64::MIN);
}

#[test]
#[should_panic(expected = "reserved for a sentinel")]
fn test_max_sentinel_key_is_rejected() {
    let (_dir, list) = create_test_list(PersistMode::Eadr, 64);
    list.register(0).unwrap().contains(i64::MAX);
}

#[test]
fn test_stats() {
    let (_dir, list) = create_test_list(PersistMode::Adr, 128);
    let mut ctx = list.register(0).unwrap();
    for key in 0..10 {
        ctx.insert(key);
    }

    let stats = list.stats();
    assert_eq!(stats.size, 10);
    assert_eq!(stats.capacity, 128);
    assert_eq!(stats.free_slots, 128 - 2 - 10);
    assert_eq!(stats.orphaned_retirements, 0);
}
