use std::sync::Arc;

use pmset_core::common_tests::persistent_set_stress_tests::*;
use pmset_core::{ListConfig, PersistMode, PersistentList};
use rstest::rstest;
use serial_test::serial;
use tempfile::TempDir;

fn create_test_list(mode: PersistMode, capacity: usize) -> (TempDir, Arc<PersistentList>) {
    let dir = tempfile::tempdir().unwrap();
    let config = ListConfig {
        capacity,
        max_threads: 16,
        persist_mode: mode,
        ..ListConfig::new(dir.path().join("stress.pm"))
    };
    let list = PersistentList::create(config).unwrap();
    (dir, Arc::new(list))
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
#[serial(stress_tests)]
fn test_contains_while_modifying(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 16 * 1024);
    test_contains_during_modifications(list, 3000);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
#[serial(stress_tests)]
fn test_reclamation(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 16 * 1024);
    test_reclamation_under_churn(list);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
#[serial(stress_tests)]
fn test_size_accounting(#[case] mode: PersistMode) {
    let (_dir, list) = create_test_list(mode, 16 * 1024);
    test_concurrent_size_accounting(list);
}
