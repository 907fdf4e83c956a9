use pmset_core::{ListConfig, ListError, PersistMode, PersistentList, PriorState};
use rstest::rstest;

fn config(path: &std::path::Path, mode: PersistMode) -> ListConfig {
    ListConfig {
        capacity: 512,
        max_threads: 4,
        persist_mode: mode,
        ..ListConfig::new(path)
    }
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_contents_survive_destroy_and_reopen(#[case] mode: PersistMode) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("set.pm");

    let list = PersistentList::create(config(&path, mode)).unwrap();
    assert_eq!(list.recovery().prior_state, PriorState::NoPriorState);
    {
        let mut ctx = list.register(0).unwrap();
        for key in [5, 3, 8, -20, 100] {
            assert!(ctx.insert(key).is_inserted());
        }
        assert!(ctx.remove(3).is_removed());
    }
    list.destroy().unwrap();

    let list = PersistentList::create(config(&path, mode)).unwrap();
    assert_eq!(list.recovery().prior_state, PriorState::PriorStateFound);
    assert_eq!(list.size(), 4);

    let mut ctx = list.register(1).unwrap();
    assert_eq!(ctx.to_vec(), vec![-20, 5, 8, 100]);

    // The recovered instance keeps working.
    assert!(ctx.insert(3).is_inserted());
    assert!(!ctx.insert(8).is_inserted());
    assert_eq!(list.size(), 5);
}

#[rstest]
#[case::adr(PersistMode::Adr)]
#[case::eadr(PersistMode::Eadr)]
fn test_contents_survive_drop_without_destroy(#[case] mode: PersistMode) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("set.pm");

    {
        let list = PersistentList::create(config(&path, mode)).unwrap();
        let mut ctx = list.register(2).unwrap();
        for key in 0..100 {
            ctx.insert(key);
        }
        for key in (0..100).step_by(2) {
            ctx.remove(key);
        }
    }

    let list = PersistentList::create(config(&path, mode)).unwrap();
    let expected: Vec<i64> = (0..100).filter(|key| key % 2 == 1).collect();

    assert_eq!(list.recovery().live_nodes, 50);
    assert_eq!(list.register(0).unwrap().to_vec(), expected);
    // Retired but unreclaimed slots come back free.
    assert_eq!(list.stats().free_slots, 512 - 2 - 50);
}

#[test]
fn test_reopen_with_other_geometry_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("set.pm");

    PersistentList::create(config(&path, PersistMode::Adr))
        .unwrap()
        .destroy()
        .unwrap();

    let bigger = ListConfig {
        capacity: 1024,
        ..config(&path, PersistMode::Adr)
    };
    match PersistentList::create(bigger) {
        Err(ListError::Region(err)) => println!("rejected as expected: {}", err),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("geometry mismatch accepted"),
    }
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("set.pm");

    let odd_capacity = ListConfig {
        capacity: 100,
        ..config(&path, PersistMode::Adr)
    };
    assert!(matches!(
        PersistentList::create(odd_capacity),
        Err(ListError::InvalidConfig(_))
    ));

    let no_threads = ListConfig {
        max_threads: 0,
        ..config(&path, PersistMode::Adr)
    };
    assert!(matches!(
        PersistentList::create(no_threads),
        Err(ListError::InvalidConfig(_))
    ));

    // Nothing was created.
    assert!(!path.exists());
}

#[test]
fn test_thread_registration() {
    let dir = tempfile::tempdir().unwrap();
    let list = PersistentList::create(config(&dir.path().join("set.pm"), PersistMode::Adr)).unwrap();

    assert!(matches!(
        list.register(4),
        Err(ListError::ThreadIdOutOfRange {
            tid: 4,
            max_threads: 4
        })
    ));

    let ctx = list.register(1).unwrap();
    assert_eq!(ctx.tid(), 1);
    assert!(matches!(list.register(1), Err(ListError::ThreadIdInUse(1))));

    drop(ctx);
    assert!(list.register(1).is_ok());
}
