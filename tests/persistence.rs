use std::fs;

use meme_court::{
    store::{SnapshotStore, StoreError},
    Address, CallContext, LedgerSnapshot, LedgerState, SnapshotError,
};

fn addr(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

fn populated() -> LedgerState {
    let owner = addr(1);
    let mut ledger = LedgerState::new(owner);
    for (i, post) in ["b-post", "a-post", "c-post"].iter().enumerate() {
        ledger
            .register_post(&CallContext::new(addr(2), i as u64), post, "hash")
            .unwrap();
    }
    ledger
        .cast_vote(&CallContext::new(addr(3), 10), "c-post", true)
        .unwrap();
    ledger
        .cast_vote(&CallContext::new(addr(3), 11), "a-post", false)
        .unwrap();
    ledger
        .cast_vote(&CallContext::new(addr(4), 12), "a-post", true)
        .unwrap();
    ledger
        .change_vote(&CallContext::new(addr(3), 13), "a-post", true)
        .unwrap();
    ledger.pause(&CallContext::new(owner, 14)).unwrap();
    ledger
}

#[test]
fn save_then_load_answers_queries_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("nested").join("ledger.json"));
    let ledger = populated();

    store.create(&ledger).unwrap();
    let loaded = store.load().unwrap();

    assert_eq!(loaded, ledger);
    assert_eq!(loaded.state_root(), ledger.state_root());
    assert_eq!(
        loaded.query().user_voted_posts(&addr(3)),
        vec!["c-post", "a-post"]
    );
    assert_eq!(loaded.query().post_stats("a-post").funny_votes, 2);
    assert!(loaded.query().is_paused());
    assert_eq!(loaded.query().owner(), addr(1));
    assert_eq!(loaded.events().len(), 7);
    assert_eq!(loaded.meta().height, 8);
}

#[test]
fn create_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path().join("ledger.json"));
    store.create(&LedgerState::new(addr(1))).unwrap();
    assert!(matches!(
        store.create(&populated()),
        Err(StoreError::AlreadyInitialized(_))
    ));
    assert_eq!(store.load().unwrap().query().total_posts(), 0);
}

#[test]
fn edited_snapshot_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    let store = SnapshotStore::new(&path);
    store.save(&populated()).unwrap();

    let mut snapshot: LedgerSnapshot =
        serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    snapshot
        .user_votes
        .get_mut(&addr(3))
        .unwrap()
        .reverse();
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    match store.load() {
        Err(StoreError::Invalid { source, .. }) => {
            assert!(matches!(source, SnapshotError::RootMismatch { .. }))
        }
        other => panic!("expected invalid snapshot, got {other:?}"),
    }
}

#[test]
fn garbage_file_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.json");
    fs::write(&path, b"{not json").unwrap();
    assert!(matches!(
        SnapshotStore::new(&path).load(),
        Err(StoreError::Json { .. })
    ));
    assert!(matches!(
        SnapshotStore::new(dir.path().join("missing.json")).load(),
        Err(StoreError::Io { .. })
    ));
}
