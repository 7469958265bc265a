use navigo_core::db::{open_db, open_db_in_memory};
use navigo_core::{
    GridSnapshot, GridStateStore, GridStorage, KeyValueStore, MatrixError, MemoryKeyValueStore,
    RepoError, RepoResult, SqliteKeyValueStore,
};

fn fresh_store() -> GridStateStore<MemoryKeyValueStore> {
    GridStateStore::open(GridStorage::new(MemoryKeyValueStore::new()))
}

fn assert_dimensions_consistent<S: KeyValueStore>(store: &GridStateStore<S>) {
    assert_eq!(store.layout().rows(), store.rows());
    assert_eq!(store.cleanliness().rows(), store.rows());
    assert_eq!(store.layout().cols(), store.cols());
    assert_eq!(store.cleanliness().cols(), store.cols());
}

/// Backend whose writes always fail, reads return nothing.
struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> RepoResult<Option<String>> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> RepoResult<()> {
        Err(RepoError::InvalidData("storage disabled".to_string()))
    }

    fn remove(&self, _key: &str) -> RepoResult<()> {
        Ok(())
    }
}

#[test]
fn fresh_store_is_twenty_square_all_active_all_dirty() {
    let store = fresh_store();
    assert_eq!((store.rows(), store.cols()), (20, 20));
    assert_eq!(store.active_count(), 400);
    assert_eq!(store.clean_count(), 0);
    assert_dimensions_consistent(&store);
}

#[test]
fn toggle_then_reset_marks_cell_dirty_again() {
    let mut store = fresh_store();

    assert_eq!(store.toggle_cleanliness(3, 4).unwrap(), Some(true));
    assert!(store.is_clean(3, 4).unwrap());

    store.reset_all_cleanliness();
    assert!(!store.is_clean(3, 4).unwrap());
}

#[test]
fn toggle_cleanliness_on_inactive_cell_is_noop() {
    let mut store = fresh_store();
    store.toggle_layout(1, 1).unwrap();

    assert_eq!(store.toggle_cleanliness(1, 1).unwrap(), None);
    assert!(!store.is_clean(1, 1).unwrap());
}

#[test]
fn out_of_range_coordinates_are_rejected() {
    let mut store = fresh_store();
    store.resize(5, 5);

    let err = store.toggle_cleanliness(5, 0).unwrap_err();
    assert!(matches!(err, MatrixError::IndexOutOfRange { row: 5, .. }));
    assert!(store.toggle_layout(0, 7).is_err());
    assert!(store.is_active(9, 9).is_err());
}

#[test]
fn resize_shrink_keeps_overlap_including_inactive_cells() {
    let mut store = fresh_store();
    store.toggle_layout(2, 2).unwrap();
    store.toggle_cleanliness(4, 4).unwrap();

    assert!(store.resize(5, 5));

    assert!(!store.is_active(2, 2).unwrap());
    assert!(store.is_active(4, 4).unwrap());
    assert!(store.is_clean(4, 4).unwrap());
    assert_dimensions_consistent(&store);
}

#[test]
fn resize_grow_fills_active_and_dirty() {
    let mut store = fresh_store();
    store.resize(3, 3);
    store.toggle_layout(0, 0).unwrap();
    store.toggle_cleanliness(2, 2).unwrap();

    store.resize(6, 4);

    assert!(!store.is_active(0, 0).unwrap());
    assert!(store.is_clean(2, 2).unwrap());
    for row in 0..6 {
        for col in 0..4 {
            if row >= 3 || col >= 3 {
                assert!(store.is_active(row, col).unwrap());
                assert!(!store.is_clean(row, col).unwrap());
            }
        }
    }
}

#[test]
fn dimensions_stay_consistent_across_resize_sequences() {
    let mut store = fresh_store();
    for (rows, cols) in [(1, 1), (50, 2), (-3, 80), (7, 7), (7, 7), (0, 0), (33, 12)] {
        store.resize(rows, cols);
        assert_dimensions_consistent(&store);
        assert!((1..=50).contains(&store.rows()));
        assert!((1..=50).contains(&store.cols()));
    }
}

#[test]
fn reset_is_idempotent() {
    let mut store = fresh_store();
    store.toggle_cleanliness(0, 0).unwrap();
    store.toggle_cleanliness(7, 3).unwrap();

    store.reset_all_cleanliness();
    let once = store.snapshot();
    store.reset_all_cleanliness();
    assert_eq!(store.snapshot(), once);
}

#[test]
fn reset_leaves_inactive_cells_untouched() {
    let mut store = fresh_store();
    store.toggle_cleanliness(6, 6).unwrap();
    store.toggle_layout(6, 6).unwrap();

    store.reset_all_cleanliness();

    assert!(!store.is_active(6, 6).unwrap());
    assert!(store.is_clean(6, 6).unwrap());
}

#[test]
fn cleanliness_toggle_persists_but_layout_toggle_waits_for_commit() {
    let backend = MemoryKeyValueStore::new();
    {
        let mut store = GridStateStore::open(GridStorage::new(&backend));
        store.resize(4, 4);
        store.toggle_cleanliness(1, 2).unwrap();
        store.toggle_layout(3, 3).unwrap();
    }

    let reloaded = GridStateStore::open(GridStorage::new(&backend));
    assert_eq!((reloaded.rows(), reloaded.cols()), (4, 4));
    assert!(reloaded.is_clean(1, 2).unwrap());
    assert!(reloaded.is_active(3, 3).unwrap());
}

#[test]
fn persist_all_commits_layout_edits() {
    let backend = MemoryKeyValueStore::new();
    {
        let mut store = GridStateStore::open(GridStorage::new(&backend));
        store.toggle_layout(3, 3).unwrap();
        assert!(store.persist_all());
    }

    let reloaded = GridStateStore::open(GridStorage::new(&backend));
    assert!(!reloaded.is_active(3, 3).unwrap());
}

#[test]
fn discard_layout_edits_restores_committed_layout() {
    let mut store = fresh_store();
    store.toggle_layout(0, 0).unwrap();
    store.persist_all();

    store.toggle_layout(0, 0).unwrap();
    store.toggle_layout(5, 5).unwrap();
    store.discard_layout_edits();

    assert!(!store.is_active(0, 0).unwrap());
    assert!(store.is_active(5, 5).unwrap());
}

#[test]
fn load_snapshot_normalizes_and_persists() {
    let backend = MemoryKeyValueStore::new();
    let mut store = GridStateStore::open(GridStorage::new(&backend));

    let mut snapshot = GridSnapshot::blank(3, 3);
    snapshot.layout.set(0, 1, false).unwrap();
    snapshot.rows = 5;
    store.load_snapshot(snapshot).unwrap();

    assert_eq!((store.rows(), store.cols()), (5, 3));
    assert_dimensions_consistent(&store);
    assert!(!store.is_active(0, 1).unwrap());
    assert!(store.is_active(4, 2).unwrap());

    let reloaded = GridStateStore::open(GridStorage::new(&backend));
    assert_eq!(reloaded.snapshot(), store.snapshot());
}

#[test]
fn with_defaults_ignores_persisted_grid() {
    let backend = MemoryKeyValueStore::new();
    GridStorage::new(&backend)
        .save_all(&GridSnapshot::blank(2, 2))
        .unwrap();

    let store = GridStateStore::with_defaults(GridStorage::new(&backend));
    assert_eq!((store.rows(), store.cols()), (20, 20));
}

#[test]
fn unavailable_persistence_is_non_fatal() {
    let mut store = GridStateStore::open(GridStorage::new(UnavailableStore));
    assert!(!store.persistence_degraded());

    assert_eq!(store.toggle_cleanliness(0, 0).unwrap(), Some(true));
    assert!(store.is_clean(0, 0).unwrap());
    assert!(store.persistence_degraded());

    assert!(store.resize(4, 4));
    store.reset_all_cleanliness();
    assert!(!store.persist_all());
    assert_eq!((store.rows(), store.cols()), (4, 4));
}

#[test]
fn store_works_over_sqlite_backend() {
    let conn = open_db_in_memory().unwrap();
    {
        let kv = SqliteKeyValueStore::try_new(&conn).unwrap();
        let mut store = GridStateStore::open(GridStorage::new(kv));
        store.resize(8, 10);
        store.toggle_cleanliness(7, 9).unwrap();
    }

    let kv = SqliteKeyValueStore::try_new(&conn).unwrap();
    let store = GridStateStore::open(GridStorage::new(kv));
    assert_eq!((store.rows(), store.cols()), (8, 10));
    assert!(store.is_clean(7, 9).unwrap());
    assert!(!store.persistence_degraded());
}

#[test]
fn dump_snapshot_matches_live_state() {
    let mut store = fresh_store();
    store.resize(3, 5);
    store.toggle_layout(0, 4).unwrap();
    store.toggle_cleanliness(2, 2).unwrap();

    let dumped = store.dump_snapshot();
    assert_eq!((dumped.rows, dumped.cols), (3, 5));
    assert!(dumped.is_consistent());
    assert!(!dumped.layout.get(0, 4).unwrap());
    assert!(dumped.cleanliness.get(2, 2).unwrap());
}

#[test]
fn reload_picks_up_writes_from_another_handle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.sqlite3");
    let daemon_conn = open_db(&path).unwrap();
    let editor_conn = open_db(&path).unwrap();

    let mut daemon = GridStateStore::open(GridStorage::new(
        SqliteKeyValueStore::try_new(&daemon_conn).unwrap(),
    ));
    let mut editor = GridStateStore::open(GridStorage::new(
        SqliteKeyValueStore::try_new(&editor_conn).unwrap(),
    ));

    editor.toggle_cleanliness(3, 3).unwrap();
    editor.toggle_layout(3, 3).unwrap();
    assert!(editor.persist_all());

    daemon.reload();
    assert!(!daemon.is_active(3, 3).unwrap());
    daemon.reset_all_cleanliness();

    let reopened = GridStateStore::open(GridStorage::new(
        SqliteKeyValueStore::try_new(&editor_conn).unwrap(),
    ));
    assert!(!reopened.is_active(3, 3).unwrap());
    assert!(reopened.is_clean(3, 3).unwrap());
}

#[test]
fn reload_drops_uncommitted_layout_edits() {
    let backend = MemoryKeyValueStore::new();
    let mut store = GridStateStore::open(GridStorage::new(&backend));
    store.resize(4, 4);
    store.toggle_layout(1, 1).unwrap();

    store.reload();
    assert_eq!((store.rows(), store.cols()), (4, 4));
    assert!(store.is_active(1, 1).unwrap());
}
