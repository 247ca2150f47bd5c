//! Crash-safe per-file byte offset persistence with rotation detection
//! (§4.A).

mod entry;
mod error;
mod store;

pub use error::Error;
pub use store::PositionStore;

#[cfg(test)]
mod test {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write as _;

    fn touch(path: &std::path::Path, contents: &[u8]) {
        let mut f = File::create(path).unwrap();
        f.write_all(contents).unwrap();
    }

    #[test]
    fn set_then_get_round_trips() {
        let store_dir = tempfile::tempdir().unwrap();
        let tracked_dir = tempfile::tempdir().unwrap();
        let tracked = tracked_dir.path().join("a.log");
        touch(&tracked, b"hello\n");

        let store = PositionStore::open(store_dir.path()).unwrap();
        assert_eq!(store.get(&tracked).unwrap(), None);
        store.set(&tracked, 42).unwrap();
        assert_eq!(store.get(&tracked).unwrap(), Some(42));
    }

    #[test]
    fn reopening_store_for_unchanged_file_returns_last_offset() {
        let store_dir = tempfile::tempdir().unwrap();
        let tracked_dir = tempfile::tempdir().unwrap();
        let tracked = tracked_dir.path().join("a.log");
        touch(&tracked, b"hello\n");

        {
            let store = PositionStore::open(store_dir.path()).unwrap();
            store.set(&tracked, 7).unwrap();
            store.close();
        }

        let store = PositionStore::open(store_dir.path()).unwrap();
        assert_eq!(store.get(&tracked).unwrap(), Some(7));
    }

    #[test]
    fn recreated_file_is_treated_as_new() {
        let store_dir = tempfile::tempdir().unwrap();
        let tracked_dir = tempfile::tempdir().unwrap();
        let tracked = tracked_dir.path().join("a.log");
        touch(&tracked, b"hello\n");

        let store = PositionStore::open(store_dir.path()).unwrap();
        store.set(&tracked, 100).unwrap();
        assert_eq!(store.get(&tracked).unwrap(), Some(100));

        fs::remove_file(&tracked).unwrap();
        touch(&tracked, b"a completely different and longer body\n");

        assert_eq!(store.get(&tracked).unwrap(), None);
    }

    #[test]
    fn bad_configuration_when_store_path_is_a_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = PositionStore::open(file.path()).unwrap_err();
        assert!(matches!(err, Error::BadConfiguration { .. }));
    }

    #[test]
    fn close_is_idempotent() {
        let store_dir = tempfile::tempdir().unwrap();
        let store = PositionStore::open(store_dir.path()).unwrap();
        store.close();
        store.close();
    }
}
