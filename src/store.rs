use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::domain::{IndexedRecord, Layout};
use crate::error::KiraError;

/// The output directory images are written into.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn from_path(root: &Path) -> Result<Self, KiraError> {
        let root = Utf8PathBuf::from_path_buf(root.to_path_buf()).map_err(|path| {
            KiraError::Filesystem(format!("non-utf8 output path: {}", path.display()))
        })?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn destination(&self, layout: Layout, record: &IndexedRecord) -> Utf8PathBuf {
        layout.destination(&self.root, record)
    }

    pub fn ensure_root(&self) -> Result<(), KiraError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| KiraError::Filesystem(format!("create {}: {err}", self.root)))
    }

    pub fn ensure_parent(path: &Utf8Path) -> Result<(), KiraError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| KiraError::Filesystem(format!("create {parent}: {err}")))?;
        }
        Ok(())
    }

    /// Creates one directory per distinct taxonomic token and returns how many
    /// did not exist before. A directory that cannot be created is logged and
    /// left for the per-record step to report.
    pub fn ensure_taxon_dirs(&self, records: &[IndexedRecord]) -> usize {
        let tokens: BTreeSet<String> = records
            .iter()
            .map(|indexed| indexed.record.taxon_token())
            .collect();
        let mut created = 0;
        for token in tokens {
            let dir = self.root.join(&token);
            if dir.as_std_path().is_dir() {
                continue;
            }
            match fs::create_dir_all(dir.as_std_path()) {
                Ok(()) => created += 1,
                Err(err) => warn!(path = %dir, error = %err, "cannot create species directory"),
            }
        }
        created
    }

    /// Presence on disk is the only record of a finished download.
    pub fn exists(path: &Utf8Path) -> bool {
        path.as_std_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ObservationRecord;

    fn indexed(name: &str, position: usize) -> IndexedRecord {
        IndexedRecord {
            position,
            record: ObservationRecord {
                scientific_name: Some(name.to_string()),
                image_url: Some(format!("https://x.org/{position}.jpg")),
                url: None,
            },
        }
    }

    #[test]
    fn taxon_dirs_are_created_once() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::from_path(&temp.path().join("dataset")).unwrap();
        store.ensure_root().unwrap();
        let records = vec![
            indexed("Panthera leo", 0),
            indexed("Panthera  leo", 1),
            indexed("Bufo bufo", 2),
        ];

        assert_eq!(store.ensure_taxon_dirs(&records), 2);
        assert!(store.root().join("panthera_leo").as_std_path().is_dir());
        assert!(store.root().join("bufo_bufo").as_std_path().is_dir());
        assert_eq!(store.ensure_taxon_dirs(&records), 0);
    }

    #[test]
    fn blocked_taxon_dir_is_not_counted() {
        let temp = tempfile::tempdir().unwrap();
        let store = Store::from_path(&temp.path().join("dataset")).unwrap();
        store.ensure_root().unwrap();
        fs::write(store.root().join("bufo_bufo").as_std_path(), b"not a dir").unwrap();
        let records = vec![indexed("Panthera leo", 0), indexed("Bufo bufo", 1)];

        assert_eq!(store.ensure_taxon_dirs(&records), 1);
        assert!(store.root().join("panthera_leo").as_std_path().is_dir());
    }

    #[test]
    fn destination_follows_layout() {
        let store = Store::new(Utf8PathBuf::from("dataset_retry"));
        let record = indexed("Bufo bufo", 4);
        assert!(
            store
                .destination(Layout::Flat, &record)
                .ends_with("dataset_retry/bufo_bufo_4.jpg")
        );
        assert!(
            store
                .destination(Layout::Nested, &record)
                .ends_with("dataset_retry/bufo_bufo/bufo_bufo_4.jpg")
        );
    }
}
