use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use crate::errors::{Result, SyncError};

use super::chunks::{drain_into, ChunkReader};
use super::{create_dir_all_idempotent, parent_dir, ChunkStream, StorageAdapter};

/// Disk-backed adapter. With a root, every path is resolved beneath it.
#[derive(Debug, Clone, Default)]
pub struct LocalAdapter {
    root: Option<PathBuf>,
}

impl LocalAdapter {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path.trim_start_matches('/')),
            None => PathBuf::from(path),
        }
    }

    fn ensure_parent(&self, file_path: &str) -> Result<()> {
        let parent = parent_dir(file_path);
        create_dir_all_idempotent(
            parent,
            |dir| self.resolve(dir).is_dir(),
            |dir| fs::create_dir(self.resolve(dir)),
        )
        .map_err(|err| SyncError::transfer(parent, err))
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl StorageAdapter for LocalAdapter {
    fn kind(&self) -> &str {
        "local"
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path);
        let entries = fs::read_dir(&dir).map_err(|err| SyncError::listing(path, err))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SyncError::listing(path, err))?;
            let file_type = entry
                .file_type()
                .map_err(|err| SyncError::listing(path, err))?;
            if file_type.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        fs::metadata(self.resolve(path))
            .map(|meta| meta.is_dir())
            .map_err(|err| SyncError::from_io(path, err))
    }

    fn read_chunks<'a>(&'a self, file_path: &str, chunk_size: usize) -> Result<ChunkStream<'a>> {
        let file = File::open(self.resolve(file_path))
            .map_err(|err| SyncError::transfer(file_path, err))?;
        Ok(Box::new(ChunkReader::new(file, chunk_size, file_path)?))
    }

    fn write_chunks(&self, file_path: &str, chunks: ChunkStream<'_>) -> Result<u64> {
        self.ensure_parent(file_path)?;
        let file = File::create(self.resolve(file_path))
            .map_err(|err| SyncError::transfer(file_path, err))?;
        let mut writer = BufWriter::new(file);
        let total = drain_into(&mut writer, chunks, file_path)?;
        let file = writer
            .into_inner()
            .map_err(|err| SyncError::transfer(file_path, err.into_error()))?;
        file.sync_all()
            .map_err(|err| SyncError::transfer(file_path, err))?;
        Ok(total)
    }

    fn delete_file(&self, file_path: &str) -> Result<()> {
        remove_if_exists(&self.resolve(file_path)).map_err(|err| SyncError::transfer(file_path, err))
    }

    fn rename_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        // rename(2) replaces an existing destination atomically.
        fs::rename(self.resolve(old_path), self.resolve(new_path))
            .map_err(|err| SyncError::transfer(new_path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn path_str(path: &Path) -> String {
        path.to_string_lossy().into_owned()
    }

    fn chunks_of(parts: &[&[u8]]) -> ChunkStream<'static> {
        let owned: Vec<Result<Vec<u8>>> = parts.iter().map(|p| Ok(p.to_vec())).collect();
        Box::new(owned.into_iter())
    }

    #[test]
    fn lists_only_files_sorted() -> Result<()> {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("b.txt"), b"b").unwrap();
        fs::write(tmp.path().join("a.txt"), b"a").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        let adapter = LocalAdapter::default();
        assert_eq!(adapter.list_files(&path_str(tmp.path()))?, vec!["a.txt", "b.txt"]);
        Ok(())
    }

    #[test]
    fn listing_missing_directory_fails() {
        let tmp = tempdir().unwrap();
        let adapter = LocalAdapter::default();
        let err = adapter
            .list_files(&path_str(&tmp.path().join("absent")))
            .unwrap_err();
        assert!(matches!(err, SyncError::Listing { .. }));
    }

    #[test]
    fn is_directory_reports_not_found() {
        let tmp = tempdir().unwrap();
        let adapter = LocalAdapter::default();
        assert!(adapter.is_directory(&path_str(tmp.path())).unwrap());
        let err = adapter
            .is_directory(&path_str(&tmp.path().join("missing")))
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn write_creates_parents_and_counts_bytes() -> Result<()> {
        let tmp = tempdir().unwrap();
        let adapter = LocalAdapter::new(Some(tmp.path().to_path_buf()));

        let written = adapter.write_chunks("/deep/nested/out.bin", chunks_of(&[b"abc", b"de"]))?;
        assert_eq!(written, 5);
        assert_eq!(fs::read(tmp.path().join("deep/nested/out.bin")).unwrap(), b"abcde");
        Ok(())
    }

    #[test]
    fn write_with_no_chunks_creates_empty_file() -> Result<()> {
        let tmp = tempdir().unwrap();
        let adapter = LocalAdapter::new(Some(tmp.path().to_path_buf()));
        assert_eq!(adapter.write_chunks("empty.txt.tmp", chunks_of(&[]))?, 0);
        assert_eq!(fs::metadata(tmp.path().join("empty.txt.tmp")).unwrap().len(), 0);
        Ok(())
    }

    #[test]
    fn read_back_in_chunks() -> Result<()> {
        let tmp = tempdir().unwrap();
        let data: Vec<u8> = (0..25 * 1024).map(|i| (i % 251) as u8).collect();
        fs::write(tmp.path().join("src.bin"), &data).unwrap();

        let adapter = LocalAdapter::new(Some(tmp.path().to_path_buf()));
        let chunks: Vec<Vec<u8>> = adapter
            .read_chunks("src.bin", 10 * 1024)?
            .collect::<Result<_>>()?;
        let lens: Vec<usize> = chunks.iter().map(Vec::len).collect();
        assert_eq!(lens, vec![10 * 1024, 10 * 1024, 5 * 1024]);
        assert_eq!(chunks.concat(), data);
        Ok(())
    }

    #[test]
    fn delete_missing_file_is_noop() -> Result<()> {
        let tmp = tempdir().unwrap();
        let adapter = LocalAdapter::new(Some(tmp.path().to_path_buf()));
        adapter.delete_file("never-existed.txt")?;
        Ok(())
    }

    #[test]
    fn rename_replaces_existing_target() -> Result<()> {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("report.csv"), b"old").unwrap();
        fs::write(tmp.path().join("report.csv.tmp"), b"new").unwrap();

        let adapter = LocalAdapter::new(Some(tmp.path().to_path_buf()));
        adapter.rename_file("report.csv.tmp", "report.csv")?;

        assert_eq!(fs::read(tmp.path().join("report.csv")).unwrap(), b"new");
        assert!(!tmp.path().join("report.csv.tmp").exists());
        Ok(())
    }
}
