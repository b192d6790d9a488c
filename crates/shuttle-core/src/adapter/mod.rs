//! Storage backends the transfer engine reads from and writes to.
//!
//! Paths handed to adapters are `/`-separated strings in the backend's own
//! namespace; each adapter decides how they map onto its storage.

mod chunks;
mod local;
mod registry;
mod sftp;

use std::io;

use crate::errors::Result;

pub use chunks::ChunkReader;
pub use local::LocalAdapter;
pub use registry::{AdapterConstructor, AdapterRegistry};
pub use sftp::SftpAdapter;

/// A finite, single-pass sequence of byte chunks.
pub type ChunkStream<'a> = Box<dyn Iterator<Item = Result<Vec<u8>>> + 'a>;

/// Uniform access to a filesystem-like backend.
pub trait StorageAdapter {
    /// Backend type name this adapter was registered under.
    fn kind(&self) -> &str;

    /// Names of the files directly inside `path`, in a stable order.
    fn list_files(&self, path: &str) -> Result<Vec<String>>;

    /// Fails with `NotFound` when `path` does not exist.
    fn is_directory(&self, path: &str) -> Result<bool>;

    /// Stream `file_path` in chunks of at most `chunk_size` bytes.
    fn read_chunks<'a>(&'a self, file_path: &str, chunk_size: usize) -> Result<ChunkStream<'a>>;

    /// Consume `chunks` into `file_path` (created or truncated), creating
    /// missing parent directories. Returns the number of bytes written.
    fn write_chunks(&self, file_path: &str, chunks: ChunkStream<'_>) -> Result<u64>;

    /// Remove `file_path`; a missing file is not an error.
    fn delete_file(&self, file_path: &str) -> Result<()>;

    /// Replace `new_path` with `old_path` so readers of `new_path` never see a partial file.
    fn rename_file(&self, old_path: &str, new_path: &str) -> Result<()>;
}

/// Join a directory and a file name with `/`.
pub fn join_path(dir: &str, name: &str) -> String {
    let name = name.trim_start_matches('/');
    if dir.is_empty() {
        return name.to_string();
    }
    if dir == "/" {
        return format!("/{name}");
    }
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

/// Directory portion of `path` (everything before the last `/`).
pub fn parent_dir(path: &str) -> &str {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) => "/",
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Final component of `path`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Create `dir` and its missing ancestors, shallowest first.
///
/// Another worker may create the same directory concurrently, so a failed
/// `mkdir` is only fatal when the directory still does not exist afterwards.
pub(crate) fn create_dir_all_idempotent<E, M>(dir: &str, exists: E, mkdir: M) -> io::Result<()>
where
    E: Fn(&str) -> bool,
    M: Fn(&str) -> io::Result<()>,
{
    if dir.is_empty() || dir == "/" || exists(dir) {
        return Ok(());
    }

    let mut prefix = String::with_capacity(dir.len());
    if dir.starts_with('/') {
        prefix.push('/');
    }
    for part in dir.split('/').filter(|p| !p.is_empty()) {
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        prefix.push_str(part);
        if exists(&prefix) {
            continue;
        }
        match mkdir(&prefix) {
            Ok(()) => log::info!("created directory: {prefix}"),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
            Err(err) => {
                if !exists(&prefix) {
                    return Err(err);
                }
            }
        }
    }
    Ok(())
}
