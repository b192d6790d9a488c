//! SFTP backend built on libssh2.
//!
//! SFTP has no recursive mkdir and its rename refuses to overwrite on most
//! servers, so both are emulated on top of the primitive requests.

use std::io::{self, BufWriter};
use std::net::TcpStream;
use std::path::Path;

use ssh2::{ErrorCode, Session, Sftp};

use crate::config::ConnectionConfig;
use crate::errors::{Result, SyncError};

use super::chunks::{drain_into, ChunkReader};
use super::{create_dir_all_idempotent, parent_dir, ChunkStream, StorageAdapter};

// libssh2 SFTP status codes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_NO_SUCH_PATH: i32 = 10;
const FX_FILE_ALREADY_EXISTS: i32 = 11;

const DIR_MODE: i32 = 0o755;

pub struct SftpAdapter {
    sftp: Sftp,
    // Keeps the transport alive for as long as the SFTP channel is in use.
    _session: Session,
}

fn is_missing(err: &ssh2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH)
    )
}

fn to_io(err: ssh2::Error) -> io::Error {
    let kind = match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) | ErrorCode::SFTP(FX_NO_SUCH_PATH) => {
            io::ErrorKind::NotFound
        }
        ErrorCode::SFTP(FX_FILE_ALREADY_EXISTS) => io::ErrorKind::AlreadyExists,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

impl SftpAdapter {
    /// Open an SSH session for `connection_id` and start the SFTP subsystem.
    pub fn connect(connection_id: &str, config: &ConnectionConfig) -> Result<Self> {
        let fail = |message: String| SyncError::Connection {
            id: connection_id.to_string(),
            message,
        };

        let host = config
            .host
            .as_deref()
            .ok_or_else(|| SyncError::config(format!("connection '{connection_id}' has no host")))?;
        let username = config.username.as_deref().ok_or_else(|| {
            SyncError::config(format!("connection '{connection_id}' has no username"))
        })?;

        let addr = format!("{}:{}", host, config.port);
        let tcp = TcpStream::connect(&addr).map_err(|err| fail(format!("tcp connect to {addr}: {err}")))?;
        let mut session = Session::new().map_err(|err| fail(format!("ssh session: {err}")))?;
        session.set_tcp_stream(tcp);
        if config.timeout_ms > 0 {
            session.set_timeout(config.timeout_ms);
        }
        session
            .handshake()
            .map_err(|err| fail(format!("ssh handshake with {addr}: {err}")))?;

        let auth = if let Some(password) = config.password.as_deref() {
            session.userauth_password(username, password)
        } else if let Some(key) = config.private_key.as_deref() {
            session.userauth_pubkey_file(username, None, key, config.passphrase.as_deref())
        } else {
            session.userauth_agent(username)
        };
        auth.map_err(|err| fail(format!("authentication as {username}: {err}")))?;
        if !session.authenticated() {
            return Err(fail(format!("authentication as {username} was rejected")));
        }

        let sftp = session
            .sftp()
            .map_err(|err| fail(format!("sftp subsystem: {err}")))?;
        log::debug!("connected sftp adapter {connection_id} to {addr}");

        Ok(Self {
            sftp,
            _session: session,
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.sftp.stat(Path::new(path)).is_ok()
    }

    fn remove_if_exists(&self, path: &str) -> Result<()> {
        match self.sftp.unlink(Path::new(path)) {
            Ok(()) => Ok(()),
            Err(err) if is_missing(&err) => Ok(()),
            Err(err) => Err(SyncError::transfer(path, to_io(err))),
        }
    }
}

impl StorageAdapter for SftpAdapter {
    fn kind(&self) -> &str {
        "sftp"
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>> {
        let entries = self
            .sftp
            .readdir(Path::new(path))
            .map_err(|err| SyncError::listing(path, to_io(err)))?;
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|(_, stat)| !stat.is_dir())
            .filter_map(|(entry, _)| {
                entry
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn is_directory(&self, path: &str) -> Result<bool> {
        self.sftp
            .stat(Path::new(path))
            .map(|stat| stat.is_dir())
            .map_err(|err| SyncError::from_io(path, to_io(err)))
    }

    fn read_chunks<'a>(&'a self, file_path: &str, chunk_size: usize) -> Result<ChunkStream<'a>> {
        let file = self
            .sftp
            .open(Path::new(file_path))
            .map_err(|err| SyncError::transfer(file_path, to_io(err)))?;
        Ok(Box::new(ChunkReader::new(file, chunk_size, file_path)?))
    }

    fn write_chunks(&self, file_path: &str, chunks: ChunkStream<'_>) -> Result<u64> {
        let parent = parent_dir(file_path);
        create_dir_all_idempotent(
            parent,
            |dir| self.exists(dir),
            |dir| self.sftp.mkdir(Path::new(dir), DIR_MODE).map_err(to_io),
        )
        .map_err(|err| SyncError::transfer(parent, err))?;

        let file = self
            .sftp
            .create(Path::new(file_path))
            .map_err(|err| SyncError::transfer(file_path, to_io(err)))?;
        let mut writer = BufWriter::new(file);
        drain_into(&mut writer, chunks, file_path)
    }

    fn delete_file(&self, file_path: &str) -> Result<()> {
        self.remove_if_exists(file_path)
    }

    fn rename_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.remove_if_exists(new_path)?;
        self.sftp
            .rename(Path::new(old_path), Path::new(new_path), None)
            .map_err(|err| SyncError::transfer(new_path, to_io(err)))
    }
}
