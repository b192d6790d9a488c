use directories::{BaseDirs, ProjectDirs};
use eyre::{eyre, Context, Result};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

static CONFIG_DIR_OVERRIDE: Lazy<RwLock<Option<PathBuf>>> = Lazy::new(|| RwLock::new(None));

const CONNECTIONS_FILE: &str = "connections.toml";
const CHECKPOINT_DIR: &str = "checkpoints";

/// Point every configuration lookup at `path` for the rest of the process.
pub fn set_config_dir<P: AsRef<Path>>(path: P) {
    *CONFIG_DIR_OVERRIDE.write() = Some(path.as_ref().to_path_buf());
}

/// Directory holding `connections.toml` and the checkpoint store: the
/// `--config-dir` override when set, otherwise the platform config dir.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(path) = CONFIG_DIR_OVERRIDE.read().clone() {
        return Ok(path);
    }
    ProjectDirs::from("com", "Shuttle", "Shuttle")
        .map(|proj| proj.config_dir().to_path_buf())
        .or_else(|| BaseDirs::new().map(|base| base.home_dir().join(".config").join("shuttle")))
        .ok_or_else(|| eyre!("no platform configuration directory; pass --config-dir"))
}

pub fn connections_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONNECTIONS_FILE))
}

/// Default location for file-backed checkpoints.
pub fn checkpoint_dir() -> Result<PathBuf> {
    Ok(config_dir()?.join(CHECKPOINT_DIR))
}

/// Credentials and addressing for one connection id.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Root directory for local connections; remote paths are resolved beneath it.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Session timeout in milliseconds for blocking protocol calls (0 = none).
    #[serde(default)]
    pub timeout_ms: u32,
}

fn default_port() -> u16 {
    22
}

/// Connection id -> connection settings, as read from `connections.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionTable {
    #[serde(default)]
    pub connections: HashMap<String, ConnectionConfig>,
}

impl ConnectionTable {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read connections file: {}", path.display()))?;
        Self::parse(&content)
            .wrap_err_with(|| format!("failed to parse connections file: {}", path.display()))
    }

    /// Load the table at `path`, or an empty table when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no connections file at {}", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid connections table")
    }

    pub fn get(&self, id: &str) -> Option<&ConnectionConfig> {
        self.connections.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, config: ConnectionConfig) {
        self.connections.insert(id.into(), config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_connection_table() -> Result<()> {
        let table = ConnectionTable::parse(
            r#"
            [connections.source_sftp_conn]
            host = "sftp.example.com"
            username = "sftpuser"
            password = "secret"

            [connections.staging]
            root = "/srv/staging"
            "#,
        )?;

        let sftp = table.get("source_sftp_conn").expect("sftp connection");
        assert_eq!(sftp.host.as_deref(), Some("sftp.example.com"));
        assert_eq!(sftp.port, 22);
        assert_eq!(sftp.password.as_deref(), Some("secret"));

        let local = table.get("staging").expect("local connection");
        assert_eq!(local.root.as_deref(), Some(Path::new("/srv/staging")));
        assert!(table.get("missing").is_none());
        Ok(())
    }

    #[test]
    fn override_redirects_derived_paths() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        set_config_dir(tmp.path());
        assert_eq!(config_dir()?, tmp.path());
        assert_eq!(connections_path()?, tmp.path().join(CONNECTIONS_FILE));
        assert_eq!(checkpoint_dir()?, tmp.path().join(CHECKPOINT_DIR));
        Ok(())
    }

    #[test]
    fn missing_connections_file_is_empty() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let table = ConnectionTable::load_or_default(&tmp.path().join("connections.toml"))?;
        assert!(table.connections.is_empty());
        Ok(())
    }
}
