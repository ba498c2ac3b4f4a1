use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

use log::info;

use super::store::{SecretStore, SecretStoreError};

const FILE_SUFFIX: &str = ".pem";

/// Stores each secret as `<config_dir>/<key>.pem`.
pub struct FileSecretStore {
    config_dir: PathBuf,
}

impl FileSecretStore {
    /// Creates the target directory if it does not exist yet.
    pub fn new(config_dir: impl Into<PathBuf>) -> Result<Self, SecretStoreError> {
        let config_dir = config_dir.into();
        if !config_dir.as_os_str().is_empty() && !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|err| {
                SecretStoreError::Unavailable(format!(
                    "file-store: unable to create config directory '{}': {err}",
                    config_dir.display()
                ))
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700)).map_err(
                    |err| {
                        SecretStoreError::Unavailable(format!(
                            "file-store: unable to restrict config directory '{}': {err}",
                            config_dir.display()
                        ))
                    },
                )?;
            }
        }
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Deterministic, filesystem-safe artifact path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.config_dir.join(format!("{}{FILE_SUFFIX}", file_stem(key)))
    }

    /// Owner-only sibling of the artifact, renamed into place once written.
    fn staging_path_for(&self, key: &str) -> PathBuf {
        self.config_dir.join(format!(
            ".{}{FILE_SUFFIX}.{}.tmp",
            file_stem(key),
            uuid::Uuid::new_v4().simple()
        ))
    }
}

fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            other => other,
        })
        .collect()
}

fn write_secure_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.sync_all()
}

impl SecretStore for FileSecretStore {
    fn store(&self, key: &str, value: &str) -> Result<(), SecretStoreError> {
        let path = self.path_for(key);
        let staging = self.staging_path_for(key);

        let written = write_secure_file(&staging, value.as_bytes())
            .and_then(|()| fs::rename(&staging, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&staging);
            return Err(SecretStoreError::Store(format!(
                "file-store: unable to write private key to '{}': {err}",
                path.display()
            )));
        }

        info!("[{key}] file-store: private key written to '{}'", path.display());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<String, SecretStoreError> {
        let path = self.path_for(key);
        fs::read_to_string(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => SecretStoreError::NotFound(key.to_string()),
            _ => SecretStoreError::Store(format!(
                "file-store: unable to read '{}': {err}",
                path.display()
            )),
        })
    }
}
