//! Directory-backed secret store.
//!
//! Each value lives in its own file under `<root>/<region>/<path>`. Files
//! are created with mode 0600 and directories with 0700; values are written
//! atomically through a temporary file in the target directory.

use std::fs::{self, DirBuilder};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::Builder;
use tracing::debug;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use super::{SecretStore, StoreError, StoreFactory};

/// Secret store keeping each value in a private file.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    root: PathBuf,
}

impl FileSecretStore {
    /// Stores values beneath `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut segments = 0_usize;
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    resolved.push(segment);
                    segments += 1;
                }
                Component::CurDir => {}
                _ => return Err(invalid_path(path)),
            }
        }
        if segments == 0 {
            return Err(invalid_path(path));
        }
        Ok(resolved)
    }
}

fn invalid_path(path: &str) -> StoreError {
    StoreError::Backend {
        path: path.to_owned(),
        message: String::from("path must name a file inside the store"),
    }
}

fn backend(path: &str, error: &io::Error) -> StoreError {
    StoreError::Backend {
        path: path.to_owned(),
        message: error.to_string(),
    }
}

fn create_private_dir(directory: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(directory)
}

fn write_private(file: &Path, value: &str) -> io::Result<()> {
    let directory = file.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "secret path has no parent directory")
    })?;
    create_private_dir(directory)?;

    let mut builder = Builder::new();
    builder.prefix(".nostrap");
    #[cfg(unix)]
    {
        use std::fs::Permissions;
        builder.permissions(Permissions::from_mode(0o600));
    }
    let mut temporary = builder.tempfile_in(directory)?;
    temporary.write_all(value.as_bytes())?;
    temporary.as_file().sync_all()?;
    temporary.persist(file).map_err(|error| error.error)?;
    Ok(())
}

impl SecretStore for FileSecretStore {
    fn put_secure(&self, path: &str, value: &str) -> Result<(), StoreError> {
        let file = self.file_for(path)?;
        write_private(&file, value).map_err(|error| backend(path, &error))?;
        debug!(target: "nostrap::store", file = %file.display(), "secret file written");
        Ok(())
    }

    fn get_decrypted(&self, path: &str) -> Result<String, StoreError> {
        let file = self.file_for(path)?;
        match fs::read_to_string(&file) {
            Ok(value) => Ok(value),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                path: path.to_owned(),
            }),
            Err(error) => Err(backend(path, &error)),
        }
    }
}

/// Factory placing each region in its own subdirectory of a root.
#[derive(Debug, Clone)]
pub struct FileStoreFactory {
    root: PathBuf,
}

impl FileStoreFactory {
    /// Uses `root` as the parent of all region directories.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StoreFactory for FileStoreFactory {
    fn connect(&self, region: &str) -> Result<Box<dyn SecretStore>, StoreError> {
        let mut components = Path::new(region).components();
        let valid = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !valid {
            return Err(StoreError::Connect {
                region: region.to_owned(),
                message: String::from("region must be a single path segment"),
            });
        }
        let directory = self.root.join(region);
        create_private_dir(&directory).map_err(|error| StoreError::Connect {
            region: region.to_owned(),
            message: format!("{}: {error}", directory.display()),
        })?;
        Ok(Box::new(FileSecretStore::new(directory)))
    }
}
