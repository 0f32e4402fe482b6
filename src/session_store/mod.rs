//! Saved provisioning sessions.
//!
//! A session file records the names generated for one VM so a later
//! `stratus teardown` can delete exactly what `stratus provision` created.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::names::ResourceNames;

/// Errors raised while reading or writing a session file.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SessionStoreError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file does not hold a session record.
    #[error("failed to parse session file {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the path has no file name component.
    #[error("session file path {path} is missing a filename")]
    MissingFileName {
        /// Offending path.
        path: Utf8PathBuf,
    },
}

/// What a teardown needs to find a session's resources again.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SessionRecord {
    /// Resource group the session's objects live in.
    pub resource_group: String,
    /// Names generated for the session.
    pub names: ResourceNames,
}

fn split(path: &Utf8Path) -> Result<(&Utf8Path, &str), SessionStoreError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| SessionStoreError::MissingFileName {
            path: path.to_path_buf(),
        })?;
    Ok((parent, file_name))
}

fn io_error(path: &Utf8Path, err: &io::Error) -> SessionStoreError {
    SessionStoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Writes `record` to `path` as JSON, creating parent directories.
///
/// # Errors
///
/// Returns [`SessionStoreError`] when the directory cannot be created or
/// the file cannot be written.
pub fn save(path: &Utf8Path, record: &SessionRecord) -> Result<(), SessionStoreError> {
    let (parent, file_name) = split(path)?;
    Dir::create_ambient_dir_all(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;

    let rendered =
        serde_json::to_string_pretty(record).map_err(|err| SessionStoreError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    dir.write(file_name, rendered)
        .map_err(|err| io_error(path, &err))
}

/// Reads the session record stored at `path`.
///
/// # Errors
///
/// Returns [`SessionStoreError::Io`] when the file cannot be read and
/// [`SessionStoreError::Parse`] when it is not a session record.
pub fn load(path: &Utf8Path) -> Result<SessionRecord, SessionStoreError> {
    let (parent, file_name) = split(path)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| io_error(parent, &err))?;
    let contents = dir
        .read_to_string(file_name)
        .map_err(|err| io_error(path, &err))?;
    serde_json::from_str(&contents).map_err(|err| SessionStoreError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Deletes the session file. A missing file is not an error.
///
/// # Errors
///
/// Returns [`SessionStoreError::Io`] when removal fails for another reason.
pub fn remove(path: &Utf8Path) -> Result<(), SessionStoreError> {
    let (parent, file_name) = split(path)?;
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(io_error(parent, &err)),
    };
    match dir.remove_file(file_name) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(path, &err)),
    }
}
