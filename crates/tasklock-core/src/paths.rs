use crate::error::{Result, StoreError};
use directories::ProjectDirs;
use std::path::PathBuf;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "tasklock";
pub const APP_NAME: &str = "tasklock";

pub const KEY_FILE_NAME: &str = "encryption_key.bin";
pub const BACKUPS_DIR_NAME: &str = "backups";

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "cannot determine application directories",
        ))
    })
}

pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

pub fn documents_dir() -> Result<PathBuf> {
    Ok(data_dir()?.join("documents"))
}

pub fn backups_dir() -> Result<PathBuf> {
    Ok(documents_dir()?.join(BACKUPS_DIR_NAME))
}

/// The key lives under the config directory, never under the document
/// directory, so a backup of the documents can never contain the key.
pub fn key_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join(KEY_FILE_NAME))
}
