//! Directory-backed state store.
//!
//! Layout:
//! - `disk-images.json`: array of disk images
//! - `disk-drives.json`: array of drive states
//! - `state-<key>.json`: one machine snapshot per key

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::StateStore;
use crate::disk::{DiskDrive, DiskImage};
use crate::error::{CoreError, CoreResult};
use crate::machine::MachineSnapshot;

const DISK_IMAGES_FILE: &str = "disk-images.json";
const DISK_DRIVES_FILE: &str = "disk-drives.json";

/// Store that writes JSON documents into a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
    supported: bool,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    /// If it cannot be created the store reports itself unsupported.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let supported = match std::fs::create_dir_all(&dir) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("state store {} unavailable: {e}", dir.display());
                false
            }
        };
        Self { dir, supported }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn state_path(&self, key: &str) -> PathBuf {
        let key: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("state-{key}.json"))
    }

    fn ensure_supported(&self) -> CoreResult<()> {
        if self.supported {
            Ok(())
        } else {
            Err(CoreError::Unsupported)
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> CoreResult<Option<T>> {
        self.ensure_supported()?;
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(store_error("cannot read", path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| store_error("corrupt", path, e))
    }

    async fn write_json<T: Serialize + Sync + ?Sized>(&self, path: &Path, value: &T) -> CoreResult<()> {
        self.ensure_supported()?;
        let json = serde_json::to_string_pretty(value)?;
        // Replace atomically via a sibling temp file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| store_error("cannot write", &tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| store_error("cannot replace", path, e))
    }
}

fn store_error(what: &str, path: &Path, e: impl std::fmt::Display) -> CoreError {
    CoreError::Store(format!("{what} {}: {e}", path.display()))
}

impl StateStore for JsonFileStore {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn delete_all_disk_images(&self) -> CoreResult<()> {
        self.ensure_supported()?;
        match tokio::fs::remove_file(self.dir.join(DISK_IMAGES_FILE)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_error("cannot delete", &self.dir.join(DISK_IMAGES_FILE), e)),
        }
    }

    async fn save_disk_images(&self, images: &[DiskImage]) -> CoreResult<()> {
        let path = self.dir.join(DISK_IMAGES_FILE);
        let mut stored: Vec<DiskImage> = self.read_json(&path).await?.unwrap_or_default();
        for image in images {
            stored.retain(|existing| existing.name != image.name);
            stored.push(image.clone());
        }
        stored.sort_by(|a, b| a.name.cmp(&b.name));
        self.write_json(&path, &stored).await
    }

    async fn save_disk_drives(&self, drives: &[DiskDrive]) -> CoreResult<()> {
        self.write_json(&self.dir.join(DISK_DRIVES_FILE), drives)
            .await
    }

    async fn put_machine_state(&self, key: &str, snapshot: &MachineSnapshot) -> CoreResult<()> {
        self.write_json(&self.state_path(key), snapshot).await
    }

    async fn get_disk_images(&self) -> CoreResult<Vec<DiskImage>> {
        Ok(self
            .read_json(&self.dir.join(DISK_IMAGES_FILE))
            .await?
            .unwrap_or_default())
    }

    async fn get_disk_drives(&self) -> CoreResult<Vec<DiskDrive>> {
        Ok(self
            .read_json(&self.dir.join(DISK_DRIVES_FILE))
            .await?
            .unwrap_or_default())
    }

    async fn get_machine_state(&self, key: &str) -> CoreResult<MachineSnapshot> {
        self.read_json(&self.state_path(key))
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("machine state '{key}'")))
    }
}
