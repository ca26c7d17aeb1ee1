//! In-memory state store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::StateStore;
use crate::disk::{DiskDrive, DiskImage};
use crate::error::{CoreError, CoreResult};
use crate::machine::MachineSnapshot;

#[derive(Debug, Default)]
struct MemoryStoreInner {
    disk_images: HashMap<String, DiskImage>,
    disk_drives: Vec<DiskDrive>,
    machine_states: HashMap<String, MachineSnapshot>,
}

/// Store that keeps everything in process memory.
///
/// Clone is cheap (just clones the Arc); clones share contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut MemoryStoreInner) -> R) -> CoreResult<R> {
        let mut inner = self.inner.lock().map_err(|_| CoreError::LockPoisoned)?;
        Ok(f(&mut inner))
    }
}

impl StateStore for MemoryStore {
    fn is_supported(&self) -> bool {
        true
    }

    async fn delete_all_disk_images(&self) -> CoreResult<()> {
        self.with_inner(|inner| inner.disk_images.clear())
    }

    async fn save_disk_images(&self, images: &[DiskImage]) -> CoreResult<()> {
        self.with_inner(|inner| {
            for image in images {
                inner.disk_images.insert(image.name.clone(), image.clone());
            }
        })
    }

    async fn save_disk_drives(&self, drives: &[DiskDrive]) -> CoreResult<()> {
        self.with_inner(|inner| inner.disk_drives = drives.to_vec())
    }

    async fn put_machine_state(&self, key: &str, snapshot: &MachineSnapshot) -> CoreResult<()> {
        self.with_inner(|inner| {
            inner
                .machine_states
                .insert(key.to_string(), snapshot.clone());
        })
    }

    async fn get_disk_images(&self) -> CoreResult<Vec<DiskImage>> {
        self.with_inner(|inner| {
            let mut images: Vec<DiskImage> = inner.disk_images.values().cloned().collect();
            images.sort_by(|a, b| a.name.cmp(&b.name));
            images
        })
    }

    async fn get_disk_drives(&self) -> CoreResult<Vec<DiskDrive>> {
        self.with_inner(|inner| inner.disk_drives.clone())
    }

    async fn get_machine_state(&self, key: &str) -> CoreResult<MachineSnapshot> {
        self.with_inner(|inner| inner.machine_states.get(key).cloned())?
            .ok_or_else(|| CoreError::NotFound(format!("machine state '{key}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disk_images_replace_and_clear() {
        let store = MemoryStore::new();
        store
            .save_disk_images(&[DiskImage::new("B", vec![2]), DiskImage::new("A", vec![1])])
            .await
            .unwrap();

        let names: Vec<String> = store
            .get_disk_images()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);

        store.delete_all_disk_images().await.unwrap();
        assert!(store.get_disk_images().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_machine_state_by_key() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_machine_state("ti994a").await,
            Err(CoreError::NotFound(_))
        ));

        let mut snapshot = MachineSnapshot::default();
        snapshot.cpu.breakpoint = Some(0x1234);
        store.put_machine_state("ti994a", &snapshot).await.unwrap();
        assert_eq!(store.get_machine_state("ti994a").await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_clones_share_contents() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.save_disk_drives(&[DiskDrive::empty("DSK1")]).await.unwrap();
        assert_eq!(b.get_disk_drives().await.unwrap().len(), 1);
    }
}
