//! Persistence backends for saved machine state.
//!
//! This module provides:
//! - `StateStore`: the contract the orchestrator drives
//! - `MemoryStore`: in-memory implementation
//! - `JsonFileStore`: directory of JSON documents

mod json_store;
mod memory_store;

pub use json_store::JsonFileStore;
pub use memory_store::MemoryStore;

use std::future::Future;

use crate::disk::{DiskDrive, DiskImage};
use crate::error::CoreResult;
use crate::machine::MachineSnapshot;

/// Storage for disk images, drive state and machine snapshots.
pub trait StateStore {
    /// Whether this backend can be used at all. When false, saving is skipped.
    fn is_supported(&self) -> bool;

    fn delete_all_disk_images(&self) -> impl Future<Output = CoreResult<()>> + Send;

    fn save_disk_images(&self, images: &[DiskImage]) -> impl Future<Output = CoreResult<()>> + Send;

    fn save_disk_drives(&self, drives: &[DiskDrive]) -> impl Future<Output = CoreResult<()>> + Send;

    fn put_machine_state(
        &self,
        key: &str,
        snapshot: &MachineSnapshot,
    ) -> impl Future<Output = CoreResult<()>> + Send;

    fn get_disk_images(&self) -> impl Future<Output = CoreResult<Vec<DiskImage>>> + Send;

    fn get_disk_drives(&self) -> impl Future<Output = CoreResult<Vec<DiskDrive>>> + Send;

    fn get_machine_state(&self, key: &str)
        -> impl Future<Output = CoreResult<MachineSnapshot>> + Send;
}
