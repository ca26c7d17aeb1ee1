//! TI-99/4A front-end core
//!
//! This crate provides the orchestration layer between a user interface and
//! an emulated TI-99/4A machine:
//! - Command and event buses (publish/subscribe)
//! - Cartridge resolution from a software catalog
//! - Save and restore of disk images, drives and machine state
//!
//! # Architecture
//!
//! - `CommandBus` / `EventBus`: synchronous fan-out to subscribers
//! - `MachineCore` trait: the emulated hardware, shared via `MachineHandle`
//! - `StateStore` trait: persistence backend (`MemoryStore`, `JsonFileStore`)
//! - `SoftwareCatalog` / `ModuleLoader` traits: cartridge lookup and fetch
//! - `Controller`: reacts to bus traffic and drives the pipelines

pub mod bus;
pub mod config;
pub mod controller;
pub mod disk;
pub mod error;
pub mod log;
pub mod machine;
pub mod orchestrator;
pub mod resolver;
pub mod settings;
pub mod software;
pub mod store;

pub use bus::{
    Bus, Command, CommandBus, CommandType, ConsoleEvent, ConsoleEventType, EventBus, Subscription,
};
pub use config::{AppConfig, DEFAULT_CARTRIDGE, MACHINE_STATE_KEY};
pub use controller::{AutoRun, Controller, Message};
pub use disk::{resolve_drives, DiskDrive, DiskImage, DiskImageSet, DEFAULT_DISK_IMAGE_NAMES};
pub use error::{CoreError, CoreResult};
pub use log::{EnvLogSink, Level, Log, LogSink, MemoryLog};
pub use machine::{bind_machine, HeadlessMachine, MachineCore, MachineHandle, MachineSnapshot, TapeStatus};
pub use orchestrator::{
    check_f18a, merge_restored_settings, OrchestrationContext, RestoreOutcome, SaveOutcome,
    StateOrchestrator,
};
pub use resolver::CartridgeResolver;
pub use settings::{Setting, Settings, SettingsStore};
pub use software::{
    parse_module, AssetModuleLoader, CatalogEntry, JsonCatalog, ModuleImage, ModuleLoader,
    Software, SoftwareCatalog,
};
pub use store::{JsonFileStore, MemoryStore, StateStore};
