//! Save and restore of the full machine state.
//!
//! Saving writes, in order: disk images (after clearing the old ones), drive
//! state, then the machine snapshot. Restoring reads all three and checks
//! the snapshot against the live F18A setting before anything is applied;
//! a failed or rejected restore leaves the machine, disk images, settings
//! and tape state untouched.

use crate::bus::{CommandBus, EventBus};
use crate::config::MACHINE_STATE_KEY;
use crate::disk::{resolve_drives, DiskDrive, DiskImageSet};
use crate::error::{CoreError, CoreResult};
use crate::log::Log;
use crate::machine::{MachineHandle, MachineSnapshot};
use crate::settings::{Settings, SettingsStore};
use crate::store::StateStore;

/// What the save/restore pipelines operate on.
#[derive(Debug, Clone)]
pub struct OrchestrationContext {
    pub machine: MachineHandle,
    pub disk_images: DiskImageSet,
}

impl OrchestrationContext {
    pub fn new(machine: MachineHandle, disk_images: DiskImageSet) -> Self {
        Self {
            machine,
            disk_images,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The store is unavailable; nothing was attempted.
    Unsupported,
    /// A step failed; later steps were not run.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    /// The snapshot does not match the live F18A setting.
    Rejected,
    /// A store read or machine access failed.
    Failed,
}

/// Everything read back from the store, not yet applied.
struct StagedRestore {
    images: DiskImageSet,
    drives: Vec<DiskDrive>,
    snapshot: MachineSnapshot,
}

/// Sequences save and restore across the store, settings and machine.
pub struct StateOrchestrator<S> {
    store: S,
    settings: SettingsStore,
    commands: CommandBus,
    events: EventBus,
    log: Log,
    state_key: String,
}

impl<S: StateStore> StateOrchestrator<S> {
    pub fn new(
        store: S,
        settings: SettingsStore,
        commands: CommandBus,
        events: EventBus,
        log: Log,
    ) -> Self {
        Self {
            store,
            settings,
            commands,
            events,
            log,
            state_key: MACHINE_STATE_KEY.to_string(),
        }
    }

    /// Store snapshots under `key` instead of the default.
    pub fn with_state_key(mut self, key: impl Into<String>) -> Self {
        self.state_key = key.into();
        self
    }

    pub fn with_log(mut self, log: Log) -> Self {
        self.log = log;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist disk images, drives and the machine snapshot.
    pub async fn save_state(&self, ctx: &OrchestrationContext) -> SaveOutcome {
        if !self.store.is_supported() {
            return SaveOutcome::Unsupported;
        }
        match self.run_save(ctx).await {
            Ok(()) => SaveOutcome::Saved,
            Err(e) => {
                self.log.error(e.to_string());
                SaveOutcome::Failed
            }
        }
    }

    async fn run_save(&self, ctx: &OrchestrationContext) -> CoreResult<()> {
        self.store.delete_all_disk_images().await?;
        self.log.info("Disk images cleared.");

        self.store
            .save_disk_images(&ctx.disk_images.to_vec())
            .await?;
        self.log.info("Disk images saved OK.");

        let drives = ctx.machine.with(|core| core.disk_drives())?;
        self.store.save_disk_drives(&drives).await?;
        self.log.info("Disk drives saved OK.");

        let snapshot = ctx.machine.with(|core| core.state())?;
        self.store
            .put_machine_state(&self.state_key, &snapshot)
            .await?;
        self.log.info("Machine state saved OK.");
        Ok(())
    }

    /// Restore the last saved state into `ctx`.
    ///
    /// A running machine is stopped first and resumed only on success.
    pub async fn restore_state(&self, ctx: &mut OrchestrationContext) -> RestoreOutcome {
        let was_running = match ctx.machine.with(|core| core.is_running()) {
            Ok(running) => running,
            Err(e) => {
                self.log.error(e.to_string());
                return RestoreOutcome::Failed;
            }
        };
        if was_running {
            self.commands.stop();
        }

        let staged = match self.stage_restore().await {
            Ok(staged) => staged,
            Err(e) => {
                self.log.error(e.to_string());
                return match e {
                    CoreError::F18aMismatch { .. } => RestoreOutcome::Rejected,
                    _ => RestoreOutcome::Failed,
                };
            }
        };

        match self.apply_restore(ctx, staged, was_running) {
            Ok(()) => RestoreOutcome::Restored,
            Err(e) => {
                self.log.error(e.to_string());
                RestoreOutcome::Failed
            }
        }
    }

    async fn stage_restore(&self) -> CoreResult<StagedRestore> {
        let images: DiskImageSet = self.store.get_disk_images().await?.into_iter().collect();
        let drives = self.store.get_disk_drives().await?;
        let snapshot = self.store.get_machine_state(&self.state_key).await?;
        check_f18a(&snapshot, self.settings.is_f18a_enabled())?;
        Ok(StagedRestore {
            images,
            drives,
            snapshot,
        })
    }

    fn apply_restore(
        &self,
        ctx: &mut OrchestrationContext,
        staged: StagedRestore,
        was_running: bool,
    ) -> CoreResult<()> {
        let StagedRestore {
            images,
            drives,
            snapshot,
        } = staged;

        // Settings hit the disk, so they are committed before anything else
        let merged = merge_restored_settings(&self.settings.get(), &snapshot);
        let changes = self.settings.restore_settings(merged)?;

        ctx.disk_images = images;
        self.log.info("Disk images restored OK.");

        ctx.machine.with(|core| -> CoreResult<()> {
            let live = core.disk_drives();
            for (name, image) in resolve_drives(&drives, &ctx.disk_images) {
                match live.iter().position(|drive| drive.name == name) {
                    Some(index) => core.insert_disk(index, image)?,
                    None => self.log.warn(format!("Unknown disk drive {name}")),
                }
            }
            Ok(())
        })??;
        self.log.info("Disk drives restored OK.");

        ctx.machine.with(|core| core.restore_state(&snapshot))?;
        self.log.info("Console state restored");

        for (setting, value) in changes {
            self.commands.change_setting(setting, value);
        }

        if snapshot.tape.record_pressed {
            self.events.tape_recording();
        } else if snapshot.tape.play_pressed {
            self.events.tape_playing();
        } else {
            let tape = ctx.machine.with(|core| core.tape_status())?;
            self.events
                .tape_stopped(tape.play_enabled, tape.rewind_enabled);
        }

        self.commands.set_breakpoint_address(snapshot.cpu.breakpoint);

        if was_running {
            self.commands.start();
        } else {
            ctx.machine.with(|core| core.mute())?;
        }

        self.events.state_restored();
        self.log.info("Machine state restored OK.");
        Ok(())
    }
}

/// Fail unless the snapshot's F18A marker agrees with the live setting.
pub fn check_f18a(snapshot: &MachineSnapshot, f18a_enabled: bool) -> CoreResult<()> {
    match (snapshot.has_f18a(), f18a_enabled) {
        (true, false) => Err(CoreError::F18aMismatch { required: true }),
        (false, true) => Err(CoreError::F18aMismatch { required: false }),
        _ => Ok(()),
    }
}

/// Settings after a restore: machine-level toggles come from the snapshot,
/// front-end preferences are kept from the live settings.
pub fn merge_restored_settings(live: &Settings, snapshot: &MachineSnapshot) -> Settings {
    Settings {
        sound_enabled: live.sound_enabled,
        speech_enabled: snapshot.speech.enabled,
        ram_32k_enabled: snapshot.memory.enable_32k_ram,
        f18a_enabled: live.f18a_enabled,
        flicker_enabled: snapshot.vdp.enable_flicker,
        pc_keyboard_enabled: snapshot.keyboard.pc_keyboard_enabled,
        map_arrow_keys_enabled: snapshot.keyboard.map_arrow_keys_to_fctn_sdex,
        google_drive_enabled: live.google_drive_enabled,
        ams_enabled: snapshot.memory.enable_ams,
        gram_enabled: snapshot.memory.enable_gram,
        pixelated_enabled: live.pixelated_enabled,
        pause_on_focus_lost_enabled: live.pause_on_focus_lost_enabled,
    }
}
