//! Machine-core contract.
//!
//! The emulated hardware is an external collaborator. This module defines
//! what the front end needs from it:
//! - `MachineCore`: run control, snapshot, drives, tape, audio, keyboard
//! - `MachineHandle`: the shared handle carried by the READY event
//! - `bind_machine`: routes run-control commands from the bus to a core
//! - `HeadlessMachine`: a core with no emulation, for tests and the CLI

mod headless;
mod snapshot;

pub use headless::HeadlessMachine;
pub use snapshot::{
    CpuState, KeyboardState, MachineSnapshot, MemoryState, SpeechState, TapeState, VdpState,
};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::bus::{Command, CommandBus, EventBus, Subscription};
use crate::disk::{DiskDrive, DiskImage};
use crate::error::CoreResult;
use crate::settings::Setting;
use crate::software::Software;

/// Tape deck controls currently available on the live hardware.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapeStatus {
    pub play_enabled: bool,
    pub rewind_enabled: bool,
}

/// Interface to the emulated machine.
pub trait MachineCore: Send {
    fn is_running(&self) -> bool;

    /// Run continuously at normal speed.
    fn start(&mut self);

    /// Run continuously as fast as possible.
    fn fast(&mut self);

    /// Run a single frame, then stop.
    fn frame(&mut self);

    /// Execute a single instruction, then stop.
    fn step(&mut self);

    fn stop(&mut self);

    fn reset(&mut self);

    fn load_software(&mut self, software: &Software);

    fn set_breakpoint(&mut self, address: Option<u16>);

    /// Live state of every drive, in drive order.
    fn disk_drives(&self) -> Vec<DiskDrive>;

    /// Insert `image` into drive `index`, or eject when `None`.
    fn insert_disk(&mut self, index: usize, image: Option<&DiskImage>) -> CoreResult<()>;

    /// Capture the full machine state.
    fn state(&self) -> MachineSnapshot;

    /// Replace the machine state with `snapshot`.
    fn restore_state(&mut self, snapshot: &MachineSnapshot);

    fn tape_status(&self) -> TapeStatus;

    /// Silence the sound generator.
    fn mute(&mut self);

    fn apply_setting(&mut self, setting: Setting, value: bool);

    /// Queue keystrokes as if typed on the console keyboard.
    fn simulate_key_presses(&mut self, keys: &str);
}

/// Shared handle to the single live machine core.
///
/// Clone is cheap (just clones the Arc). Never hold the guard across an
/// `.await` or while publishing on a bus.
#[derive(Clone)]
pub struct MachineHandle {
    inner: Arc<Mutex<dyn MachineCore>>,
}

impl MachineHandle {
    pub fn new(core: impl MachineCore + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(core)),
        }
    }

    /// Wrap a core the caller keeps a typed reference to.
    pub fn from_shared<M: MachineCore + 'static>(core: Arc<Mutex<M>>) -> Self {
        Self { inner: core }
    }

    /// Lock the core. A call that panicked while holding the lock does not
    /// take the core down with it; later callers still get the guard.
    pub fn lock(&self) -> CoreResult<MutexGuard<'_, dyn MachineCore + 'static>> {
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Run `f` with the core locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn MachineCore) -> R) -> CoreResult<R> {
        let mut core = self.lock()?;
        Ok(f(&mut *core))
    }

    /// True if both handles point at the same core.
    pub fn same_core(&self, other: &MachineHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle").finish_non_exhaustive()
    }
}

/// Route run-control commands to `machine`.
///
/// START and FAST emit STARTED; STOP emits STOPPED. The core lock is
/// released before any event is published.
pub fn bind_machine(
    machine: MachineHandle,
    commands: &CommandBus,
    events: EventBus,
) -> Subscription<Command> {
    commands.subscribe(move |command| {
        let routed = machine.with(|core| match command {
            Command::Start => {
                core.start();
                Some(true)
            }
            Command::Fast => {
                core.fast();
                Some(true)
            }
            Command::Stop => {
                core.stop();
                Some(false)
            }
            Command::Frame => {
                core.frame();
                None
            }
            Command::Step => {
                core.step();
                None
            }
            Command::Reset => {
                core.reset();
                None
            }
            Command::LoadSoftware(software) => {
                core.load_software(software);
                None
            }
            Command::SetBreakpoint(address) => {
                core.set_breakpoint(*address);
                None
            }
            _ => None,
        });

        match routed {
            Ok(Some(true)) => events.started(),
            Ok(Some(false)) => events.stopped(),
            Ok(None) => {}
            Err(e) => log::error!("machine: cannot handle {}: {e}", command.kind()),
        }
    })
}
