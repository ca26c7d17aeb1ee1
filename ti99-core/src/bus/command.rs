//! User-intent commands and the bus that carries them.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{Bus, Subscription};
use crate::settings::Setting;
use crate::software::Software;

/// Tag of a `Command`, the closed set of command types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Start,
    Fast,
    Frame,
    Step,
    Stop,
    Reset,
    OpenModule,
    OpenDisk,
    ChangeSetting,
    SaveState,
    RestoreState,
    LoadSoftware,
    SetBreakpoint,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandType::Start => "START",
            CommandType::Fast => "FAST",
            CommandType::Frame => "FRAME",
            CommandType::Step => "STEP",
            CommandType::Stop => "STOP",
            CommandType::Reset => "RESET",
            CommandType::OpenModule => "OPEN_MODULE",
            CommandType::OpenDisk => "OPEN_DISK",
            CommandType::ChangeSetting => "CHANGE_SETTING",
            CommandType::SaveState => "SAVE_STATE",
            CommandType::RestoreState => "RESTORE_STATE",
            CommandType::LoadSoftware => "LOAD_SOFTWARE",
            CommandType::SetBreakpoint => "SET_BREAKPOINT",
        };
        f.write_str(name)
    }
}

/// A request from the UI layer. The payload is fixed by the variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Fast,
    Frame,
    Step,
    Stop,
    Reset,
    OpenModule(PathBuf),
    OpenDisk {
        files: Vec<PathBuf>,
        drive_index: usize,
    },
    ChangeSetting {
        setting: Setting,
        value: bool,
    },
    SaveState,
    RestoreState,
    LoadSoftware(Arc<Software>),
    SetBreakpoint(Option<u16>),
}

impl Command {
    pub fn kind(&self) -> CommandType {
        match self {
            Command::Start => CommandType::Start,
            Command::Fast => CommandType::Fast,
            Command::Frame => CommandType::Frame,
            Command::Step => CommandType::Step,
            Command::Stop => CommandType::Stop,
            Command::Reset => CommandType::Reset,
            Command::OpenModule(_) => CommandType::OpenModule,
            Command::OpenDisk { .. } => CommandType::OpenDisk,
            Command::ChangeSetting { .. } => CommandType::ChangeSetting,
            Command::SaveState => CommandType::SaveState,
            Command::RestoreState => CommandType::RestoreState,
            Command::LoadSoftware(_) => CommandType::LoadSoftware,
            Command::SetBreakpoint(_) => CommandType::SetBreakpoint,
        }
    }
}

/// Bus for `Command`s, with one publisher method per command.
#[derive(Debug, Clone)]
pub struct CommandBus {
    bus: Bus<Command>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        Self {
            bus: Bus::new("commands"),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription<Command>
    where
        F: Fn(&Command) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: &Subscription<Command>) {
        self.bus.unsubscribe(subscription);
    }

    pub fn publish(&self, command: Command) {
        self.bus.publish(command);
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    pub fn start(&self) {
        self.publish(Command::Start);
    }

    pub fn fast(&self) {
        self.publish(Command::Fast);
    }

    pub fn frame(&self) {
        self.publish(Command::Frame);
    }

    pub fn step(&self) {
        self.publish(Command::Step);
    }

    /// Publish STOP.
    pub fn stop(&self) {
        self.publish(Command::Stop);
    }

    pub fn reset(&self) {
        self.publish(Command::Reset);
    }

    pub fn open_module(&self, file: impl Into<PathBuf>) {
        self.publish(Command::OpenModule(file.into()));
    }

    pub fn open_disk(&self, files: Vec<PathBuf>, drive_index: usize) {
        self.publish(Command::OpenDisk { files, drive_index });
    }

    pub fn change_setting(&self, setting: Setting, value: bool) {
        self.publish(Command::ChangeSetting { setting, value });
    }

    pub fn save_state(&self) {
        self.publish(Command::SaveState);
    }

    pub fn restore_state(&self) {
        self.publish(Command::RestoreState);
    }

    pub fn load_software(&self, software: Software) {
        self.publish(Command::LoadSoftware(Arc::new(software)));
    }

    pub fn set_breakpoint_address(&self, address: Option<u16>) {
        self.publish(Command::SetBreakpoint(address));
    }
}
