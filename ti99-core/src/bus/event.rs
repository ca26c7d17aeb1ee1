//! Machine status events and the bus that carries them.

use std::fmt;

use super::{Bus, Subscription};
use crate::machine::MachineHandle;

/// Tag of a `ConsoleEvent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleEventType {
    Ready,
    Started,
    Stopped,
    TapeRecording,
    TapePlaying,
    TapeStopped,
    StateRestored,
}

impl fmt::Display for ConsoleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsoleEventType::Ready => "READY",
            ConsoleEventType::Started => "STARTED",
            ConsoleEventType::Stopped => "STOPPED",
            ConsoleEventType::TapeRecording => "TAPE_RECORDING",
            ConsoleEventType::TapePlaying => "TAPE_PLAYING",
            ConsoleEventType::TapeStopped => "TAPE_STOPPED",
            ConsoleEventType::StateRestored => "STATE_RESTORED",
        };
        f.write_str(name)
    }
}

/// A status change reported by the machine core.
#[derive(Debug, Clone)]
pub enum ConsoleEvent {
    /// The machine core is constructed and can be driven.
    Ready(MachineHandle),
    Started,
    Stopped,
    TapeRecording,
    TapePlaying,
    TapeStopped {
        play_enabled: bool,
        rewind_enabled: bool,
    },
    StateRestored,
}

impl ConsoleEvent {
    pub fn kind(&self) -> ConsoleEventType {
        match self {
            ConsoleEvent::Ready(_) => ConsoleEventType::Ready,
            ConsoleEvent::Started => ConsoleEventType::Started,
            ConsoleEvent::Stopped => ConsoleEventType::Stopped,
            ConsoleEvent::TapeRecording => ConsoleEventType::TapeRecording,
            ConsoleEvent::TapePlaying => ConsoleEventType::TapePlaying,
            ConsoleEvent::TapeStopped { .. } => ConsoleEventType::TapeStopped,
            ConsoleEvent::StateRestored => ConsoleEventType::StateRestored,
        }
    }
}

/// Bus for `ConsoleEvent`s.
#[derive(Debug, Clone)]
pub struct EventBus {
    bus: Bus<ConsoleEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            bus: Bus::new("events"),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription<ConsoleEvent>
    where
        F: Fn(&ConsoleEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, subscription: &Subscription<ConsoleEvent>) {
        self.bus.unsubscribe(subscription);
    }

    pub fn publish(&self, event: ConsoleEvent) {
        self.bus.publish(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }

    pub fn ready(&self, machine: MachineHandle) {
        self.publish(ConsoleEvent::Ready(machine));
    }

    pub fn started(&self) {
        self.publish(ConsoleEvent::Started);
    }

    pub fn stopped(&self) {
        self.publish(ConsoleEvent::Stopped);
    }

    pub fn tape_recording(&self) {
        self.publish(ConsoleEvent::TapeRecording);
    }

    pub fn tape_playing(&self) {
        self.publish(ConsoleEvent::TapePlaying);
    }

    pub fn tape_stopped(&self, play_enabled: bool, rewind_enabled: bool) {
        self.publish(ConsoleEvent::TapeStopped {
            play_enabled,
            rewind_enabled,
        });
    }

    pub fn state_restored(&self) {
        self.publish(ConsoleEvent::StateRestored);
    }
}
