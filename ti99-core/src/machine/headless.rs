//! Machine core with no emulation behind it.
//!
//! Tracks run state, drives, loaded software and settings so the front end
//! can be driven end to end without hardware simulation. Every mutating
//! call is appended to a journal that tests can inspect.

use serde_json::{json, Value};

use super::{MachineCore, MachineSnapshot, TapeStatus};
use crate::disk::{DiskDrive, DiskImage};
use crate::error::{CoreError, CoreResult};
use crate::settings::{Setting, Settings};
use crate::software::Software;

/// Number of floppy drives on the console's disk controller.
pub const DRIVE_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct HeadlessMachine {
    running: bool,
    fast: bool,
    frames: u64,
    steps: u64,
    software: Option<String>,
    breakpoint: Option<u16>,
    drives: Vec<DiskDrive>,
    snapshot: MachineSnapshot,
    settings: Settings,
    tape: TapeStatus,
    muted: bool,
    typed: Vec<String>,
    journal: Vec<String>,
}

impl Default for HeadlessMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessMachine {
    pub fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    /// Create a core configured from `settings`.
    pub fn with_settings(settings: &Settings) -> Self {
        Self {
            running: false,
            fast: false,
            frames: 0,
            steps: 0,
            software: None,
            breakpoint: None,
            drives: (1..=DRIVE_COUNT)
                .map(|n| DiskDrive::empty(format!("DSK{n}")))
                .collect(),
            snapshot: MachineSnapshot::default(),
            settings: settings.clone(),
            tape: TapeStatus::default(),
            muted: false,
            typed: Vec::new(),
            journal: Vec::new(),
        }
    }

    /// Names of the mutating calls made so far, oldest first.
    pub fn journal(&self) -> &[String] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn software(&self) -> Option<&str> {
        self.software.as_deref()
    }

    pub fn breakpoint(&self) -> Option<u16> {
        self.breakpoint
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_fast(&self) -> bool {
        self.fast
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Keystroke sequences injected so far.
    pub fn typed(&self) -> &[String] {
        &self.typed
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Set what the tape deck reports as available.
    pub fn set_tape_status(&mut self, tape: TapeStatus) {
        self.tape = tape;
    }

    /// Seed the state returned by `state()`.
    pub fn set_snapshot(&mut self, snapshot: MachineSnapshot) {
        self.snapshot = snapshot;
    }

    fn record(&mut self, call: impl Into<String>) {
        self.journal.push(call.into());
    }
}

impl MachineCore for HeadlessMachine {
    fn is_running(&self) -> bool {
        self.running
    }

    fn start(&mut self) {
        self.running = true;
        self.fast = false;
        self.muted = false;
        self.record("start");
    }

    fn fast(&mut self) {
        self.running = true;
        self.fast = true;
        self.muted = false;
        self.record("fast");
    }

    fn frame(&mut self) {
        self.running = false;
        self.frames += 1;
        self.record("frame");
    }

    fn step(&mut self) {
        self.running = false;
        self.steps += 1;
        self.record("step");
    }

    fn stop(&mut self) {
        self.running = false;
        self.record("stop");
    }

    fn reset(&mut self) {
        self.frames = 0;
        self.steps = 0;
        self.record("reset");
    }

    fn load_software(&mut self, software: &Software) {
        self.software = Some(software.name.clone());
        self.record(format!("load_software {}", software.name));
    }

    fn set_breakpoint(&mut self, address: Option<u16>) {
        self.breakpoint = address;
        self.record("set_breakpoint");
    }

    fn disk_drives(&self) -> Vec<DiskDrive> {
        self.drives.clone()
    }

    fn insert_disk(&mut self, index: usize, image: Option<&DiskImage>) -> CoreResult<()> {
        let drive = self
            .drives
            .get_mut(index)
            .ok_or(CoreError::InvalidDrive(index))?;
        drive.disk_image = image.map(|image| image.name.clone());
        self.record(format!("insert_disk {index}"));
        Ok(())
    }

    fn state(&self) -> MachineSnapshot {
        let mut snapshot = self.snapshot.clone();
        snapshot.cpu.breakpoint = self.breakpoint;
        snapshot.vdp.gpu = self.settings.f18a_enabled.then(|| json!({}));
        snapshot.vdp.enable_flicker = self.settings.flicker_enabled;
        snapshot.memory.enable_32k_ram = self.settings.ram_32k_enabled;
        snapshot.memory.enable_ams = self.settings.ams_enabled;
        snapshot.memory.enable_gram = self.settings.gram_enabled;
        snapshot.keyboard.pc_keyboard_enabled = self.settings.pc_keyboard_enabled;
        snapshot.keyboard.map_arrow_keys_to_fctn_sdex = self.settings.map_arrow_keys_enabled;
        snapshot.speech.enabled = self.settings.speech_enabled;
        if let Some(name) = &self.software {
            snapshot
                .other
                .insert("software".to_string(), Value::String(name.clone()));
        }
        snapshot
    }

    fn restore_state(&mut self, snapshot: &MachineSnapshot) {
        self.snapshot = snapshot.clone();
        self.breakpoint = snapshot.cpu.breakpoint;
        self.software = snapshot
            .other
            .get("software")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.record("restore_state");
    }

    fn tape_status(&self) -> TapeStatus {
        self.tape
    }

    fn mute(&mut self) {
        self.muted = true;
        self.record("mute");
    }

    fn apply_setting(&mut self, setting: Setting, value: bool) {
        self.settings.set(setting, value);
        self.record(format!("apply_setting {setting}"));
    }

    fn simulate_key_presses(&mut self, keys: &str) {
        self.typed.push(keys.to_string());
        self.record("simulate_key_presses");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_reflects_settings() {
        let mut settings = Settings::default();
        settings.f18a_enabled = true;
        settings.gram_enabled = true;
        let machine = HeadlessMachine::with_settings(&settings);

        let state = machine.state();
        assert!(state.has_f18a());
        assert!(state.memory.enable_gram);
    }

    #[test]
    fn test_insert_disk_bounds() {
        let mut machine = HeadlessMachine::new();
        let image = DiskImage::blank("FLOPPY A");
        machine.insert_disk(0, Some(&image)).unwrap();
        assert_eq!(
            machine.disk_drives()[0].disk_image.as_deref(),
            Some("FLOPPY A")
        );
        assert!(matches!(
            machine.insert_disk(DRIVE_COUNT, None),
            Err(CoreError::InvalidDrive(3))
        ));
    }

    #[test]
    fn test_restore_round_trip() {
        let mut source = HeadlessMachine::new();
        source.load_software(&Software::new("Parsec", "parsec.rpk"));
        source.set_breakpoint(Some(0x8300));

        let mut target = HeadlessMachine::new();
        target.restore_state(&source.state());
        assert_eq!(target.software(), Some("Parsec"));
        assert_eq!(target.breakpoint(), Some(0x8300));
        assert_eq!(target.journal(), ["restore_state"]);
    }
}
