//! Serializable machine snapshot.
//!
//! Only the fields the orchestrator inspects are typed. Everything else a
//! machine core puts in its snapshot is kept in the `other` maps and written
//! back untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuState {
    #[serde(default)]
    pub breakpoint: Option<u16>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdpState {
    /// F18A GPU state. Present only when the snapshot was taken with the
    /// enhanced-graphics adapter enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu: Option<Value>,
    #[serde(default)]
    pub enable_flicker: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryState {
    #[serde(rename = "enable32KRAM", default)]
    pub enable_32k_ram: bool,
    #[serde(rename = "enableAMS", default)]
    pub enable_ams: bool,
    #[serde(rename = "enableGRAM", default)]
    pub enable_gram: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyboardState {
    #[serde(default)]
    pub pc_keyboard_enabled: bool,
    #[serde(rename = "mapArrowKeysToFctnSDEX", default)]
    pub map_arrow_keys_to_fctn_sdex: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TapeState {
    #[serde(default)]
    pub record_pressed: bool,
    #[serde(default)]
    pub play_pressed: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeechState {
    #[serde(default)]
    pub enabled: bool,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Full machine state as produced by `MachineCore::state`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    #[serde(default)]
    pub cpu: CpuState,
    #[serde(default)]
    pub vdp: VdpState,
    #[serde(default)]
    pub memory: MemoryState,
    #[serde(default)]
    pub keyboard: KeyboardState,
    #[serde(default)]
    pub tape: TapeState,
    #[serde(default)]
    pub speech: SpeechState,
    /// Subsystems not inspected here (psg, tms5220, disk controller, ...).
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl MachineSnapshot {
    /// True if the video state carries the F18A GPU marker.
    pub fn has_f18a(&self) -> bool {
        self.vdp.gpu.as_ref().is_some_and(Value::is_object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_keeps_unknown_fields() {
        let raw = json!({
            "cpu": { "breakpoint": 40960, "pc": 1024, "wp": 33536 },
            "vdp": { "gpu": { "pc": 0 }, "enableFlicker": true, "registers": [0, 1] },
            "memory": { "enable32KRAM": true, "enableAMS": false, "enableGRAM": true },
            "keyboard": { "pcKeyboardEnabled": true, "mapArrowKeysToFctnSDEX": false },
            "tape": { "recordPressed": false, "playPressed": true },
            "speech": { "enabled": true },
            "psg": { "volume": [15, 15, 15, 15] }
        });

        let snapshot: MachineSnapshot = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(snapshot.cpu.breakpoint, Some(0xA000));
        assert!(snapshot.has_f18a());
        assert!(snapshot.vdp.enable_flicker);
        assert!(snapshot.memory.enable_32k_ram);
        assert!(snapshot.memory.enable_gram);
        assert!(snapshot.tape.play_pressed);
        assert!(snapshot.other.contains_key("psg"));
        assert_eq!(snapshot.cpu.other.get("pc"), Some(&json!(1024)));

        assert_eq!(serde_json::to_value(&snapshot).unwrap(), raw);
    }

    #[test]
    fn test_f18a_marker() {
        let mut snapshot = MachineSnapshot::default();
        assert!(!snapshot.has_f18a());

        snapshot.vdp.gpu = Some(Value::Null);
        assert!(!snapshot.has_f18a());

        snapshot.vdp.gpu = Some(json!({}));
        assert!(snapshot.has_f18a());
    }

    #[test]
    fn test_missing_sections_default() {
        let snapshot: MachineSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot, MachineSnapshot::default());
    }
}
