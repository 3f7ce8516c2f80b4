//! Chain presets
//!
//! A preset captures one track's insert chain: which processor sits in each
//! slot, its bypass and mix state, and every parameter that differs from the
//! kind's default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::InsertError;
use crate::insert_chain::MAX_INSERT_SLOTS;
use crate::params::PARAM_TABLE_VERSION;
use crate::processor::ProcessorKind;

/// One loaded slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotPreset {
    pub slot: usize,
    /// Canonical processor id (aliases are accepted on import)
    pub processor: String,
    #[serde(default)]
    pub bypassed: bool,
    #[serde(default = "default_mix")]
    pub mix: f64,
    /// Parameter index → value; omitted indices keep their default
    #[serde(default)]
    pub params: BTreeMap<usize, f64>,
}

fn default_mix() -> f64 {
    1.0
}

/// Serialized insert chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainPreset {
    /// Parameter table version the indices refer to
    pub version: u32,
    pub slots: Vec<SlotPreset>,
}

impl Default for ChainPreset {
    fn default() -> Self {
        Self {
            version: PARAM_TABLE_VERSION,
            slots: Vec::new(),
        }
    }
}

impl ChainPreset {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, InsertError> {
        serde_json::from_str(json).map_err(|e| InsertError::InvalidPreset(e.to_string()))
    }

    /// Check the whole preset and resolve every processor id
    ///
    /// Returns the kinds in `slots` order. Nothing is applied anywhere, so a
    /// failure here leaves the target chain untouched.
    pub fn validate(&self) -> Result<Vec<ProcessorKind>, InsertError> {
        if self.version != PARAM_TABLE_VERSION {
            return Err(InsertError::InvalidPreset(format!(
                "parameter table version {} (expected {PARAM_TABLE_VERSION})",
                self.version
            )));
        }

        let mut seen = [false; MAX_INSERT_SLOTS];
        let mut kinds = Vec::with_capacity(self.slots.len());
        for entry in &self.slots {
            let Some(taken) = seen.get_mut(entry.slot) else {
                return Err(InsertError::InvalidSlot(entry.slot));
            };
            if *taken {
                return Err(InsertError::InvalidPreset(format!(
                    "slot {} listed twice",
                    entry.slot
                )));
            }
            *taken = true;

            let kind: ProcessorKind = entry.processor.parse()?;
            if !entry.mix.is_finite() {
                return Err(InsertError::InvalidValue(entry.mix));
            }
            let count = kind.param_count();
            for (&index, &value) in &entry.params {
                if index >= count {
                    return Err(InsertError::ParamIndexOutOfRange { index, count });
                }
                if !value.is_finite() {
                    return Err(InsertError::InvalidValue(value));
                }
            }
            kinds.push(kind);
        }
        Ok(kinds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compressor_slot() -> SlotPreset {
        SlotPreset {
            slot: 0,
            processor: "compressor".into(),
            bypassed: false,
            mix: 1.0,
            params: BTreeMap::from([(0, -18.0), (1, 4.0)]),
        }
    }

    #[test]
    fn test_json_defaults_for_missing_fields() {
        let preset = ChainPreset::from_json(
            r#"{ "version": 1, "slots": [ { "slot": 3, "processor": "comp" } ] }"#,
        )
        .unwrap();
        assert_eq!(preset.slots[0].mix, 1.0);
        assert!(!preset.slots[0].bypassed);
        assert!(preset.slots[0].params.is_empty());
        assert_eq!(preset.validate().unwrap(), vec![ProcessorKind::Compressor]);
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let mut preset = ChainPreset {
            version: PARAM_TABLE_VERSION,
            slots: vec![compressor_slot()],
        };
        assert!(preset.validate().is_ok());

        preset.slots[0].params.insert(9, 0.0);
        assert_eq!(
            preset.validate(),
            Err(InsertError::ParamIndexOutOfRange { index: 9, count: 9 })
        );
        preset.slots[0].params.remove(&9);

        preset.slots.push(compressor_slot());
        assert!(matches!(preset.validate(), Err(InsertError::InvalidPreset(_))));
        preset.slots.pop();

        preset.slots[0].slot = MAX_INSERT_SLOTS;
        assert_eq!(preset.validate(), Err(InsertError::InvalidSlot(MAX_INSERT_SLOTS)));
        preset.slots[0].slot = 0;

        preset.slots[0].processor = "tape-echo".into();
        assert!(matches!(
            preset.validate(),
            Err(InsertError::UnknownProcessorType(_))
        ));
    }

    #[test]
    fn test_version_mismatch() {
        let preset = ChainPreset {
            version: PARAM_TABLE_VERSION + 1,
            slots: Vec::new(),
        };
        assert!(matches!(preset.validate(), Err(InsertError::InvalidPreset(_))));
        assert!(matches!(
            ChainPreset::from_json("{ not json"),
            Err(InsertError::InvalidPreset(_))
        ));
    }
}
