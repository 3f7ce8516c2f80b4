//! Parameter tables
//!
//! Every processor kind publishes a fixed table mapping a flat parameter index
//! to a name, range, default and unit. The tables are a wire contract shared
//! with the control surface: an index never changes meaning without bumping
//! [`PARAM_TABLE_VERSION`].
//!
//! Band-oriented processors use composite addressing
//! `index = band * per_band + offset`, with global parameters after the last
//! band. The composite index is decoded once, when a command arrives, into a
//! [`ParamAddress`].

use serde::Serialize;

use crate::processor::ProcessorKind;

/// Version of the index → semantics tables below
pub const PARAM_TABLE_VERSION: u32 = 1;

/// Physical unit of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamUnit {
    Hz,
    Db,
    Ms,
    Seconds,
    Ratio,
    /// Unitless 0..1 (mix, width, amounts) or a stepped amount
    Linear,
    /// Stored as 0.0 / 1.0
    Toggle,
    /// Stored as an integer index into `choices`
    Choice,
}

/// One entry of a parameter table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub unit: ParamUnit,
    #[serde(skip_serializing_if = "no_choices")]
    pub choices: &'static [&'static str],
}

fn no_choices(choices: &&'static [&'static str]) -> bool {
    choices.is_empty()
}

impl ParamDescriptor {
    pub const fn new(name: &'static str, min: f64, max: f64, default: f64, unit: ParamUnit) -> Self {
        Self {
            name,
            min,
            max,
            default,
            unit,
            choices: &[],
        }
    }

    pub const fn toggle(name: &'static str, default: bool) -> Self {
        Self::new(name, 0.0, 1.0, if default { 1.0 } else { 0.0 }, ParamUnit::Toggle)
    }

    pub const fn choice(name: &'static str, choices: &'static [&'static str], default: usize) -> Self {
        Self {
            name,
            min: 0.0,
            max: (choices.len() - 1) as f64,
            default: default as f64,
            unit: ParamUnit::Choice,
            choices,
        }
    }

    /// Value as it will be stored: clamped to range, toggles to 0/1, choices rounded
    pub fn normalize(&self, value: f64) -> f64 {
        let v = value.clamp(self.min, self.max);
        match self.unit {
            ParamUnit::Toggle => {
                if v >= 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            ParamUnit::Choice => v.round(),
            _ => v,
        }
    }
}

/// Decoded parameter index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamAddress {
    Flat(usize),
    Band { band: usize, offset: usize },
    Global(usize),
}

/// Shape of a processor's parameter table
#[derive(Debug, Clone, Copy)]
pub enum ParamLayout {
    Flat(&'static [ParamDescriptor]),
    Banded {
        bands: usize,
        per_band: &'static [ParamDescriptor],
        global: &'static [ParamDescriptor],
    },
}

impl ParamLayout {
    /// Declared parameter count
    pub const fn count(&self) -> usize {
        match *self {
            Self::Flat(table) => table.len(),
            Self::Banded {
                bands,
                per_band,
                global,
            } => bands * per_band.len() + global.len(),
        }
    }

    pub fn resolve(&self, index: usize) -> Option<ParamAddress> {
        match *self {
            Self::Flat(table) => (index < table.len()).then_some(ParamAddress::Flat(index)),
            Self::Banded {
                bands,
                per_band,
                global,
            } => {
                let banded = bands * per_band.len();
                if index < banded {
                    Some(ParamAddress::Band {
                        band: index / per_band.len(),
                        offset: index % per_band.len(),
                    })
                } else if index - banded < global.len() {
                    Some(ParamAddress::Global(index - banded))
                } else {
                    None
                }
            }
        }
    }

    pub fn descriptor(&self, index: usize) -> Option<&'static ParamDescriptor> {
        match (*self, self.resolve(index)?) {
            (Self::Flat(table), ParamAddress::Flat(i)) => table.get(i),
            (Self::Banded { per_band, .. }, ParamAddress::Band { offset, .. }) => {
                per_band.get(offset)
            }
            (Self::Banded { global, .. }, ParamAddress::Global(i)) => global.get(i),
            _ => None,
        }
    }

    /// Defaults for every index, in index order
    pub fn defaults(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.count()).map(move |i| self.descriptor(i).map_or(0.0, |d| d.default))
    }
}

// ============ Dynamics ============

pub const COMPRESSOR_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Threshold", -60.0, 0.0, -20.0, ParamUnit::Db),
    ParamDescriptor::new("Ratio", 1.0, 20.0, 4.0, ParamUnit::Ratio),
    ParamDescriptor::new("Attack", 0.01, 500.0, 10.0, ParamUnit::Ms),
    ParamDescriptor::new("Release", 1.0, 5000.0, 100.0, ParamUnit::Ms),
    ParamDescriptor::new("Makeup", -24.0, 24.0, 0.0, ParamUnit::Db),
    ParamDescriptor::new("Mix", 0.0, 1.0, 1.0, ParamUnit::Linear),
    ParamDescriptor::new("Knee", 0.0, 24.0, 6.0, ParamUnit::Db),
    ParamDescriptor::choice("Type", &["VCA", "Opto", "FET"], 0),
    ParamDescriptor::new("Stereo Link", 0.0, 1.0, 1.0, ParamUnit::Linear),
];

pub const LIMITER_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Input Trim", -12.0, 24.0, 0.0, ParamUnit::Db),
    ParamDescriptor::new("Ceiling", -6.0, 0.0, -0.3, ParamUnit::Db),
    ParamDescriptor::new("Release", 10.0, 1000.0, 100.0, ParamUnit::Ms),
    ParamDescriptor::new("Lookahead", 0.5, 10.0, 1.5, ParamUnit::Ms),
    ParamDescriptor::choice("Oversampling", &["1x", "2x", "4x", "8x"], 2),
    ParamDescriptor::new("Stereo Link", 0.0, 1.0, 1.0, ParamUnit::Linear),
];

pub const GATE_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Threshold", -80.0, 0.0, -40.0, ParamUnit::Db),
    ParamDescriptor::new("Range", -80.0, 0.0, -80.0, ParamUnit::Db),
    ParamDescriptor::new("Attack", 0.01, 100.0, 1.0, ParamUnit::Ms),
    ParamDescriptor::new("Hold", 0.0, 500.0, 50.0, ParamUnit::Ms),
    ParamDescriptor::new("Release", 1.0, 1000.0, 100.0, ParamUnit::Ms),
    ParamDescriptor::new("Hysteresis", 0.0, 12.0, 0.0, ParamUnit::Db),
];

pub const EXPANDER_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Threshold", -80.0, 0.0, -30.0, ParamUnit::Db),
    ParamDescriptor::new("Ratio", 1.0, 20.0, 2.0, ParamUnit::Ratio),
    ParamDescriptor::new("Knee", 0.0, 24.0, 6.0, ParamUnit::Db),
    ParamDescriptor::new("Attack", 0.01, 500.0, 5.0, ParamUnit::Ms),
    ParamDescriptor::new("Release", 1.0, 5000.0, 100.0, ParamUnit::Ms),
    ParamDescriptor::new("Range", -80.0, 0.0, -60.0, ParamUnit::Db),
];

pub const DEESSER_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Frequency", 2000.0, 16000.0, 6500.0, ParamUnit::Hz),
    ParamDescriptor::new("Threshold", -60.0, 0.0, -30.0, ParamUnit::Db),
    ParamDescriptor::new("Range", 0.0, 24.0, 12.0, ParamUnit::Db),
    ParamDescriptor::new("Q", 0.3, 8.0, 1.5, ParamUnit::Ratio),
    ParamDescriptor::new("Attack", 0.1, 50.0, 1.0, ParamUnit::Ms),
    ParamDescriptor::new("Release", 5.0, 500.0, 50.0, ParamUnit::Ms),
    ParamDescriptor::choice("Mode", &["Wideband", "Split"], 0),
    ParamDescriptor::toggle("Listen", false),
];

// ============ Time-based ============

pub const REVERB_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Room Size", 0.0, 1.0, 0.5, ParamUnit::Linear),
    ParamDescriptor::new("Damping", 0.0, 1.0, 0.5, ParamUnit::Linear),
    ParamDescriptor::new("Width", 0.0, 1.0, 1.0, ParamUnit::Linear),
    ParamDescriptor::new("Mix", 0.0, 1.0, 0.3, ParamUnit::Linear),
    ParamDescriptor::new("PreDelay", 0.0, 200.0, 0.0, ParamUnit::Ms),
    ParamDescriptor::toggle("Freeze", false),
];

pub const ALGORITHMIC_REVERB_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Decay", 0.1, 20.0, 2.0, ParamUnit::Seconds),
    ParamDescriptor::new("Size", 0.0, 1.0, 0.5, ParamUnit::Linear),
    ParamDescriptor::new("Damping", 0.0, 1.0, 0.4, ParamUnit::Linear),
    ParamDescriptor::new("Diffusion", 0.0, 1.0, 0.7, ParamUnit::Linear),
    ParamDescriptor::new("PreDelay", 0.0, 250.0, 10.0, ParamUnit::Ms),
    ParamDescriptor::new("Width", 0.0, 2.0, 1.0, ParamUnit::Linear),
    ParamDescriptor::new("Mix", 0.0, 1.0, 0.3, ParamUnit::Linear),
];

pub const DELAY_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Time", 1.0, 2000.0, 375.0, ParamUnit::Ms),
    ParamDescriptor::new("Feedback", 0.0, 0.95, 0.4, ParamUnit::Linear),
    ParamDescriptor::new("Mix", 0.0, 1.0, 0.3, ParamUnit::Linear),
    ParamDescriptor::new("Ping-Pong", 0.0, 1.0, 1.0, ParamUnit::Linear),
    ParamDescriptor::new("HP Freq", 20.0, 2000.0, 80.0, ParamUnit::Hz),
    ParamDescriptor::new("LP Freq", 200.0, 20000.0, 8000.0, ParamUnit::Hz),
];

// ============ Color ============

pub const SATURATOR_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Drive", -20.0, 40.0, 0.0, ParamUnit::Db),
    ParamDescriptor::choice(
        "Type",
        &["Tape", "Tube", "Transistor", "Soft Clip", "Hard Clip", "Foldback"],
        0,
    ),
    ParamDescriptor::new("Mix", 0.0, 1.0, 1.0, ParamUnit::Linear),
    ParamDescriptor::new("Output", -24.0, 12.0, 0.0, ParamUnit::Db),
];

// ============ EQ ============

pub const PULTEC_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Low Boost", 0.0, 10.0, 0.0, ParamUnit::Linear),
    ParamDescriptor::new("Low Atten", 0.0, 10.0, 0.0, ParamUnit::Linear),
    ParamDescriptor::choice("Low Freq", &["20 Hz", "30 Hz", "60 Hz", "100 Hz"], 2),
    ParamDescriptor::new("High Boost", 0.0, 10.0, 0.0, ParamUnit::Linear),
    ParamDescriptor::choice(
        "High Boost Freq",
        &["3 kHz", "4 kHz", "5 kHz", "8 kHz", "10 kHz", "12 kHz", "16 kHz"],
        3,
    ),
    ParamDescriptor::new("Bandwidth", 0.0, 1.0, 0.5, ParamUnit::Linear),
    ParamDescriptor::new("High Atten", 0.0, 10.0, 0.0, ParamUnit::Linear),
    ParamDescriptor::choice("High Atten Freq", &["5 kHz", "10 kHz", "20 kHz"], 1),
    ParamDescriptor::new("Output", -12.0, 12.0, 0.0, ParamUnit::Db),
];

pub const PRO_EQ_BANDS: usize = 64;

/// Per-band offsets of the pro-eq table
pub mod eq_band {
    pub const FREQUENCY: usize = 0;
    pub const GAIN: usize = 1;
    pub const Q: usize = 2;
    pub const ENABLED: usize = 3;
    pub const SHAPE: usize = 4;
    pub const DYN_ENABLED: usize = 5;
    pub const DYN_THRESHOLD: usize = 6;
    pub const DYN_RATIO: usize = 7;
    pub const DYN_ATTACK: usize = 8;
    pub const DYN_RELEASE: usize = 9;
    pub const DYN_RANGE: usize = 10;
}

pub const PRO_EQ_BAND_PARAMS: &[ParamDescriptor] = &[
    ParamDescriptor::new("Frequency", 10.0, 30000.0, 1000.0, ParamUnit::Hz),
    ParamDescriptor::new("Gain", -30.0, 30.0, 0.0, ParamUnit::Db),
    ParamDescriptor::new("Q", 0.05, 50.0, 0.707, ParamUnit::Ratio),
    ParamDescriptor::toggle("Enabled", false),
    ParamDescriptor::choice(
        "Shape",
        &[
            "Bell",
            "Low Shelf",
            "High Shelf",
            "Low Cut",
            "High Cut",
            "Notch",
            "Band Pass",
        ],
        0,
    ),
    ParamDescriptor::toggle("Dyn Enabled", false),
    ParamDescriptor::new("Dyn Threshold", -60.0, 0.0, -20.0, ParamUnit::Db),
    ParamDescriptor::new("Dyn Ratio", 1.0, 20.0, 2.0, ParamUnit::Ratio),
    ParamDescriptor::new("Dyn Attack", 0.1, 500.0, 10.0, ParamUnit::Ms),
    ParamDescriptor::new("Dyn Release", 1.0, 5000.0, 100.0, ParamUnit::Ms),
    ParamDescriptor::new("Dyn Range", 0.0, 24.0, 12.0, ParamUnit::Db),
];

pub const PRO_EQ_GLOBAL_PARAMS: &[ParamDescriptor] = &[ParamDescriptor::new(
    "Output Gain",
    -24.0,
    24.0,
    0.0,
    ParamUnit::Db,
)];

/// Index of the pro-eq Output Gain (first global after the bands)
pub const PRO_EQ_OUTPUT_GAIN: usize = PRO_EQ_BANDS * PRO_EQ_BAND_PARAMS.len();

// ============ Manifest ============

/// Published description of every parameter table
#[derive(Debug, Clone, Serialize)]
pub struct ParamManifest {
    pub version: u32,
    pub processors: Vec<ProcessorManifest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorManifest {
    pub id: &'static str,
    pub name: &'static str,
    pub param_count: usize,
    pub layout: LayoutManifest,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutManifest {
    Flat {
        params: &'static [ParamDescriptor],
    },
    Banded {
        bands: usize,
        per_band: &'static [ParamDescriptor],
        global: &'static [ParamDescriptor],
    },
}

impl ParamManifest {
    /// Manifest for every registered processor kind
    pub fn current() -> Self {
        let processors = ProcessorKind::ALL
            .iter()
            .map(|kind| {
                let layout = kind.layout();
                ProcessorManifest {
                    id: kind.id(),
                    name: kind.display_name(),
                    param_count: layout.count(),
                    layout: match layout {
                        ParamLayout::Flat(params) => LayoutManifest::Flat { params },
                        ParamLayout::Banded {
                            bands,
                            per_band,
                            global,
                        } => LayoutManifest::Banded {
                            bands,
                            per_band,
                            global,
                        },
                    },
                }
            })
            .collect();

        Self {
            version: PARAM_TABLE_VERSION,
            processors,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRO_EQ: ParamLayout = ParamLayout::Banded {
        bands: PRO_EQ_BANDS,
        per_band: PRO_EQ_BAND_PARAMS,
        global: PRO_EQ_GLOBAL_PARAMS,
    };

    #[test]
    fn test_counts_evaluate_at_compile_time() {
        const PRO_EQ_COUNT: usize = PRO_EQ.count();
        const GATE_COUNT: usize = ParamLayout::Flat(GATE_PARAMS).count();
        assert_eq!(PRO_EQ_COUNT, 705);
        assert_eq!(GATE_COUNT, 6);
    }

    #[test]
    fn test_pro_eq_addressing() {
        assert_eq!(PRO_EQ.count(), 705);
        assert_eq!(PRO_EQ_OUTPUT_GAIN, 704);
        assert_eq!(
            PRO_EQ.resolve(2 * 11),
            Some(ParamAddress::Band { band: 2, offset: 0 })
        );
        assert_eq!(
            PRO_EQ.resolve(63 * 11 + 10),
            Some(ParamAddress::Band {
                band: 63,
                offset: 10
            })
        );
        assert_eq!(PRO_EQ.resolve(704), Some(ParamAddress::Global(0)));
        assert_eq!(PRO_EQ.resolve(705), None);
        assert_eq!(PRO_EQ.descriptor(704).map(|d| d.name), Some("Output Gain"));
        assert_eq!(PRO_EQ.descriptor(25).map(|d| d.name), Some("Enabled"));
    }

    #[test]
    fn test_flat_addressing() {
        let layout = ParamLayout::Flat(COMPRESSOR_PARAMS);
        assert_eq!(layout.count(), 9);
        assert_eq!(layout.resolve(8), Some(ParamAddress::Flat(8)));
        assert_eq!(layout.resolve(9), None);
    }

    #[test]
    fn test_normalize() {
        let threshold = &COMPRESSOR_PARAMS[0];
        assert_eq!(threshold.normalize(-18.0), -18.0);
        assert_eq!(threshold.normalize(-90.0), -60.0);
        assert_eq!(threshold.normalize(6.0), 0.0);

        let kind = &COMPRESSOR_PARAMS[7];
        assert_eq!(kind.normalize(1.4), 1.0);
        assert_eq!(kind.normalize(1.6), 2.0);
        assert_eq!(kind.normalize(7.0), 2.0);

        let listen = &DEESSER_PARAMS[7];
        assert_eq!(listen.normalize(0.49), 0.0);
        assert_eq!(listen.normalize(0.5), 1.0);
    }

    #[test]
    fn test_defaults_inside_ranges() {
        for kind in ProcessorKind::ALL {
            let layout = kind.layout();
            for i in 0..layout.count() {
                let d = layout.descriptor(i).unwrap();
                assert!(d.min <= d.default && d.default <= d.max, "{kind:?}[{i}] {}", d.name);
                assert_eq!(d.normalize(d.default), d.default, "{kind:?}[{i}]");
            }
        }
    }

    #[test]
    fn test_manifest_json() {
        let json = ParamManifest::current().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], PARAM_TABLE_VERSION);
        let processors = value["processors"].as_array().unwrap();
        assert_eq!(processors.len(), ProcessorKind::ALL.len());

        let eq = processors.iter().find(|p| p["id"] == "pro-eq").unwrap();
        assert_eq!(eq["param_count"], 705);
        assert_eq!(eq["layout"]["kind"], "banded");
        assert_eq!(eq["layout"]["per_band"][4]["choices"][1], "Low Shelf");
    }
}
