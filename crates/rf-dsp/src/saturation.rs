//! Saturation and distortion processors
//!
//! Tape, tube, transistor, soft/hard clip and foldback curves with drive,
//! dry/wet and output gain. A DC blocker follows the asymmetric curves.

use rf_core::{Sample, db_to_gain};

use crate::smoothing::ParamSmoother;
use crate::{MonoProcessor, Processor, StereoProcessor};

/// Saturation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaturationType {
    /// Tape: warm, compressed, slight high-frequency rolloff
    #[default]
    Tape,
    /// Tube: even harmonics, warm
    Tube,
    /// Transistor: odd harmonics, edgier
    Transistor,
    /// Soft clip: smooth limiting
    SoftClip,
    /// Hard clip: digital-style clipping
    HardClip,
    /// Foldback: creative distortion
    Foldback,
}

impl SaturationType {
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => Self::Tube,
            2 => Self::Transistor,
            3 => Self::SoftClip,
            4 => Self::HardClip,
            5 => Self::Foldback,
            _ => Self::Tape,
        }
    }
}

/// Saturation processor (mono)
#[derive(Debug, Clone)]
pub struct Saturator {
    sat_type: SaturationType,
    drive: ParamSmoother,
    mix: f64,
    output: ParamSmoother,

    tape_prev: f64,
    dc_x: f64,
    dc_y: f64,
}

impl Saturator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sat_type: SaturationType::Tape,
            drive: ParamSmoother::new(sample_rate, 1.0),
            mix: 1.0,
            output: ParamSmoother::new(sample_rate, 1.0),
            tape_prev: 0.0,
            dc_x: 0.0,
            dc_y: 0.0,
        }
    }

    pub fn set_type(&mut self, sat_type: SaturationType) {
        self.sat_type = sat_type;
    }

    /// Set drive in dB
    pub fn set_drive_db(&mut self, db: f64) {
        self.drive.set_target(db_to_gain(db.clamp(-20.0, 40.0)));
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    /// Set output level in dB
    pub fn set_output_db(&mut self, db: f64) {
        self.output.set_target(db_to_gain(db.clamp(-24.0, 12.0)));
    }

    #[inline(always)]
    fn shape(&mut self, x: Sample) -> Sample {
        match self.sat_type {
            SaturationType::Tape => {
                // Asymmetric soft curve followed by a gentle head rolloff
                let saturated = (x + 0.1 * x.abs()).tanh();
                let filtered = saturated * 0.9 + self.tape_prev * 0.1;
                self.tape_prev = filtered;
                filtered
            }
            SaturationType::Tube => {
                // Negative half-wave clips harder (grid conduction)
                if x >= 0.0 {
                    x.tanh()
                } else {
                    (x * 1.2).tanh() * 0.9
                }
            }
            SaturationType::Transistor => (3.0 * x) / (1.0 + 2.0 * x.abs() + x * x),
            SaturationType::SoftClip => {
                if x.abs() <= 1.0 {
                    x - x.powi(3) / 3.0
                } else {
                    x.signum() * 2.0 / 3.0
                }
            }
            SaturationType::HardClip => x.clamp(-1.0, 1.0),
            SaturationType::Foldback => {
                let mut x = x;
                for _ in 0..4 {
                    if x > 1.0 {
                        x = 2.0 - x;
                    } else if x < -1.0 {
                        x = -2.0 - x;
                    }
                }
                x.clamp(-1.0, 1.0)
            }
        }
    }

    #[inline(always)]
    fn dc_block(&mut self, x: Sample) -> Sample {
        let y = x - self.dc_x + 0.995 * self.dc_y;
        self.dc_x = x;
        self.dc_y = y;
        y
    }
}

impl Processor for Saturator {
    fn reset(&mut self) {
        self.tape_prev = 0.0;
        self.dc_x = 0.0;
        self.dc_y = 0.0;
        self.drive.snap();
        self.output.snap();
    }
}

impl MonoProcessor for Saturator {
    #[inline(always)]
    fn process_sample(&mut self, input: Sample) -> Sample {
        let drive = self.drive.next();
        let output = self.output.next();
        let shaped = self.shape(input * drive);
        let wet = match self.sat_type {
            SaturationType::Tape | SaturationType::Tube => self.dc_block(shaped),
            _ => shaped,
        };
        (input * (1.0 - self.mix) + wet * self.mix) * output
    }
}

/// Stereo saturator (independent channels, shared settings)
#[derive(Debug, Clone)]
pub struct StereoSaturator {
    left: Saturator,
    right: Saturator,
}

impl StereoSaturator {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            left: Saturator::new(sample_rate),
            right: Saturator::new(sample_rate),
        }
    }

    /// Apply the same setting to both channels
    pub fn set_both<F>(&mut self, f: F)
    where
        F: Fn(&mut Saturator),
    {
        f(&mut self.left);
        f(&mut self.right);
    }
}

impl Processor for StereoSaturator {
    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

impl StereoProcessor for StereoSaturator {
    #[inline(always)]
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        (
            self.left.process_sample(left),
            self.right.process_sample(right),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_types_bounded() {
        for index in 0..6 {
            let mut sat = Saturator::new(48000.0);
            sat.set_type(SaturationType::from_index(index));
            sat.set_drive_db(40.0);
            sat.reset();
            for i in 0..4800 {
                let x = (i as f64 * 0.05).sin();
                let y = sat.process_sample(x);
                assert!(y.is_finite());
                assert!(y.abs() < 2.5, "type {index} produced {y}");
            }
        }
    }

    #[test]
    fn test_hard_clip_ceiling() {
        let mut sat = Saturator::new(48000.0);
        sat.set_type(SaturationType::HardClip);
        sat.set_drive_db(12.0);
        sat.reset();
        assert_eq!(sat.process_sample(0.9), 1.0);
        assert_eq!(sat.process_sample(-0.9), -1.0);
    }

    #[test]
    fn test_zero_mix_is_dry() {
        let mut sat = Saturator::new(48000.0);
        sat.set_mix(0.0);
        sat.set_drive_db(30.0);
        sat.reset();
        assert_eq!(sat.process_sample(0.3), 0.3);
    }
}
