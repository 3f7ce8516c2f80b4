//! Algorithmic reverbs
//!
//! - `RoomReverb`: comb/allpass network (Schroeder–Moorer, Freeverb tuning)
//! - `AlgorithmicReverb`: 8-line FDN with Hadamard feedback matrix
//!
//! Every delay line is sized for its largest setting in `new()`; size and
//! pre-delay changes only move read positions.

use rf_core::Sample;

use crate::biquad::OnePole;
use crate::{Processor, StereoProcessor};

/// Fixed-capacity delay line with an adjustable length
#[derive(Debug, Clone)]
struct DelayLine {
    buffer: Vec<Sample>,
    len: usize,
    pos: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: vec![0.0; capacity + 1],
            len: capacity,
            pos: 0,
        }
    }

    fn set_len(&mut self, len: usize) {
        self.len = len.clamp(1, self.buffer.len() - 1);
    }

    /// Sample written `len` samples ago
    #[inline(always)]
    fn read(&self) -> Sample {
        let cap = self.buffer.len();
        self.buffer[(self.pos + cap - self.len) % cap]
    }

    #[inline(always)]
    fn write(&mut self, value: Sample) {
        self.buffer[self.pos] = value;
        self.pos = (self.pos + 1) % self.buffer.len();
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

/// Pre-delay with a zero-length bypass
#[derive(Debug, Clone)]
struct PreDelay {
    line: DelayLine,
    samples: usize,
}

impl PreDelay {
    fn new(max_ms: f64, sample_rate: f64) -> Self {
        Self {
            line: DelayLine::new((max_ms * 0.001 * sample_rate).ceil() as usize),
            samples: 0,
        }
    }

    fn set_ms(&mut self, ms: f64, sample_rate: f64) {
        self.samples = (ms.max(0.0) * 0.001 * sample_rate).round() as usize;
        self.line.set_len(self.samples);
    }

    #[inline(always)]
    fn process(&mut self, input: Sample) -> Sample {
        if self.samples == 0 {
            return input;
        }
        let out = self.line.read();
        self.line.write(input);
        out
    }

    fn clear(&mut self) {
        self.line.clear();
    }
}

// ============ Room Reverb ============

const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const FIXED_GAIN: f64 = 0.015;
const SCALE_ROOM: f64 = 0.28;
const OFFSET_ROOM: f64 = 0.7;
const SCALE_DAMP: f64 = 0.4;
const SCALE_WET: f64 = 3.0;

/// Room reverb pre-delay ceiling
pub const ROOM_MAX_PREDELAY_MS: f64 = 200.0;

#[derive(Debug, Clone)]
struct Comb {
    line: DelayLine,
    store: f64,
}

impl Comb {
    #[inline(always)]
    fn process(&mut self, input: Sample, feedback: f64, damp: f64) -> Sample {
        let out = self.line.read();
        self.store = out * (1.0 - damp) + self.store * damp;
        self.line.write(input + self.store * feedback);
        out
    }
}

#[derive(Debug, Clone)]
struct RoomAllpass {
    line: DelayLine,
}

impl RoomAllpass {
    #[inline(always)]
    fn process(&mut self, input: Sample) -> Sample {
        let delayed = self.line.read();
        self.line.write(input + delayed * 0.5);
        delayed - input
    }
}

/// Room reverb (parallel combs into series allpasses, per channel)
#[derive(Debug, Clone)]
pub struct RoomReverb {
    combs: [Vec<Comb>; 2],
    allpasses: [Vec<RoomAllpass>; 2],
    predelay: [PreDelay; 2],

    room_size: f64,
    damping: f64,
    width: f64,
    mix: f64,
    freeze: bool,

    feedback: f64,
    damp: f64,
    input_gain: f64,
    sample_rate: f64,
}

impl RoomReverb {
    pub fn new(sample_rate: f64) -> Self {
        let scale = sample_rate / 44100.0;
        let sized = |n: usize| ((n as f64) * scale).round() as usize;
        let combs = |spread: usize| {
            COMB_TUNING
                .iter()
                .map(|&n| Comb {
                    line: DelayLine::new(sized(n + spread)),
                    store: 0.0,
                })
                .collect::<Vec<_>>()
        };
        let allpasses = |spread: usize| {
            ALLPASS_TUNING
                .iter()
                .map(|&n| RoomAllpass {
                    line: DelayLine::new(sized(n + spread)),
                })
                .collect::<Vec<_>>()
        };

        let mut reverb = Self {
            combs: [combs(0), combs(STEREO_SPREAD)],
            allpasses: [allpasses(0), allpasses(STEREO_SPREAD)],
            predelay: [
                PreDelay::new(ROOM_MAX_PREDELAY_MS, sample_rate),
                PreDelay::new(ROOM_MAX_PREDELAY_MS, sample_rate),
            ],
            room_size: 0.5,
            damping: 0.5,
            width: 1.0,
            mix: 0.3,
            freeze: false,
            feedback: 0.0,
            damp: 0.0,
            input_gain: FIXED_GAIN,
            sample_rate,
        };
        reverb.update();
        reverb
    }

    fn update(&mut self) {
        if self.freeze {
            self.feedback = 1.0;
            self.damp = 0.0;
            self.input_gain = 0.0;
        } else {
            self.feedback = self.room_size * SCALE_ROOM + OFFSET_ROOM;
            self.damp = self.damping * SCALE_DAMP;
            self.input_gain = FIXED_GAIN;
        }
    }

    pub fn set_room_size(&mut self, size: f64) {
        self.room_size = size.clamp(0.0, 1.0);
        self.update();
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.damping = damping.clamp(0.0, 1.0);
        self.update();
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width.clamp(0.0, 1.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }

    pub fn set_predelay(&mut self, ms: f64) {
        let ms = ms.clamp(0.0, ROOM_MAX_PREDELAY_MS);
        for p in &mut self.predelay {
            p.set_ms(ms, self.sample_rate);
        }
    }

    pub fn set_freeze(&mut self, freeze: bool) {
        self.freeze = freeze;
        self.update();
    }
}

impl Processor for RoomReverb {
    fn reset(&mut self) {
        for ch in 0..2 {
            for comb in &mut self.combs[ch] {
                comb.line.clear();
                comb.store = 0.0;
            }
            for ap in &mut self.allpasses[ch] {
                ap.line.clear();
            }
            self.predelay[ch].clear();
        }
    }
}

impl StereoProcessor for RoomReverb {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let input = (left + right) * self.input_gain;
        let mut wet = [0.0; 2];

        for (ch, out) in wet.iter_mut().enumerate() {
            let x = self.predelay[ch].process(input);
            let mut acc = 0.0;
            for comb in &mut self.combs[ch] {
                acc += comb.process(x, self.feedback, self.damp);
            }
            for ap in &mut self.allpasses[ch] {
                acc = ap.process(acc);
            }
            *out = acc * SCALE_WET;
        }

        let wet1 = self.width / 2.0 + 0.5;
        let wet2 = (1.0 - self.width) / 2.0;
        let wet_l = wet[0] * wet1 + wet[1] * wet2;
        let wet_r = wet[1] * wet1 + wet[0] * wet2;

        (
            left * (1.0 - self.mix) + wet_l * self.mix,
            right * (1.0 - self.mix) + wet_r * self.mix,
        )
    }
}

// ============ FDN Reverb ============

/// FDN delay lengths (prime-distributed, samples @ 48kHz, size 0.5)
const FDN_BASE_DELAYS: [usize; 8] = [1087, 1283, 1481, 1669, 1877, 2083, 2293, 2503];

/// Input diffuser allpass lengths (samples @ 48kHz)
const DIFFUSER_DELAYS: [usize; 4] = [142, 107, 379, 277];

/// Algorithmic reverb pre-delay ceiling
pub const FDN_MAX_PREDELAY_MS: f64 = 250.0;

/// Hadamard 8×8 matrix (normalized by 1/√8)
const HADAMARD_8: [[f64; 8]; 8] = {
    const P: f64 = 0.35355339059327373;
    const N: f64 = -0.35355339059327373;
    [
        [P, P, P, P, P, P, P, P],
        [P, N, P, N, P, N, P, N],
        [P, P, N, N, P, P, N, N],
        [P, N, N, P, P, N, N, P],
        [P, P, P, P, N, N, N, N],
        [P, N, P, N, N, P, N, P],
        [P, P, N, N, N, N, P, P],
        [P, N, N, P, N, P, P, N],
    ]
};

/// Schroeder allpass used for input diffusion
#[derive(Debug, Clone)]
struct DiffuserAllpass {
    line: DelayLine,
}

impl DiffuserAllpass {
    #[inline(always)]
    fn process(&mut self, input: Sample, g: f64) -> Sample {
        let delayed = self.line.read();
        let w = input + g * delayed;
        self.line.write(w);
        delayed - g * w
    }
}

/// Algorithmic stereo reverb: FDN 8×8 with Hadamard feedback matrix
///
/// Input → PreDelay → Diffusion → FDN 8×8 (damped) → M/S Width → Dry/Wet Mix
#[derive(Debug, Clone)]
pub struct AlgorithmicReverb {
    lines: [DelayLine; 8],
    damping_filters: [OnePole; 8],
    gains: [f64; 8],
    diffusers: [DiffuserAllpass; 4],
    predelay: PreDelay,

    decay_s: f64,
    size: f64,
    damping: f64,
    diffusion: f64,
    width: f64,
    mix: f64,

    sample_rate: f64,
}

impl AlgorithmicReverb {
    pub fn new(sample_rate: f64) -> Self {
        let scale = sample_rate / 48000.0;
        // Size 1.0 stretches the base lengths by 1.5
        let lines = std::array::from_fn(|i| {
            DelayLine::new((FDN_BASE_DELAYS[i] as f64 * 1.5 * scale).ceil() as usize)
        });
        let diffusers = std::array::from_fn(|i| DiffuserAllpass {
            line: DelayLine::new((DIFFUSER_DELAYS[i] as f64 * scale).round() as usize),
        });

        let mut reverb = Self {
            lines,
            damping_filters: std::array::from_fn(|_| OnePole::default()),
            gains: [0.0; 8],
            diffusers,
            predelay: PreDelay::new(FDN_MAX_PREDELAY_MS, sample_rate),
            decay_s: 2.0,
            size: 0.5,
            damping: 0.4,
            diffusion: 0.7,
            width: 1.0,
            mix: 0.3,
            sample_rate,
        };
        reverb.set_predelay(10.0);
        reverb.recalc_internals();
        reverb
    }

    /// Recompute line lengths, decay gains, and damping from parameters
    fn recalc_internals(&mut self) {
        let scale = self.sample_rate / 48000.0;
        let stretch = 0.5 + self.size;
        for (i, line) in self.lines.iter_mut().enumerate() {
            let len = (FDN_BASE_DELAYS[i] as f64 * stretch * scale).round() as usize;
            line.set_len(len);
            // T60: each pass through a line of `len` samples loses 60·len/(sr·T60) dB
            self.gains[i] = 10.0_f64.powf(-3.0 * line.len as f64 / (self.sample_rate * self.decay_s));
        }
        for filter in &mut self.damping_filters {
            filter.set_coeff(self.damping * 0.7);
        }
    }

    pub fn set_decay(&mut self, seconds: f64) {
        self.decay_s = seconds.clamp(0.1, 20.0);
        self.recalc_internals();
    }

    pub fn set_size(&mut self, size: f64) {
        self.size = size.clamp(0.0, 1.0);
        self.recalc_internals();
    }

    pub fn set_damping(&mut self, damping: f64) {
        self.damping = damping.clamp(0.0, 1.0);
        self.recalc_internals();
    }

    pub fn set_diffusion(&mut self, diffusion: f64) {
        self.diffusion = diffusion.clamp(0.0, 1.0);
    }

    pub fn set_predelay(&mut self, ms: f64) {
        self.predelay
            .set_ms(ms.clamp(0.0, FDN_MAX_PREDELAY_MS), self.sample_rate);
    }

    pub fn set_width(&mut self, width: f64) {
        self.width = width.clamp(0.0, 2.0);
    }

    pub fn set_mix(&mut self, mix: f64) {
        self.mix = mix.clamp(0.0, 1.0);
    }
}

impl Processor for AlgorithmicReverb {
    fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        for filter in &mut self.damping_filters {
            filter.reset();
        }
        for d in &mut self.diffusers {
            d.line.clear();
        }
        self.predelay.clear();
    }
}

impl StereoProcessor for AlgorithmicReverb {
    fn process_sample(&mut self, left: Sample, right: Sample) -> (Sample, Sample) {
        let mut x = self.predelay.process((left + right) * 0.5);
        let g = self.diffusion * 0.7;
        for d in &mut self.diffusers {
            x = d.process(x, g);
        }

        let mut taps = [0.0; 8];
        for (i, tap) in taps.iter_mut().enumerate() {
            *tap = self.damping_filters[i].lowpass_sample(self.lines[i].read());
        }

        let mut wet_l = 0.0;
        let mut wet_r = 0.0;
        for (i, row) in HADAMARD_8.iter().enumerate() {
            let mixed: f64 = row.iter().zip(taps.iter()).map(|(h, t)| h * t).sum();
            let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
            self.lines[i].write(x * sign + mixed * self.gains[i]);
            if i % 2 == 0 {
                wet_l += taps[i];
            } else {
                wet_r += taps[i];
            }
        }
        wet_l *= 0.5;
        wet_r *= 0.5;

        // M/S width
        let mid = (wet_l + wet_r) * 0.5;
        let side = (wet_l - wet_r) * 0.5 * self.width;
        let (wet_l, wet_r) = (mid + side, mid - side);

        (
            left * (1.0 - self.mix) + wet_l * self.mix,
            right * (1.0 - self.mix) + wet_r * self.mix,
        )
    }
}
