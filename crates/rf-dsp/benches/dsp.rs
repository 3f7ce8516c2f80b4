//! DSP processor benchmarks

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rf_dsp::biquad::BiquadTDF2;
use rf_dsp::dynamics::{CompressorType, StereoCompressor, TruePeakLimiter};
use rf_dsp::eq::{EqShape, ParametricEq};
use rf_dsp::reverb::AlgorithmicReverb;
use rf_dsp::{MonoProcessor, StereoProcessor};

const BLOCK: usize = 1024;

fn stereo_block() -> (Vec<f64>, Vec<f64>) {
    let left = (0..BLOCK).map(|i| (i as f64 * 0.01).sin() * 0.5).collect();
    let right = (0..BLOCK).map(|i| (i as f64 * 0.01).cos() * 0.5).collect();
    (left, right)
}

fn bench_biquad(c: &mut Criterion) {
    let mut filter = BiquadTDF2::new(48000.0);
    filter.set_peaking(1000.0, 1.0, 6.0);
    let mut buffer: Vec<f64> = (0..BLOCK).map(|i| (i as f64 * 0.01).sin()).collect();

    c.bench_function("biquad_peaking_1024", |b| {
        b.iter(|| filter.process_block(black_box(&mut buffer)))
    });
}

fn bench_compressor(c: &mut Criterion) {
    let mut group = c.benchmark_group("compressor_stereo");

    for comp_type in [CompressorType::Vca, CompressorType::Opto, CompressorType::Fet] {
        let mut comp = StereoCompressor::new(48000.0);
        comp.set_both(|c| {
            c.set_type(comp_type);
            c.set_threshold(-18.0);
            c.set_ratio(4.0);
            c.set_times(10.0, 100.0);
        });
        let (mut left, mut right) = stereo_block();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{:?}", comp_type)),
            &comp_type,
            |b, _| b.iter(|| comp.process_block(black_box(&mut left), black_box(&mut right))),
        );
    }

    group.finish();
}

fn bench_limiter(c: &mut Criterion) {
    let mut limiter = TruePeakLimiter::new(48000.0);
    limiter.set_input_gain(12.0);
    let (mut left, mut right) = stereo_block();

    c.bench_function("true_peak_limiter_1024", |b| {
        b.iter(|| limiter.process_block(black_box(&mut left), black_box(&mut right)))
    });
}

fn bench_parametric_eq(c: &mut Criterion) {
    let mut group = c.benchmark_group("parametric_eq");

    for bands in [1usize, 8, 64] {
        let mut eq = ParametricEq::new(48000.0);
        for i in 0..bands {
            if let Some(band) = eq.band_mut(i) {
                band.set_params(100.0 * (i + 1) as f64, 3.0, 1.0, EqShape::Bell);
                band.set_enabled(true);
            }
        }
        let (mut left, mut right) = stereo_block();

        group.bench_with_input(BenchmarkId::from_parameter(bands), &bands, |b, _| {
            b.iter(|| eq.process_block(black_box(&mut left), black_box(&mut right)))
        });
    }

    group.finish();
}

fn bench_reverb(c: &mut Criterion) {
    let mut reverb = AlgorithmicReverb::new(48000.0);
    let (mut left, mut right) = stereo_block();

    c.bench_function("fdn_reverb_1024", |b| {
        b.iter(|| reverb.process_block(black_box(&mut left), black_box(&mut right)))
    });
}

criterion_group!(
    benches,
    bench_biquad,
    bench_compressor,
    bench_limiter,
    bench_parametric_eq,
    bench_reverb
);
criterion_main!(benches);
