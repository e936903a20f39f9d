use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array4;
use physio_regress::{
    compute_regressors, denoise_image, DenoiseOptions, PhysioConfig, PhysioRecording,
    PhysioSession, SliceTiming,
};

/// 8 min scan, TR 2 s, 30 sequential slices.
fn session() -> PhysioSession {
    let cfg = PhysioConfig::default();
    let nframes = 240;
    let n_resp = (2.0 * nframes as f64 * 2.0 / cfg.resp_dt) as usize;
    let resp: Vec<f64> = (0..n_resp)
        .map(|i| 2000.0 + 400.0 * (2.0 * std::f64::consts::PI * 0.27 * i as f64 * cfg.resp_dt).sin())
        .collect();
    let beats: Vec<f64> = (0..600).map(|k| 0.2 + k as f64 * 0.83).collect();
    let rec = PhysioRecording::from_aligned_triggers(resp, beats, 2.0, nframes, &cfg).unwrap();
    let onsets = (0..30).map(|s| s as f64 * 2.0 / 30.0).collect();
    PhysioSession::new(rec, SliceTiming::new(onsets, None).unwrap())
}

fn bench_compute_regressors(c: &mut Criterion) {
    let s = session();
    let cfg = PhysioConfig::default();
    c.bench_function("compute_regressors [240 frames × 30 slices]", |b| {
        b.iter(|| {
            let (regs, _) = compute_regressors(black_box(&s), &cfg).unwrap().unwrap();
            black_box(regs.data[[0, 0, 0]])
        })
    });
}

fn bench_denoise(c: &mut Criterion) {
    let s = session();
    let (regs, _) = compute_regressors(&s, &PhysioConfig::default()).unwrap().unwrap();
    let vol = Array4::from_shape_fn((32, 32, 30, 240), |(i, j, z, t)| {
        1000.0 + ((i * 7 + j * 3 + z + t) as f64 * 0.11).sin()
    });
    c.bench_function("denoise_image [32×32×30×240]", |b| {
        b.iter(|| {
            let out = denoise_image(black_box(&vol), &regs, &DenoiseOptions::default()).unwrap();
            black_box(out.pct_var_reduced[[0, 0, 0]])
        })
    });
}

criterion_group!(benches, bench_compute_regressors, bench_denoise);
criterion_main!(benches);
