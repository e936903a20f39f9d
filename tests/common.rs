/// Shared synthetic physio generators.
use physio_regress::{PhysioConfig, PhysioRecording, PhysioSession, RawPhysio, SliceTiming};
use std::f64::consts::PI;

#[allow(unused)]
/// `offset + amp · sin(2π f t)` sampled every `dt`.
pub fn breathing(n: usize, dt: f64, freq_hz: f64, amp: f64, offset: f64) -> Vec<f64> {
    (0..n)
        .map(|i| offset + amp * (2.0 * PI * freq_hz * i as f64 * dt).sin())
        .collect()
}

#[allow(unused)]
/// Heartbeat times `start, start + period, …` below `until`.
pub fn heartbeats(start: f64, period: f64, until: f64) -> Vec<f64> {
    let n = ((until - start) / period).ceil().max(0.0) as usize;
    (0..n).map(|k| start + k as f64 * period).filter(|&t| t < until).collect()
}

#[allow(unused)]
/// Session from already-aligned heartbeat times.
pub fn session(
    resp: Vec<f64>,
    card_trig: Vec<f64>,
    tr: f64,
    nframes: usize,
    onsets: Vec<f64>,
) -> PhysioSession {
    let cfg = PhysioConfig::default();
    let rec = PhysioRecording::from_aligned_triggers(resp, card_trig, tr, nframes, &cfg).unwrap();
    PhysioSession::new(rec, SliceTiming::new(onsets, None).unwrap())
}

#[allow(unused)]
/// Raw GE-style fields for a scan of `duration` seconds plus `lead` seconds
/// of pre-scan logging: 0.25 Hz breathing, a 60 bpm PPG and its triggers.
pub fn raw_recording(duration: f64, lead: f64) -> RawPhysio {
    let cfg = PhysioConfig::default();
    let total = duration + lead;
    let n_resp = (total / cfg.resp_dt).round() as usize;
    let n_card = (total / cfg.card_dt).round() as usize;
    let card_wave = breathing(n_card, cfg.card_dt, 1.0, 200.0, 2048.0);
    let per_beat = (1.0 / cfg.card_dt).round();
    let card_trig: Vec<f64> = (0..n_card / per_beat as usize).map(|k| k as f64 * per_beat).collect();
    RawPhysio {
        resp_wave: Some(breathing(n_resp, cfg.resp_dt, 0.25, 500.0, 2000.0)),
        resp_trig: Some(vec![]),
        card_wave: Some(card_wave),
        card_trig: Some(card_trig),
        metadata: None,
    }
}

#[allow(unused)]
/// Population standard deviation.
pub fn std(x: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;
    (x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
