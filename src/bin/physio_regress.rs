/// physio_regress: compute RETROICOR / RVHRcor regressors from a GE physio
/// archive and, given the matching BOLD volume, denoise it.
///
/// Outputs (prefixed by `--outbase`):
///   _reg.txt                        regressors, 13 columns per slice
///   _pct_var_reduced.nii.gz         variance reduction map   (with -n)
///   _preproc-physio_bold.nii.gz     denoised volume          (with -n)
///   _resp.txt _pulse.txt _slice_onsets.txt                   (with -p)
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use physio_regress::{
    io::{write_column, write_raw_data, write_regressors},
    load_raw_physio, process,
    volume::{load_volume, save_map, save_volume, timing_from_header},
    DenoiseOptions, HeartRateEstimator, PhysioConfig, PhysioRecording, PhysioSession,
    PhysioSource, SliceTiming,
};

#[derive(Parser, Debug)]
#[command(name = "physio_regress", version, about = "Physio nuisance regressors for fMRI")]
struct Args {
    /// Physio archive (.zip / .tgz), or several channel files.
    #[arg(long, num_args = 1.., required = true)]
    physio_file: Vec<PathBuf>,

    /// Basename for output files.
    #[arg(long)]
    outbase: String,

    /// BOLD volume the physio was recorded with.
    #[arg(short = 'n', long)]
    nifti_file: Option<PathBuf>,

    /// Also save the aligned respiration, heartbeat times and slice onsets.
    #[arg(short, long)]
    preprocess: bool,

    /// Slice readout window in seconds (derived from the onsets if omitted).
    #[arg(long)]
    slice_window: Option<f64>,

    /// Repetition time (s), used without a NIfTI reference.
    #[arg(long, default_value_t = 2.0)]
    tr: f64,

    /// Number of frames, used without a NIfTI reference.
    #[arg(long, default_value_t = 100)]
    nframes: usize,

    /// PPG sampling interval (s).
    #[arg(long, default_value_t = 0.01)]
    card_dt: f64,

    /// Respiration sampling interval (s).
    #[arg(long, default_value_t = 0.04)]
    resp_dt: f64,

    /// Windowed trigger-count heart rate instead of interpolation.
    #[arg(long)]
    legacy_rvhr: bool,

    /// Lowest plausible heart rate (bpm).
    #[arg(long, default_value_t = 30.0)]
    hr_min: f64,

    /// Highest plausible heart rate (bpm).
    #[arg(long, default_value_t = 180.0)]
    hr_max: f64,

    /// Also dump the aligned raw waveforms as JSON to this path (.gz compresses).
    #[arg(long)]
    raw_data: Option<PathBuf>,

    /// Give up on slices not fitted within this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Logging verbosity level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let heart_rate = if args.legacy_rvhr {
        HeartRateEstimator::Legacy
    } else {
        HeartRateEstimator::Interpolated { hr_min: args.hr_min, hr_max: args.hr_max }
    };
    let cfg = PhysioConfig {
        card_dt: args.card_dt,
        resp_dt: args.resp_dt,
        heart_rate,
        ..PhysioConfig::default()
    };

    // ── 1. Scan geometry ────────────────────────────────────────────────────
    let (tr, nframes, slices, volume) = match &args.nifti_file {
        Some(path) => {
            let (header, data) =
                load_volume(path).with_context(|| format!("reading {}", path.display()))?;
            let timing = timing_from_header(&header)?;
            let slices = SliceTiming::new(timing.slice_onsets, args.slice_window)?;
            (timing.tr, timing.nframes, slices, Some((header, data)))
        }
        None => {
            warn!("no NIfTI reference; regressors will not be valid");
            (args.tr, args.nframes, SliceTiming::single_slice(), None)
        }
    };
    info!(tr, nframes, nslices = slices.nslices(), "scan geometry");

    // ── 2. Physio ───────────────────────────────────────────────────────────
    let source = PhysioSource::from_paths(args.physio_file.clone()).context("opening physio")?;
    let raw = load_raw_physio(&source).context("loading physio")?;
    let rec = PhysioRecording::align(raw, tr, nframes, &cfg)?;
    if let Some(md) = &rec.metadata {
        info!(session = %md.session, acquisition = %md.acquisition_label(), "physio metadata");
    }
    if let Some(path) = &args.raw_data {
        write_raw_data(path, &rec)?;
        info!("raw data → {}", path.display());
    }
    let session = PhysioSession::new(rec, slices);

    if args.preprocess {
        write_column(&out(&args.outbase, "_resp.txt"), &session.recording.resp_wave)?;
        write_column(&out(&args.outbase, "_pulse.txt"), &session.recording.card_trig)?;
        write_column(&out(&args.outbase, "_slice_onsets.txt"), &session.slices.slice_onsets)?;
    }

    // ── 3. Regressors + denoising ───────────────────────────────────────────
    let t0 = Instant::now();
    let opts = DenoiseOptions {
        deadline: args.timeout_secs.map(|s| t0 + Duration::from_secs(s)),
    };
    let Some(outputs) = process(&session, volume.as_ref().map(|(_, d)| d), &cfg, &opts)? else {
        warn!("no regressors computed; nothing written");
        return Ok(());
    };

    let reg_path = out(&args.outbase, "_reg.txt");
    let notes = format!("tr = {tr}, nframes = {nframes}");
    write_regressors(&reg_path, &outputs.regressors, Some(&notes))?;
    info!("regressors → {}", reg_path.display());

    if let (Some(denoised), Some((header, _))) = (&outputs.denoised, &volume) {
        if !denoised.failed_slices.is_empty() {
            warn!(failed = denoised.failed_slices.len(), "some slices were left uncorrected");
        }
        let pct_path = out(&args.outbase, "_pct_var_reduced.nii.gz");
        save_map(&pct_path, header, &denoised.pct_var_reduced)?;
        let bold_path = out(&args.outbase, "_preproc-physio_bold.nii.gz");
        save_volume(&bold_path, header, &denoised.data)?;
        info!("denoised volume → {}", bold_path.display());
    }
    info!(elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0, "done");
    Ok(())
}

fn out(outbase: &str, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{outbase}{suffix}"))
}

fn init_logging(level: &str) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
