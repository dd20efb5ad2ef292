use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use audiogram_core::export::{probe_capabilities, AudioDecoderService, ChunkedRecorder};
use audiogram_core::source::{CpalCaptureBackend, FFT_SIZE, FREQUENCY_BIN_COUNT};
use audiogram_core::{
    AudioFrame, BufferPlayback, CpalAudioSink, ExportJob, ExportOptions, FfmpegRecorder,
    FrameCompositor, MediaSource, RenderLoop, Settings, SignalSourceAdapter, SmoothingEngine,
    WavDecoder,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> audiogram_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe => run_probe(),
        Commands::Preview {
            settings,
            out,
            at,
        } => run_preview(settings.as_deref().map(PathBuf::from), &out, at),
        Commands::Export {
            audio,
            settings,
            out_dir,
        } => run_export(&audio, settings.as_deref().map(PathBuf::from), &out_dir),
        Commands::Live { seconds } => run_live(seconds),
        Commands::Monitor { audio, settings } => {
            let settings = load_settings(settings.as_deref().map(PathBuf::from))?;
            run_monitor(&audio, &settings)
        }
    }
}

/// Reports whether the environment can run an export, listing anything missing.
fn run_probe() -> audiogram_core::Result<()> {
    let decoder = WavDecoder;
    let recorder = FfmpegRecorder::new();
    let report = probe_capabilities(&decoder, &recorder, true);
    if report.supported {
        tracing::info!(mime = recorder.mime_type(), "export supported");
    } else {
        for issue in &report.issues {
            tracing::warn!(issue, "capability missing");
        }
    }
    Ok(())
}

/// Renders one idle-animation frame to a PNG so a settings file can be
/// checked without audio.
fn run_preview(
    settings_path: Option<PathBuf>,
    out: &PathBuf,
    at: f64,
) -> audiogram_core::Result<()> {
    let settings = load_settings(settings_path)?;
    let mut compositor = FrameCompositor::new()?;
    compositor.render_to_png(&settings, &AudioFrame::placeholder(), false, at, out)?;
    tracing::info!(path = %out.display(), "preview frame written");
    Ok(())
}

fn run_export(
    audio: &PathBuf,
    settings_path: Option<PathBuf>,
    out_dir: &PathBuf,
) -> audiogram_core::Result<()> {
    let settings = load_settings(settings_path)?;
    let options = ExportOptions {
        output_dir: out_dir.clone(),
        ..ExportOptions::default()
    };
    // The job owns the monitor sink: it plays the buffer it decodes for the
    // recorder and stops it when the run ends, success or not.
    let mut job = ExportJob::with_sink(
        WavDecoder,
        FfmpegRecorder::new(),
        CpalAudioSink::default(),
        options,
    );

    let mut last_percent = 0u32;
    let artifact = job.run(audio, &settings, |progress| {
        let percent = (progress * 100.0) as u32;
        if percent > last_percent {
            last_percent = percent;
            tracing::info!(percent, "export progress");
        }
    })?;
    tracing::info!(path = %artifact.display(), "export complete");
    Ok(())
}

/// Visualizes the default capture device for a fixed number of seconds,
/// logging amplitude so levels can be sanity-checked headlessly.
fn run_live(seconds: u64) -> audiogram_core::Result<()> {
    let mut adapter = SignalSourceAdapter::new();
    let mut backend = CpalCaptureBackend;
    let analyzer = adapter.connect_live(&mut backend)?;
    tracing::info!(seconds, "live capture started");

    let mut engine = SmoothingEngine::default();
    let mut raw_frequency = Vec::with_capacity(FREQUENCY_BIN_COUNT);
    let mut raw_time = Vec::with_capacity(FFT_SIZE);
    let loop_analyzer = analyzer.clone();
    let mut render_loop = RenderLoop::spawn(Duration::from_millis(250), move || {
        if loop_analyzer.pull_frequency_data(&mut raw_frequency).is_err()
            || loop_analyzer.pull_time_domain_data(&mut raw_time).is_err()
        {
            return;
        }
        let frame = engine.frame(&raw_frequency, &raw_time);
        tracing::info!(amplitude = frame.average_amplitude, "live frame");
    });
    std::thread::sleep(Duration::from_secs(seconds));

    // Stop the loop before releasing the device so no tick lands afterwards.
    render_loop.stop();
    adapter.disconnect_live();
    tracing::info!("live capture stopped");
    Ok(())
}

/// Plays a file through the analysis path without exporting. Useful when
/// tuning sensitivity and smoothness values.
fn run_monitor(audio: &PathBuf, settings: &Settings) -> audiogram_core::Result<()> {
    let buffer = WavDecoder.decode(audio)?;
    let mut adapter = SignalSourceAdapter::new();
    let media = MediaSource::new(buffer);
    let analyzer = adapter.connect_playback(&media);
    let mut playback = BufferPlayback::spawn(Arc::clone(media.buffer()), analyzer.clone());

    let mut engine = SmoothingEngine::new(
        settings.visualizer.clamped_sensitivity(),
        settings.visualizer.clamped_smoothness(),
    );
    let mut raw_frequency = Vec::new();
    let mut raw_time = Vec::new();
    while playback.is_playing() {
        analyzer.pull_frequency_data(&mut raw_frequency)?;
        analyzer.pull_time_domain_data(&mut raw_time)?;
        let frame = engine.frame(&raw_frequency, &raw_time);
        tracing::info!(amplitude = frame.average_amplitude, "playback frame");
        std::thread::sleep(Duration::from_millis(250));
    }
    playback.stop();
    Ok(())
}

fn load_settings(path: Option<PathBuf>) -> audiogram_core::Result<Settings> {
    match path {
        Some(path) => Settings::load(&path),
        None => Ok(Settings::default()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive overlay renderer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether export is supported in this environment.
    Probe,
    /// Render a single idle frame to PNG.
    Preview {
        /// Optional settings JSON to render with.
        #[arg(short, long)]
        settings: Option<String>,
        /// Output PNG path.
        #[arg(short, long, default_value = "preview.png")]
        out: PathBuf,
        /// Animation time in seconds for the idle frame.
        #[arg(long, default_value_t = 0.0)]
        at: f64,
    },
    /// Export an audio file to an audio-synced WebM video.
    Export {
        /// WAV file to visualize.
        audio: PathBuf,
        /// Optional settings JSON.
        #[arg(short, long)]
        settings: Option<String>,
        /// Directory the artifact is written into.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Visualize the default capture device, logging amplitude.
    Live {
        /// How long to capture before exiting.
        #[arg(short, long, default_value_t = 10)]
        seconds: u64,
    },
    /// Play a WAV through the analysis path, logging amplitude.
    Monitor {
        /// WAV file to analyze.
        audio: PathBuf,
        /// Optional settings JSON.
        #[arg(short, long)]
        settings: Option<String>,
    },
}
