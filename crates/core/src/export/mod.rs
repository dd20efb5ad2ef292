//! Audio-synced export pipeline. Capabilities are probed before any work
//! starts, the audio file is decoded independently of the preview path, and
//! frames are captured at wall-clock pace while a chunked recorder encodes
//! them. The finished artifact is assembled from the encoded chunks and
//! written as `audiogram-<epoch_ms>.webm`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::compositor::FrameCompositor;
use crate::config::Settings;
use crate::playback::{AudioSink, NullSink};
use crate::smoothing::SmoothingEngine;
use crate::source::{AudioBuffer, MediaSource, SignalSourceAdapter};
use crate::{OverlayError, Result};

/// Result of the pre-flight capability probe. Export refuses to start unless
/// every required service is present; `issues` lists what is missing.
#[derive(Debug, Clone)]
pub struct CapabilityReport {
    pub supported: bool,
    pub issues: Vec<String>,
}

/// Checks every service the export pipeline depends on. Runs before any
/// decoding or encoding work so a broken environment fails fast.
pub fn probe_capabilities(
    decoder: &dyn AudioDecoderService,
    recorder: &dyn ChunkedRecorder,
    canvas_available: bool,
) -> CapabilityReport {
    let mut issues = Vec::new();
    if !recorder.is_available() {
        issues.push("chunked media recorder not available".to_string());
    }
    if !decoder.is_available() {
        issues.push("audio decoder not available".to_string());
    }
    if !canvas_available {
        issues.push("canvas capture not available".to_string());
    }
    CapabilityReport {
        supported: issues.is_empty(),
        issues,
    }
}

/// Decodes an audio file into PCM, independent of the playback path.
pub trait AudioDecoderService {
    fn is_available(&self) -> bool;
    fn decode(&self, path: &Path) -> Result<AudioBuffer>;
}

/// WAV decoding via hound. Integer samples of any width are normalised to
/// [-1, 1]; float files pass through.
#[derive(Debug, Default)]
pub struct WavDecoder;

impl AudioDecoderService for WavDecoder {
    fn is_available(&self) -> bool {
        true
    }

    fn decode(&self, path: &Path) -> Result<AudioBuffer> {
        let mut reader =
            hound::WavReader::open(path).map_err(|err| OverlayError::DecodeFailure(err.to_string()))?;
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(|err| OverlayError::DecodeFailure(err.to_string()))?
            }
        };
        Ok(AudioBuffer {
            samples,
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        })
    }
}

/// Writes decoded PCM back out as 16-bit WAV for the recorder's audio input.
pub fn write_wav(buffer: &AudioBuffer, path: &Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|err| OverlayError::EncodeFailure(err.to_string()))?;
    for &sample in &buffer.samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|err| OverlayError::EncodeFailure(err.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|err| OverlayError::EncodeFailure(err.to_string()))
}

/// One piece of encoded output, in arrival order.
#[derive(Debug, Clone)]
pub struct EncodedChunk {
    pub data: Vec<u8>,
}

/// Parameters handed to the recorder when capture starts.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_bitrate: u32,
    /// WAV file muxed alongside the raw video frames.
    pub audio: Option<PathBuf>,
}

/// Encoding service fed raw RGBA frames, emitting container chunks as it
/// goes. The production implementation delegates to an ffmpeg sidecar.
pub trait ChunkedRecorder {
    fn is_available(&self) -> bool;
    fn mime_type(&self) -> &'static str;
    fn start(&mut self, config: &RecorderConfig) -> Result<()>;
    fn push_frame(&mut self, rgba: &[u8]) -> Result<()>;
    /// Chunks encoded since the previous drain. Non-blocking. These feed
    /// progress reporting only: the encoder may rewrite regions behind them
    /// while finalizing, so they must not be assembled into the artifact.
    fn drain_chunks(&mut self) -> Result<Vec<EncodedChunk>>;
    /// Finalizes the container and returns the complete chunk set for the
    /// artifact, superseding everything drained before.
    fn stop(&mut self) -> Result<Vec<EncodedChunk>>;
}

/// ffmpeg sidecar recorder: raw RGBA frames are piped to stdin, the audio WAV
/// is muxed in, and the growing WebM output file is drained incrementally.
pub struct FfmpegRecorder {
    output: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    read_offset: u64,
}

impl FfmpegRecorder {
    pub fn new() -> Self {
        let output = std::env::temp_dir().join(format!(
            "audiogram-encode-{}-{}.webm",
            std::process::id(),
            epoch_millis()
        ));
        Self {
            output,
            child: None,
            stdin: None,
            read_offset: 0,
        }
    }
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkedRecorder for FfmpegRecorder {
    fn is_available(&self) -> bool {
        Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn mime_type(&self) -> &'static str {
        "video/webm"
    }

    fn start(&mut self, config: &RecorderConfig) -> Result<()> {
        let mut command = Command::new("ffmpeg");
        command
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "rawvideo", "-pix_fmt", "rgba"])
            .args(["-s:v", &format!("{}x{}", config.width, config.height)])
            .args(["-r", &config.fps.to_string()])
            .args(["-i", "-"]);
        if let Some(audio) = &config.audio {
            command.arg("-i").arg(audio);
            command.args(["-c:a", "libopus", "-b:a", "128k", "-shortest"]);
        }
        command
            .args(["-c:v", "libvpx-vp9"])
            .args(["-b:v", &config.video_bitrate.to_string()])
            .args(["-f", "webm"])
            .arg(&self.output)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = command
            .spawn()
            .map_err(|err| OverlayError::EncodeFailure(format!("could not start ffmpeg: {err}")))?;
        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.read_offset = 0;
        debug!(output = %self.output.display(), "ffmpeg recorder started");
        Ok(())
    }

    fn push_frame(&mut self, rgba: &[u8]) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or(OverlayError::InvalidInput("recorder has not been started"))?;
        stdin
            .write_all(rgba)
            .map_err(|err| OverlayError::EncodeFailure(format!("frame pipe broke: {err}")))
    }

    fn drain_chunks(&mut self) -> Result<Vec<EncodedChunk>> {
        // The container grows as ffmpeg encodes; hand back whatever appeared
        // since the last drain.
        let mut file = match File::open(&self.output) {
            Ok(file) => file,
            Err(_) => return Ok(Vec::new()),
        };
        file.seek(SeekFrom::Start(self.read_offset))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.read_offset += data.len() as u64;
        Ok(vec![EncodedChunk { data }])
    }

    fn stop(&mut self) -> Result<Vec<EncodedChunk>> {
        // Closing stdin signals end of the video stream.
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let status = child
                .wait()
                .map_err(|err| OverlayError::EncodeFailure(err.to_string()))?;
            if !status.success() {
                std::fs::remove_file(&self.output).ok();
                return Err(OverlayError::EncodeFailure(format!(
                    "ffmpeg exited with {status}"
                )));
            }
        }
        // The muxer backpatches the file head (duration, seek index) while
        // finalizing, so everything drained earlier is stale. Re-read the
        // whole finalized file as the authoritative chunk set.
        let mut file = File::open(&self.output)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        self.read_offset = data.len() as u64;
        std::fs::remove_file(&self.output).ok();
        if data.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![EncodedChunk { data }])
    }
}

impl Drop for FfmpegRecorder {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        std::fs::remove_file(&self.output).ok();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Recording,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub fps: u32,
    /// How often progress is reported and chunks are drained.
    pub poll_interval: Duration,
    pub video_bitrate: u32,
    pub output_dir: PathBuf,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            fps: 60,
            poll_interval: Duration::from_millis(100),
            video_bitrate: 5_000_000,
            output_dir: PathBuf::from("."),
        }
    }
}

/// One export run. Progress is reported strictly monotonically in (0, 1) and
/// 1.0 is emitted exactly once, only after the artifact has been written; a
/// failed run never reports completion. A job is single-use: once it reaches
/// `Done` or `Failed`, `run` refuses to start again.
pub struct ExportJob<D, R, S = NullSink> {
    decoder: D,
    recorder: R,
    sink: S,
    options: ExportOptions,
    state: ExportState,
}

impl<D: AudioDecoderService, R: ChunkedRecorder> ExportJob<D, R> {
    pub fn new(decoder: D, recorder: R, options: ExportOptions) -> Self {
        Self::with_sink(decoder, recorder, NullSink, options)
    }
}

impl<D: AudioDecoderService, R: ChunkedRecorder, S: AudioSink> ExportJob<D, R, S> {
    /// Job that monitors the decoded audio through `sink` while recording,
    /// so the user hears what is being baked. The sink gets the same decoded
    /// buffer the recorder muxes; nothing is decoded twice.
    pub fn with_sink(decoder: D, recorder: R, sink: S, options: ExportOptions) -> Self {
        Self {
            decoder,
            recorder,
            sink,
            options,
            state: ExportState::Idle,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn run(
        &mut self,
        audio_path: &Path,
        settings: &Settings,
        mut on_progress: impl FnMut(f32),
    ) -> Result<PathBuf> {
        if self.state != ExportState::Idle {
            return Err(OverlayError::InvalidInput("export job has already run"));
        }
        match self.run_inner(audio_path, settings, &mut on_progress) {
            Ok(artifact) => {
                self.state = ExportState::Done;
                on_progress(1.0);
                Ok(artifact)
            }
            Err(err) => {
                self.state = ExportState::Failed;
                Err(err)
            }
        }
    }

    fn run_inner(
        &mut self,
        audio_path: &Path,
        settings: &Settings,
        on_progress: &mut impl FnMut(f32),
    ) -> Result<PathBuf> {
        let report = probe_capabilities(&self.decoder, &self.recorder, true);
        if !report.supported {
            return Err(OverlayError::UnsupportedPlatform {
                issues: report.issues,
            });
        }

        let buffer = Arc::new(self.decoder.decode(audio_path)?);
        let duration = buffer.duration_seconds() as f64;
        if duration <= 0.0 {
            return Err(OverlayError::InvalidInput("audio file contains no samples"));
        }
        info!(duration, "export decode complete");

        let wav_path = std::env::temp_dir().join(format!("audiogram-audio-{}.wav", epoch_millis()));
        write_wav(&buffer, &wav_path)?;
        let result = self.capture(settings, &buffer, &wav_path, duration, on_progress);
        self.sink.stop();
        std::fs::remove_file(&wav_path).ok();
        result
    }

    fn capture(
        &mut self,
        settings: &Settings,
        buffer: &Arc<AudioBuffer>,
        wav_path: &Path,
        duration: f64,
        on_progress: &mut impl FnMut(f32),
    ) -> Result<PathBuf> {
        let mut compositor = FrameCompositor::new()?;
        let canvas = compositor.handle();

        let mut adapter = SignalSourceAdapter::new();
        let media = MediaSource::new(AudioBuffer::clone(buffer));
        let analyzer = adapter.connect_playback(&media);
        let mut engine = SmoothingEngine::new(
            settings.visualizer.clamped_sensitivity(),
            settings.visualizer.clamped_smoothness(),
        );

        self.state = ExportState::Recording;
        self.recorder.start(&RecorderConfig {
            width: canvas.width(),
            height: canvas.height(),
            fps: self.options.fps,
            video_bitrate: self.options.video_bitrate,
            audio: Some(wav_path.to_path_buf()),
        })?;

        // Monitoring is best-effort; the recording clock never depends on it.
        if let Err(err) = self.sink.start(Arc::clone(buffer)) {
            warn!(%err, "monitor output unavailable during export");
        }

        let mono = buffer.mono_samples();
        let sample_rate = buffer.sample_rate.max(1) as f64;
        let fps = self.options.fps.max(1);
        let start = Instant::now();
        let mut drained_bytes = 0usize;
        let mut pushed = 0usize;
        let mut last_progress = 0.0f32;
        let mut last_poll = Instant::now();
        let mut raw_frequency = Vec::new();
        let mut raw_time = Vec::new();
        let mut frame_index = 0u64;

        loop {
            let seconds = start.elapsed().as_secs_f64();
            if seconds >= duration {
                break;
            }

            // Advance the analysis feed to the wall clock before rendering.
            let target = ((seconds * sample_rate) as usize).min(mono.len());
            if target > pushed {
                analyzer.push_samples(&mono[pushed..target])?;
                pushed = target;
            }
            analyzer.pull_frequency_data(&mut raw_frequency)?;
            analyzer.pull_time_domain_data(&mut raw_time)?;
            let frame = engine.frame(&raw_frequency, &raw_time);

            compositor.render_frame(settings, &frame, true, seconds)?;
            self.recorder.push_frame(&canvas.copy_rgba()?)?;

            if last_poll.elapsed() >= self.options.poll_interval {
                for chunk in self.recorder.drain_chunks()? {
                    drained_bytes += chunk.data.len();
                }
                let progress = (seconds / duration) as f32;
                if progress > last_progress && progress < 1.0 {
                    last_progress = progress;
                    on_progress(progress);
                }
                last_poll = Instant::now();
            }

            frame_index += 1;
            let deadline = start + Duration::from_secs_f64(frame_index as f64 / fps as f64);
            std::thread::sleep(deadline.saturating_duration_since(Instant::now()));
        }

        self.state = ExportState::Finalizing;
        debug!(drained_bytes, "capture loop finished");
        // Only the finalized chunk set goes into the artifact; the encoder
        // may have rewritten the container head after the interim drains.
        let chunks = self.recorder.stop()?;

        let artifact = self
            .options
            .output_dir
            .join(format!("audiogram-{}.webm", epoch_millis()));
        let mut file = File::create(&artifact)?;
        for chunk in &chunks {
            file.write_all(&chunk.data)?;
        }
        info!(path = %artifact.display(), frames = frame_index, "export artifact written");
        Ok(artifact)
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct FakeDecoder {
        available: bool,
        fail: bool,
        seconds: f32,
    }

    impl FakeDecoder {
        fn tone(seconds: f32) -> Self {
            Self {
                available: true,
                fail: false,
                seconds,
            }
        }
    }

    impl AudioDecoderService for FakeDecoder {
        fn is_available(&self) -> bool {
            self.available
        }

        fn decode(&self, _path: &Path) -> Result<AudioBuffer> {
            if self.fail {
                return Err(OverlayError::DecodeFailure("corrupt file".to_string()));
            }
            let sample_rate = 8000u32;
            let count = (self.seconds * sample_rate as f32) as usize;
            let samples: Vec<f32> = (0..count)
                .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin())
                .collect();
            Ok(AudioBuffer {
                samples,
                channels: 1,
                sample_rate,
            })
        }
    }

    #[derive(Default)]
    struct FakeRecorder {
        unavailable: bool,
        fail_on_start: bool,
        fail_on_stop: bool,
        started: RefCell<Option<RecorderConfig>>,
        frames: RefCell<usize>,
        drains: RefCell<usize>,
    }

    impl ChunkedRecorder for FakeRecorder {
        fn is_available(&self) -> bool {
            !self.unavailable
        }

        fn mime_type(&self) -> &'static str {
            "video/webm"
        }

        fn start(&mut self, config: &RecorderConfig) -> Result<()> {
            if self.fail_on_start {
                return Err(OverlayError::EncodeFailure("no encoder".to_string()));
            }
            *self.started.borrow_mut() = Some(config.clone());
            Ok(())
        }

        fn push_frame(&mut self, rgba: &[u8]) -> Result<()> {
            assert_eq!(rgba.len(), 1920 * 1080 * 4);
            *self.frames.borrow_mut() += 1;
            Ok(())
        }

        fn drain_chunks(&mut self) -> Result<Vec<EncodedChunk>> {
            // Interim drains carry a stale header, like a muxer that still
            // has placeholders to backpatch.
            *self.drains.borrow_mut() += 1;
            Ok(vec![EncodedChunk {
                data: vec![0xAB; 16],
            }])
        }

        fn stop(&mut self) -> Result<Vec<EncodedChunk>> {
            if self.fail_on_stop {
                return Err(OverlayError::EncodeFailure("mux failed".to_string()));
            }
            Ok(vec![EncodedChunk {
                data: vec![0xCD; 64],
            }])
        }
    }

    #[derive(Clone, Default)]
    struct FakeSink {
        starts: Arc<std::sync::atomic::AtomicUsize>,
        stops: Arc<std::sync::atomic::AtomicUsize>,
        samples: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl crate::playback::AudioSink for FakeSink {
        fn start(&mut self, buffer: Arc<AudioBuffer>) -> Result<()> {
            use std::sync::atomic::Ordering;
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.samples.store(buffer.samples.len(), Ordering::SeqCst);
            Ok(())
        }

        fn stop(&mut self) {
            self.stops.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    fn quick_options() -> ExportOptions {
        ExportOptions {
            fps: 30,
            poll_interval: Duration::from_millis(20),
            output_dir: std::env::temp_dir(),
            ..ExportOptions::default()
        }
    }

    #[test]
    fn probe_lists_every_missing_service() {
        let decoder = FakeDecoder {
            available: false,
            fail: false,
            seconds: 0.0,
        };
        let recorder = FakeRecorder {
            unavailable: true,
            ..FakeRecorder::default()
        };
        let report = probe_capabilities(&decoder, &recorder, false);
        assert!(!report.supported);
        assert_eq!(
            report.issues,
            vec![
                "chunked media recorder not available",
                "audio decoder not available",
                "canvas capture not available",
            ]
        );
    }

    #[test]
    fn export_completes_with_monotone_progress_and_single_completion() {
        let mut job = ExportJob::new(FakeDecoder::tone(0.2), FakeRecorder::default(), quick_options());
        let mut reports = Vec::new();
        let artifact = job
            .run(Path::new("unused.wav"), &Settings::default(), |progress| {
                reports.push(progress)
            })
            .unwrap();

        assert_eq!(job.state(), ExportState::Done);
        assert!(reports.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(reports.iter().filter(|&&p| p == 1.0).count(), 1);
        assert_eq!(*reports.last().unwrap(), 1.0);

        let name = artifact.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("audiogram-") && name.ends_with(".webm"));
        // The artifact must be exactly the finalized chunk set. Bytes from
        // interim drains would carry the pre-backpatch container head.
        let written = std::fs::read(&artifact).unwrap();
        assert_eq!(written, vec![0xCDu8; 64]);
        assert!(!written.contains(&0xAB));
        std::fs::remove_file(&artifact).ok();
    }

    #[test]
    fn finished_job_refuses_a_second_run() {
        let mut job = ExportJob::new(FakeDecoder::tone(0.1), FakeRecorder::default(), quick_options());
        let artifact = job
            .run(Path::new("unused.wav"), &Settings::default(), |_| {})
            .unwrap();
        std::fs::remove_file(&artifact).ok();

        let mut reports = Vec::new();
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |p| reports.push(p))
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidInput(_)));
        assert_eq!(job.state(), ExportState::Done);
        assert!(reports.is_empty());
    }

    #[test]
    fn monitor_sink_starts_and_stops_once_per_run() {
        use std::sync::atomic::Ordering;

        let sink = FakeSink::default();
        let mut job = ExportJob::with_sink(
            FakeDecoder::tone(0.1),
            FakeRecorder::default(),
            sink.clone(),
            quick_options(),
        );
        let artifact = job
            .run(Path::new("unused.wav"), &Settings::default(), |_| {})
            .unwrap();
        std::fs::remove_file(&artifact).ok();

        assert_eq!(sink.starts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
        // The sink hears the job's own decoded buffer.
        assert_eq!(sink.samples.load(Ordering::SeqCst), 800);
    }

    #[test]
    fn monitor_sink_stops_when_the_run_fails() {
        use std::sync::atomic::Ordering;

        let sink = FakeSink::default();
        let recorder = FakeRecorder {
            fail_on_stop: true,
            ..FakeRecorder::default()
        };
        let mut job = ExportJob::with_sink(FakeDecoder::tone(0.1), recorder, sink.clone(), quick_options());
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |_| {})
            .unwrap_err();

        assert!(matches!(err, OverlayError::EncodeFailure(_)));
        assert_eq!(sink.starts.load(Ordering::SeqCst), 1);
        assert_eq!(sink.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsupported_platform_refuses_to_start() {
        let recorder = FakeRecorder {
            unavailable: true,
            ..FakeRecorder::default()
        };
        let mut job = ExportJob::new(FakeDecoder::tone(0.1), recorder, quick_options());
        let mut reports = Vec::new();
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |p| reports.push(p))
            .unwrap_err();

        assert!(matches!(err, OverlayError::UnsupportedPlatform { ref issues }
            if issues == &vec!["chunked media recorder not available".to_string()]));
        assert_eq!(job.state(), ExportState::Failed);
        assert!(reports.is_empty());
    }

    #[test]
    fn decode_failure_fails_without_completion() {
        let decoder = FakeDecoder {
            available: true,
            fail: true,
            seconds: 0.0,
        };
        let mut job = ExportJob::new(decoder, FakeRecorder::default(), quick_options());
        let mut reports = Vec::new();
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |p| reports.push(p))
            .unwrap_err();

        assert!(matches!(err, OverlayError::DecodeFailure(_)));
        assert_eq!(job.state(), ExportState::Failed);
        assert!(!reports.contains(&1.0));
    }

    #[test]
    fn encoder_failure_during_finalize_never_reports_completion() {
        let recorder = FakeRecorder {
            fail_on_stop: true,
            ..FakeRecorder::default()
        };
        let mut job = ExportJob::new(FakeDecoder::tone(0.1), recorder, quick_options());
        let mut reports = Vec::new();
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |p| reports.push(p))
            .unwrap_err();

        assert!(matches!(err, OverlayError::EncodeFailure(_)));
        assert_eq!(job.state(), ExportState::Failed);
        assert!(!reports.contains(&1.0));
        assert!(reports.iter().all(|&p| p < 1.0));
    }

    #[test]
    fn empty_audio_is_rejected() {
        let mut job = ExportJob::new(FakeDecoder::tone(0.0), FakeRecorder::default(), quick_options());
        let err = job
            .run(Path::new("unused.wav"), &Settings::default(), |_| {})
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidInput(_)));
        assert_eq!(job.state(), ExportState::Failed);
    }

    #[test]
    fn wav_round_trips_through_hound() {
        let buffer = AudioBuffer {
            samples: vec![0.0, 0.5, -0.5, 1.0],
            channels: 1,
            sample_rate: 8000,
        };
        let path = std::env::temp_dir().join("audiogram-wav-test.wav");
        write_wav(&buffer, &path).unwrap();

        let decoded = WavDecoder.decode(&path).unwrap();
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.samples.len(), 4);
        for (expected, actual) in buffer.samples.iter().zip(&decoded.samples) {
            assert!((expected - actual).abs() < 0.001);
        }
        std::fs::remove_file(&path).ok();
    }
}
