use std::{
    collections::HashMap,
    f32::consts::PI,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{OverlayError, Result};

/// Analysis window size. Matches the historical 256-point analyzer, which
/// yields 128 frequency bins and 256 time-domain slots per frame.
pub const FFT_SIZE: usize = 256;
pub const FREQUENCY_BIN_COUNT: usize = FFT_SIZE / 2;

/// Analyzer-level spectral smoothing for file playback. The attack/release
/// stage downstream expects a moderately pre-smoothed spectrum here.
pub const PLAYBACK_TIME_CONSTANT: f32 = 0.8;
/// Lighter analyzer smoothing for live capture so raw dynamics survive into
/// the attack stage.
pub const LIVE_TIME_CONSTANT: f32 = 0.5;

const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Decoded PCM owned by the host, the analog of a decodable media element.
/// Samples are interleaved across channels.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f32 / self.sample_rate as f32
    }

    /// Channel-averaged mono rendering used by the analysis path.
    pub fn mono_samples(&self) -> Vec<f32> {
        let channels = self.channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        self.samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

static NEXT_MEDIA_ID: AtomicU64 = AtomicU64::new(1);

/// A decodable media handle. Each instance carries a unique identity so the
/// adapter can remember the one routing node created for it.
#[derive(Debug, Clone)]
pub struct MediaSource {
    id: u64,
    buffer: Arc<AudioBuffer>,
}

impl MediaSource {
    pub fn new(buffer: AudioBuffer) -> Self {
        Self {
            id: NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed),
            buffer: Arc::new(buffer),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }
}

/// Where an analysis route sends its audio besides the analyzer. Playback
/// must still be heard; live capture must never loop back to the speakers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    Playback,
    Live,
}

impl RoutingMode {
    pub fn monitored(self) -> bool {
        matches!(self, RoutingMode::Playback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Disconnected,
    Connecting,
    Connected,
}

/// Capture constraints requested from the platform. Telephony-style cleanup
/// is explicitly disabled: the visualization wants raw dynamics.
#[derive(Debug, Clone, Copy)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl CaptureConstraints {
    pub fn raw() -> Self {
        Self {
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// One hardware capture track. Stopping must take effect synchronously so the
/// capture indicator turns off immediately.
pub trait CaptureTrack {
    fn stop(&mut self);
    fn ready_state(&self) -> TrackState;
}

pub type SampleCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Hardware seam for live capture. The production implementation is
/// [`CpalCaptureBackend`]; tests substitute fakes.
pub trait LiveCaptureBackend {
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        on_samples: SampleCallback,
    ) -> Result<Vec<Box<dyn CaptureTrack>>>;
}

/// Uniform pull-based interface over the two heterogeneous audio inputs.
/// Exclusively owns the audio graph: no other component may open a second
/// routing path from the same source.
pub struct SignalSourceAdapter {
    state: SourceState,
    playback_routes: HashMap<u64, Arc<Mutex<Analyzer>>>,
    live: Option<LiveRoute>,
}

struct LiveRoute {
    analyzer: Arc<Mutex<Analyzer>>,
    tracks: Vec<Box<dyn CaptureTrack>>,
}

impl SignalSourceAdapter {
    pub fn new() -> Self {
        Self {
            state: SourceState::Disconnected,
            playback_routes: HashMap::new(),
            live: None,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Routing policy of the currently connected source, if any.
    pub fn routing_mode(&self) -> Option<RoutingMode> {
        if self.live.is_some() {
            Some(RoutingMode::Live)
        } else if self.state == SourceState::Connected {
            Some(RoutingMode::Playback)
        } else {
            None
        }
    }

    /// Binds a decoded media source to an analysis node. Idempotent per media
    /// handle: reconnecting reuses the one routing node created for it, so no
    /// duplicate routing edge ever exists. The playback path is monitored
    /// (the user must still hear the file).
    pub fn connect_playback(&mut self, media: &MediaSource) -> AnalyzerHandle {
        let analyzer = self
            .playback_routes
            .entry(media.id())
            .or_insert_with(|| Arc::new(Mutex::new(Analyzer::new(PLAYBACK_TIME_CONSTANT))))
            .clone();
        self.state = SourceState::Connected;
        AnalyzerHandle { shared: analyzer }
    }

    /// Releases the routing node remembered for a media source.
    pub fn disconnect_playback(&mut self, media: &MediaSource) {
        self.playback_routes.remove(&media.id());
        if self.playback_routes.is_empty() && self.live.is_none() {
            self.state = SourceState::Disconnected;
        }
    }

    /// Requests a live capture device and binds it to a fresh analyzer. The
    /// live path is never routed to output (feedback prevention). Device
    /// refusal surfaces as [`OverlayError::PermissionDenied`]; a second live
    /// bind while one exists is a routing conflict.
    pub fn connect_live(&mut self, backend: &mut dyn LiveCaptureBackend) -> Result<AnalyzerHandle> {
        if self.live.is_some() {
            return Err(OverlayError::SourceRoutingConflict(
                "a live analysis path is already bound",
            ));
        }

        self.state = SourceState::Connecting;
        let analyzer = Arc::new(Mutex::new(Analyzer::new(LIVE_TIME_CONSTANT)));
        let sink = Arc::clone(&analyzer);
        let callback: SampleCallback = Box::new(move |samples| {
            if let Ok(mut analyzer) = sink.lock() {
                analyzer.push_samples(samples);
            }
        });

        let tracks = match backend.open(&CaptureConstraints::raw(), callback) {
            Ok(tracks) => tracks,
            Err(err) => {
                self.state = SourceState::Disconnected;
                return Err(err);
            }
        };

        self.live = Some(LiveRoute {
            analyzer: Arc::clone(&analyzer),
            tracks,
        });
        self.state = SourceState::Connected;
        Ok(AnalyzerHandle { shared: analyzer })
    }

    /// Stops all underlying capture tracks and releases the live analyzer
    /// binding. Safe to call when no live source is connected. The adapter
    /// only returns to `Disconnected` once no playback routes remain either.
    pub fn disconnect_live(&mut self) {
        if let Some(mut route) = self.live.take() {
            for track in route.tracks.iter_mut() {
                track.stop();
            }
            if self.playback_routes.is_empty() {
                self.state = SourceState::Disconnected;
            }
        }
    }
}

impl Default for SignalSourceAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SignalSourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalSourceAdapter")
            .field("state", &self.state)
            .field("playback_routes", &self.playback_routes.len())
            .field("live", &self.live.is_some())
            .finish()
    }
}

/// Shared, thread-safe view over one analysis node.
#[derive(Clone)]
pub struct AnalyzerHandle {
    shared: Arc<Mutex<Analyzer>>,
}

impl AnalyzerHandle {
    /// Feeds mono samples into the analysis window. Live capture calls this
    /// from its stream callback; playback calls it from the buffer driver.
    pub fn push_samples(&self, samples: &[f32]) -> Result<()> {
        let mut analyzer = self.lock()?;
        analyzer.push_samples(samples);
        Ok(())
    }

    /// Non-blocking read of the latest frequency window into `out`.
    pub fn pull_frequency_data(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut analyzer = self.lock()?;
        let data = analyzer.pull_frequency_data()?;
        out.clear();
        out.extend_from_slice(data);
        Ok(())
    }

    /// Non-blocking read of the latest time-domain window into `out`.
    pub fn pull_time_domain_data(&self, out: &mut Vec<u8>) -> Result<()> {
        let analyzer = &mut *self.lock()?;
        let data = analyzer.pull_time_domain_data();
        out.clear();
        out.extend_from_slice(data);
        Ok(())
    }

    /// True when both handles share the same underlying routing node.
    pub fn same_route(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Analyzer>> {
        self.shared
            .lock()
            .map_err(|_| OverlayError::InvalidInput("analysis node has been poisoned"))
    }
}

impl fmt::Debug for AnalyzerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzerHandle").finish()
    }
}

/// Fixed-size analysis node over the most recent [`FFT_SIZE`] samples.
/// Produces dB-mapped byte magnitudes and centered byte samples; both reads
/// mutate reusable buffers, no per-call allocation.
pub struct Analyzer {
    smoothing_time_constant: f32,
    window: Vec<f32>,
    write_pos: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    fft_input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed_magnitudes: Vec<f32>,
    frequency_bytes: Vec<u8>,
    time_domain_bytes: Vec<u8>,
}

impl Analyzer {
    pub fn new(smoothing_time_constant: f32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(FFT_SIZE);
        let fft_input = plan.make_input_vec();
        let spectrum = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        Self {
            smoothing_time_constant: smoothing_time_constant.clamp(0.0, 1.0),
            window: vec![0.0; FFT_SIZE],
            write_pos: 0,
            plan,
            fft_input,
            spectrum,
            scratch,
            smoothed_magnitudes: vec![0.0; FREQUENCY_BIN_COUNT],
            frequency_bytes: vec![0; FREQUENCY_BIN_COUNT],
            time_domain_bytes: vec![128; FFT_SIZE],
        }
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        for &sample in samples {
            self.window[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % FFT_SIZE;
        }
    }

    /// Latest window as centered bytes, oldest sample first.
    pub fn pull_time_domain_data(&mut self) -> &[u8] {
        for (i, byte) in self.time_domain_bytes.iter_mut().enumerate() {
            let sample = self.window[(self.write_pos + i) % FFT_SIZE];
            *byte = (sample * 128.0 + 128.0).clamp(0.0, 255.0).round() as u8;
        }
        &self.time_domain_bytes
    }

    /// Latest window as dB-mapped magnitude bytes, one per bin.
    pub fn pull_frequency_data(&mut self) -> Result<&[u8]> {
        for (i, value) in self.fft_input.iter_mut().enumerate() {
            let sample = self.window[(self.write_pos + i) % FFT_SIZE];
            *value = sample * hann_value(i, FFT_SIZE);
        }

        self.plan
            .process_with_scratch(&mut self.fft_input, &mut self.spectrum, &mut self.scratch)?;

        let tau = self.smoothing_time_constant;
        for (i, byte) in self.frequency_bytes.iter_mut().enumerate() {
            let magnitude = self.spectrum[i].norm() / FFT_SIZE as f32;
            let smoothed = tau * self.smoothed_magnitudes[i] + (1.0 - tau) * magnitude;
            self.smoothed_magnitudes[i] = smoothed;
            *byte = if smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                let scaled = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS) * 255.0;
                scaled.clamp(0.0, 255.0).round() as u8
            } else {
                0
            };
        }
        Ok(&self.frequency_bytes)
    }
}

impl fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyzer")
            .field("smoothing_time_constant", &self.smoothing_time_constant)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}

/// Live capture over the default cpal input device.
pub struct CpalCaptureBackend;

struct CpalCaptureTrack {
    stream: Option<cpal::Stream>,
    ended: bool,
}

impl CaptureTrack for CpalCaptureTrack {
    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
        }
        self.ended = true;
    }

    fn ready_state(&self) -> TrackState {
        if self.ended {
            TrackState::Ended
        } else {
            TrackState::Live
        }
    }
}

impl LiveCaptureBackend for CpalCaptureBackend {
    fn open(
        &mut self,
        _constraints: &CaptureConstraints,
        mut on_samples: SampleCallback,
    ) -> Result<Vec<Box<dyn CaptureTrack>>> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| {
            OverlayError::PermissionDenied("no capture device available".to_string())
        })?;
        let config = device
            .default_input_config()
            .map_err(|err| OverlayError::PermissionDenied(err.to_string()))?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(OverlayError::PermissionDenied(
                "capture device does not expose f32 samples".to_string(),
            ));
        }
        let channels = config.channels() as usize;

        let stream = device
            .build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if channels <= 1 {
                        on_samples(data);
                    } else {
                        let mono: Vec<f32> = data
                            .chunks(channels)
                            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                            .collect();
                        on_samples(&mono);
                    }
                },
                |err| tracing::warn!(%err, "live capture stream error"),
                None,
            )
            .map_err(|err| OverlayError::PermissionDenied(err.to_string()))?;
        stream
            .play()
            .map_err(|err| OverlayError::PermissionDenied(err.to_string()))?;

        Ok(vec![Box::new(CpalCaptureTrack {
            stream: Some(stream),
            ended: false,
        })])
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;

    struct FakeTrack {
        ended: Arc<AtomicBool>,
    }

    impl CaptureTrack for FakeTrack {
        fn stop(&mut self) {
            self.ended.store(true, Ordering::SeqCst);
        }

        fn ready_state(&self) -> TrackState {
            if self.ended.load(Ordering::SeqCst) {
                TrackState::Ended
            } else {
                TrackState::Live
            }
        }
    }

    struct FakeBackend {
        ended: Arc<AtomicBool>,
        deny: bool,
        callback: Option<SampleCallback>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                ended: Arc::new(AtomicBool::new(false)),
                deny: false,
                callback: None,
            }
        }
    }

    impl LiveCaptureBackend for FakeBackend {
        fn open(
            &mut self,
            constraints: &CaptureConstraints,
            on_samples: SampleCallback,
        ) -> Result<Vec<Box<dyn CaptureTrack>>> {
            assert!(!constraints.echo_cancellation);
            assert!(!constraints.noise_suppression);
            assert!(!constraints.auto_gain_control);
            if self.deny {
                return Err(OverlayError::PermissionDenied("denied by user".to_string()));
            }
            self.callback = Some(on_samples);
            Ok(vec![Box::new(FakeTrack {
                ended: Arc::clone(&self.ended),
            })])
        }
    }

    fn media_with_tone() -> MediaSource {
        let samples: Vec<f32> = (0..1024)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / 256.0).sin())
            .collect();
        MediaSource::new(AudioBuffer {
            samples,
            channels: 1,
            sample_rate: 48_000,
        })
    }

    #[test]
    fn playback_connect_is_idempotent_per_media_handle() {
        let mut adapter = SignalSourceAdapter::new();
        let media = media_with_tone();

        let first = adapter.connect_playback(&media);
        let second = adapter.connect_playback(&media);
        assert!(first.same_route(&second));

        let other = media_with_tone();
        let third = adapter.connect_playback(&other);
        assert!(!first.same_route(&third));
    }

    #[test]
    fn playback_routing_is_monitored_and_live_is_not() {
        let mut adapter = SignalSourceAdapter::new();
        let media = media_with_tone();
        adapter.connect_playback(&media);
        assert_eq!(adapter.routing_mode(), Some(RoutingMode::Playback));
        assert!(adapter.routing_mode().unwrap().monitored());
        adapter.disconnect_playback(&media);

        let mut backend = FakeBackend::new();
        adapter.connect_live(&mut backend).unwrap();
        assert_eq!(adapter.routing_mode(), Some(RoutingMode::Live));
        assert!(!adapter.routing_mode().unwrap().monitored());
    }

    #[test]
    fn second_live_bind_is_a_routing_conflict() {
        let mut adapter = SignalSourceAdapter::new();
        let mut backend = FakeBackend::new();
        adapter.connect_live(&mut backend).unwrap();

        let mut second = FakeBackend::new();
        let err = adapter.connect_live(&mut second).unwrap_err();
        assert!(matches!(err, OverlayError::SourceRoutingConflict(_)));
    }

    #[test]
    fn denied_capture_surfaces_permission_error_and_resets_state() {
        let mut adapter = SignalSourceAdapter::new();
        let mut backend = FakeBackend::new();
        backend.deny = true;

        let err = adapter.connect_live(&mut backend).unwrap_err();
        assert!(matches!(err, OverlayError::PermissionDenied(_)));
        assert_eq!(adapter.state(), SourceState::Disconnected);
        assert!(!adapter.is_live());
    }

    #[test]
    fn disconnect_live_stops_tracks_synchronously() {
        let mut adapter = SignalSourceAdapter::new();
        let mut backend = FakeBackend::new();
        adapter.connect_live(&mut backend).unwrap();
        assert!(adapter.is_live());

        adapter.disconnect_live();
        assert!(!adapter.is_live());
        assert_eq!(adapter.state(), SourceState::Disconnected);
        assert!(backend.ended.load(Ordering::SeqCst));

        // No-op when nothing is connected.
        adapter.disconnect_live();
    }

    #[test]
    fn disconnect_live_keeps_remaining_playback_routes_connected() {
        let mut adapter = SignalSourceAdapter::new();
        let media = media_with_tone();
        adapter.connect_playback(&media);

        let mut backend = FakeBackend::new();
        adapter.connect_live(&mut backend).unwrap();

        adapter.disconnect_live();
        assert!(backend.ended.load(Ordering::SeqCst));
        assert_eq!(adapter.state(), SourceState::Connected);
        assert_eq!(adapter.routing_mode(), Some(RoutingMode::Playback));

        adapter.disconnect_playback(&media);
        assert_eq!(adapter.state(), SourceState::Disconnected);
    }

    #[test]
    fn live_samples_flow_through_the_capture_callback() {
        let mut adapter = SignalSourceAdapter::new();
        let mut backend = FakeBackend::new();
        let handle = adapter.connect_live(&mut backend).unwrap();

        let tone: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / FFT_SIZE as f32).sin())
            .collect();
        let callback = backend.callback.as_mut().unwrap();
        callback(&tone);

        let mut time = Vec::new();
        handle.pull_time_domain_data(&mut time).unwrap();
        assert_eq!(time.len(), FFT_SIZE);
        assert!(time.iter().any(|&v| v > 200));
        assert!(time.iter().any(|&v| v < 56));
    }

    #[test]
    fn frequency_data_peaks_at_the_driven_bin() {
        let mut analyzer = Analyzer::new(LIVE_TIME_CONSTANT);
        let tone: Vec<f32> = (0..FFT_SIZE)
            .map(|i| (2.0 * PI * 16.0 * i as f32 / FFT_SIZE as f32).sin())
            .collect();
        analyzer.push_samples(&tone);

        let data = analyzer.pull_frequency_data().unwrap().to_vec();
        assert_eq!(data.len(), FREQUENCY_BIN_COUNT);
        // Energy concentrates around the driven bin and stays low far away.
        assert!(data[16] > 200, "driven bin too quiet: {}", data[16]);
        assert!(data[64] < 100, "distant bin too loud: {}", data[64]);
        assert!(data[100] < 100);
    }

    #[test]
    fn silent_analyzer_reads_neutral_values() {
        let mut analyzer = Analyzer::new(PLAYBACK_TIME_CONSTANT);
        let frequency = analyzer.pull_frequency_data().unwrap().to_vec();
        assert!(frequency.iter().all(|&v| v == 0));
        let time = analyzer.pull_time_domain_data();
        assert!(time.iter().all(|&v| v == 128));
    }

    #[test]
    fn mono_mixdown_averages_channels() {
        let buffer = AudioBuffer {
            samples: vec![1.0, -1.0, 0.5, 0.5],
            channels: 2,
            sample_rate: 48_000,
        };
        assert_eq!(buffer.mono_samples(), vec![0.0, 0.5]);
        assert_eq!(buffer.frame_count(), 2);
    }
}
